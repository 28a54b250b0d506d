/*
Copyright 2024 Google LLC

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use crate::{Once, Provider};
use std::rc::Rc;

/// Wraps a binding so it is only created on first use.
///
/// When `Foo` depends on `Bar`, `Bar` is created before `Foo` which may not be
/// desirable if creating `Bar` is costly but it is only used much later or
/// conditionally. As `Lazy<Bar>`, `Bar` is only created when
/// [`Lazy::get`] is called.
///
/// [`Lazy::get`] is memoized; the same instance is returned on every later
/// call. If multiple instances are needed, request a
/// [`Provider<T>`](Provider) instead.
pub struct Lazy<T> {
    provider: Rc<dyn Provider<T>>,
    value: Once<T>,
}

impl<T> Lazy<T> {
    #[doc(hidden)]
    pub fn new(provider: Rc<dyn Provider<T>>) -> Self {
        Lazy {
            provider,
            value: Once::new(),
        }
    }

    /// Creates or retrieves the cached instance and returns a reference to it.
    pub fn get(&self) -> &T {
        self.value.get(|| self.provider.get())
    }
}

/// Provider handing out fresh [`Lazy`] handles over a shared underlying
/// provider, for `Provider<Lazy<T>>` requests.
pub struct ProviderOfLazy<T> {
    provider: Rc<dyn Provider<T>>,
}

impl<T> ProviderOfLazy<T> {
    pub fn create(provider: Rc<dyn Provider<T>>) -> Rc<Self> {
        Rc::new(ProviderOfLazy { provider })
    }
}

impl<T> Provider<Lazy<T>> for ProviderOfLazy<T> {
    fn get(&self) -> Lazy<T> {
        Lazy::new(self.provider.clone())
    }
}
