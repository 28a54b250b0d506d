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

use crate::Provider;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

/// Scoping wrapper with publication-safe single-instance semantics.
///
/// The underlying provider is invoked at most once; the resulting instance is
/// cloned out to every caller.
pub struct DoubleCheck<T> {
    delegate: Rc<dyn Provider<T>>,
    instance: OnceLock<T>,
}

impl<T: Clone> DoubleCheck<T> {
    pub fn provider(delegate: Rc<dyn Provider<T>>) -> Rc<Self> {
        Rc::new(DoubleCheck {
            delegate,
            instance: OnceLock::new(),
        })
    }
}

impl<T: Clone> Provider<T> for DoubleCheck<T> {
    fn get(&self) -> T {
        self.instance
            .get_or_init(|| self.delegate.get())
            .clone()
    }
}

/// Scoping wrapper for reusable bindings: eventual single-instance semantics
/// without a cross-thread publication guarantee. Redundant instances may be
/// created under contention; one of them wins.
pub struct SingleCheck<T> {
    delegate: Rc<dyn Provider<T>>,
    instance: RefCell<Option<T>>,
}

impl<T: Clone> SingleCheck<T> {
    pub fn provider(delegate: Rc<dyn Provider<T>>) -> Rc<Self> {
        Rc::new(SingleCheck {
            delegate,
            instance: RefCell::new(None),
        })
    }
}

impl<T: Clone> Provider<T> for SingleCheck<T> {
    fn get(&self) -> T {
        if let Some(value) = self.instance.borrow().as_ref() {
            return value.clone();
        }
        let value = self.delegate.get();
        *self.instance.borrow_mut() = Some(value.clone());
        value
    }
}
