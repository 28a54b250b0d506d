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

/// Creates a binding on demand.
///
/// `T` is created each time [`Provider::get`] is called, allowing multiple
/// instances to be created.
///
/// This also prevents creating `T` immediately when constructing an object
/// that depends on `T`, which allows lazy initialization and can break cyclic
/// dependency.
///
/// If only a single cached instance is needed, use [`Lazy<T>`](crate::Lazy)
/// instead.
pub trait Provider<T> {
    fn get(&self) -> T;
}

/// Adapts a closure into a [`Provider`]. Generated factories are preferred;
/// this exists for hand-wired tests and glue.
pub struct ClosureProvider<T, F: Fn() -> T> {
    f: F,
}

impl<T, F: Fn() -> T> ClosureProvider<T, F> {
    pub fn new(f: F) -> Self {
        ClosureProvider { f }
    }
}

impl<T, F: Fn() -> T> Provider<T> for ClosureProvider<T, F> {
    fn get(&self) -> T {
        (self.f)()
    }
}
