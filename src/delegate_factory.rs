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

/// Two-phase provider used to break legal dependency cycles.
///
/// The component initializer creates the delegate factory first, hands it to
/// whoever needs the cyclic edge, and patches in the real provider once that
/// provider exists. Requests before the patch are a generator bug.
pub struct DelegateFactory<T> {
    delegate: RefCell<Option<Rc<dyn Provider<T>>>>,
}

impl<T> DelegateFactory<T> {
    pub fn new() -> Rc<Self> {
        Rc::new(DelegateFactory {
            delegate: RefCell::new(None),
        })
    }

    pub fn set_delegate(&self, delegate: Rc<dyn Provider<T>>) {
        let mut slot = self.delegate.borrow_mut();
        assert!(slot.is_none(), "delegate already set");
        *slot = Some(delegate);
    }
}

impl<T> Provider<T> for DelegateFactory<T> {
    fn get(&self) -> T {
        self.delegate
            .borrow()
            .as_ref()
            .expect("delegate requested before initialization completed")
            .get()
    }
}
