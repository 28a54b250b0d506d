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

use std::any::Any;

/// Recovers the concrete value behind an erased provider.
///
/// Generated code only erases a provider when the provided type cannot be
/// named from the component's module; the generator guarantees the stored
/// value matches `T`, so a mismatch here is a generator bug.
pub fn unchecked_cast<T: 'static>(value: Box<dyn Any>) -> T {
    *value
        .downcast::<T>()
        .expect("type confusion in erased provider")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_erasure() {
        let erased: Box<dyn Any> = Box::new("value".to_owned());
        let value: String = unchecked_cast(erased);
        assert_eq!(value, "value");
    }
}
