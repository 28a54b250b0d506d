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

/// Injects dependencies into the members of an already constructed instance.
pub trait MembersInjector<T> {
    fn inject_members(&self, instance: &mut T);
}

/// Injector for types with nothing to inject.
pub struct NoopMembersInjector;

impl<T> MembersInjector<T> for NoopMembersInjector {
    fn inject_members(&self, _instance: &mut T) {}
}
