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

use serde::{Deserialize, Serialize};

/// Driver knobs. Every knob affects code emission only; validation outcomes
/// are knob-independent.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct CompilerOptions {
    /// Emit switching-provider dispatchers instead of one factory reference
    /// per binding, trading indirection for class-load count.
    pub fast_init: bool,
    /// Ask the output sink to pretty-print generated sources.
    pub format_generated_source: bool,
    /// Include the originating module method name in production tokens.
    pub write_producer_name_in_token: bool,
    /// Alternative diagnostic message layout.
    pub experimental_dagger_error_messages: bool,
    /// Deduplicate provision provider fields by erased key.
    pub ignore_provision_key_wildcards: bool,
}

impl CompilerOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn fast_init(mut self) -> Self {
        self.fast_init = true;
        self
    }
}
