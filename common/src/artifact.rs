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

use anyhow::Result;
use proc_macro2::TokenStream;

/// One generated type, as an abstract source tree.
///
/// The core never renders text; pretty-printing and persistence belong to the
/// [`OutputSink`] implementation.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    /// Module the type is emitted into, e.g. `my_crate::app`.
    pub module_path: String,
    /// Simple name of the generated type, e.g. `DaggerMyComponent`.
    pub name: String,
    pub source: TokenStream,
    /// Pass-through of the `format_generated_source` knob.
    pub format: bool,
}

impl GeneratedFile {
    /// Canonical textual form used for determinism comparisons in tests.
    pub fn source_string(&self) -> String {
        self.source.to_string()
    }
}

/// Persists generated source trees.
pub trait OutputSink {
    fn write(&mut self, file: GeneratedFile) -> Result<()>;
}

/// Keeps generated files in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub files: Vec<GeneratedFile>,
}

impl MemorySink {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn find(&self, name: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|file| file.name == name)
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, file: GeneratedFile) -> Result<()> {
        self.files.push(file);
        Ok(())
    }
}
