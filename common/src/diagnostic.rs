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

#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Clone, Copy)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// One reported message, tied to the source element it originates from.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Readable description of the originating element, e.g. a component path
    /// or a binding name.
    pub element: String,
    pub message: String,
}

/// Write-only diagnostic sink. Emitters may call it from any stage.
pub trait Messager {
    fn report(&mut self, diagnostic: Diagnostic);

    fn error(&mut self, element: &str, message: &str) {
        self.report(Diagnostic {
            severity: Severity::Error,
            element: element.to_owned(),
            message: message.to_owned(),
        });
    }

    fn warning(&mut self, element: &str, message: &str) {
        self.report(Diagnostic {
            severity: Severity::Warning,
            element: element.to_owned(),
            message: message.to_owned(),
        });
    }

    fn note(&mut self, element: &str, message: &str) {
        self.report(Diagnostic {
            severity: Severity::Note,
            element: element.to_owned(),
            message: message.to_owned(),
        });
    }
}

/// Buffers diagnostics in memory; the driver and tests read them back.
#[derive(Debug, Default)]
pub struct CollectingMessager {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingMessager {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Error)
    }
}

impl Messager for CollectingMessager {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
