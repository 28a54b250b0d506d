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

use backtrace::Backtrace;
use thiserror::Error;

/// Validation error kinds. One kind per distinct check; diagnostics carry the
/// kind tag in their message so callers can match on it without a dedicated
/// diagnostic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    #[error("MISSING_BINDING")]
    MissingBinding,
    #[error("DUPLICATE_BINDING")]
    DuplicateBinding,
    #[error("DEPENDENCY_CYCLE")]
    DependencyCycle,
    #[error("SCOPE_NOT_ON_COMPONENT")]
    ScopeNotOnComponent,
    #[error("INCOMPATIBLE_ASSISTED_USAGE")]
    IncompatibleAssistedUsage,
    #[error("PRODUCTION_IN_NON_PRODUCTION_COMPONENT")]
    ProductionInNonProductionComponent,
    #[error("NULLABLE_TO_NON_NULLABLE")]
    NullableToNonNullable,
    #[error("MULTIBINDING_MAP_KEY_COLLISION")]
    MultibindingMapKeyCollision,
    #[error("INVALID_COMPONENT_DECLARATION")]
    InvalidComponentDeclaration,
    #[error("INACCESSIBLE_BINDING_EXPOSURE")]
    InaccessibleBindingExposure,
}

impl ErrorKind {
    /// Message layout is emission-side polish; the kind tag is always present
    /// so validation outcomes stay comparable across layouts.
    pub fn format_message(&self, message: &str, experimental_layout: bool) -> String {
        if experimental_layout {
            format!("[Dagger/{:?}] {}", self, message)
        } else {
            format!("[{}] {}", self, message)
        }
    }
}

/// Compiler-internal inconsistency, e.g. a dispatcher id that was never
/// assigned or a supplier asked for an expression of the wrong kind. Names the
/// offending binding and carries the capture site.
#[derive(Debug, Error)]
#[error("internal error on binding {binding}: {message}")]
pub struct InternalError {
    pub binding: String,
    pub message: String,
    backtrace: String,
}

impl InternalError {
    pub fn new(binding: &str, message: &str) -> Self {
        InternalError {
            binding: binding.to_owned(),
            message: message.to_owned(),
            backtrace: format!("{:?}", Backtrace::new()),
        }
    }

    pub fn backtrace(&self) -> &str {
        &self.backtrace
    }
}
