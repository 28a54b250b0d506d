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

//! Compile time dependency injection for Rust, inspired by dagger.
//!
//! The crate has two faces:
//!
//! * The runtime support types referenced by generated component
//!   implementations: [`Provider`], [`Lazy`], the scoping wrappers
//!   [`DoubleCheck`]/[`SingleCheck`], [`DelegateFactory`], the production
//!   surface, and [`unchecked_cast`] for erased providers.
//! * A facade over the processor for tools driving code generation from a
//!   front-end manifest, see [`generate_components`].

mod cast;
mod checks;
mod delegate_factory;
mod factories;
mod lazy;
mod members_injector;
mod once;
mod producer;
mod provider;

pub use cast::unchecked_cast;
pub use checks::{DoubleCheck, SingleCheck};
pub use delegate_factory::DelegateFactory;
pub use factories::{
    AbsentFactory, EmptyMapFactory, EmptyVecFactory, InstanceFactory, MapFactory,
    MapFactoryBuilder, PresentFactory, VecFactory, VecFactoryBuilder,
};
pub use lazy::{Lazy, ProviderOfLazy};
pub use members_injector::{MembersInjector, NoopMembersInjector};
pub use once::Once;
pub use producer::{Produced, Producer, ProducerFromProvider, ProducerFuture, ProductionError};
pub use provider::{ClosureProvider, Provider};

pub use poniard_common::artifact::{GeneratedFile, MemorySink, OutputSink};
pub use poniard_common::diagnostic::{CollectingMessager, Diagnostic, Messager, Severity};
pub use poniard_common::manifest::Manifest;
pub use poniard_processor::config::CompilerOptions;
pub use poniard_processor::driver::Driver;

use anyhow::bail;

/// Parses a front-end manifest from JSON, runs the full pipeline, and returns
/// the generated files. Validation errors abort with a summary; use
/// [`Driver`] directly for finer-grained diagnostic handling.
pub fn generate_components(
    manifest_json: &str,
    options: &CompilerOptions,
) -> anyhow::Result<Vec<GeneratedFile>> {
    let manifest: Manifest = serde_json::from_str(manifest_json)?;
    let mut messager = CollectingMessager::new();
    let mut sink = MemorySink::new();
    let driver = Driver::new(options.clone());
    driver.process(vec![manifest], &mut messager, &mut sink)?;
    if messager.has_errors() {
        let summary = messager
            .errors()
            .map(|diagnostic| format!("{}: {}", diagnostic.element, diagnostic.message))
            .collect::<Vec<String>>()
            .join("\n");
        bail!("code generation failed:\n{}", summary);
    }
    Ok(sink.files)
}
