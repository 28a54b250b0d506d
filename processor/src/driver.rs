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

//! Walks annotated roots, invokes the pipeline stages per component, handles
//! multi-round deferral and reports diagnostics. All mutable emission state
//! lives on a [`CompilationContext`] owned here and released on return.

use anyhow::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug, info, trace};

use crate::component;
use crate::config::CompilerOptions;
use crate::error::{ErrorKind, InternalError};
use crate::factories::{self, FactoryArtifact};
use crate::graph::build_graph;
use crate::module_proxy;
use crate::validator;
use poniard_common::artifact::OutputSink;
use poniard_common::diagnostic::Messager;
use poniard_common::manifest::{ComponentDecl, Manifest, ModuleDecl};

/// Per-component emission state, passed explicitly through the emitters.
pub struct CompilationContext<'m> {
    pub manifest: &'m Manifest,
    pub options: CompilerOptions,
    pub current_crate: String,
    /// Factory artifacts demanded by emitted expressions, by type name.
    pub factories: IndexMap<String, FactoryArtifact>,
    /// Module constructor proxies demanded by module instantiation.
    pub proxies: IndexMap<String, ModuleDecl>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ProcessResult {
    pub generated_files: usize,
    /// Components skipped because validation failed.
    pub skipped_components: usize,
    /// Components still deferred when rounds ran out; also reported as
    /// errors.
    pub deferred_components: Vec<String>,
}

pub struct Driver {
    options: CompilerOptions,
}

impl Driver {
    pub fn new(options: CompilerOptions) -> Self {
        Driver { options }
    }

    /// Processes manifest rounds in order. A component whose module set
    /// references a module not yet present is deferred to the next round;
    /// terminal deferrals are errors.
    pub fn process(
        &self,
        rounds: Vec<Manifest>,
        messager: &mut dyn Messager,
        sink: &mut dyn OutputSink,
    ) -> Result<ProcessResult> {
        let mut merged = Manifest::new();
        let mut result = ProcessResult::default();
        let mut pending: Vec<ComponentDecl> = Vec::new();
        for (round_index, round) in rounds.into_iter().enumerate() {
            info!(round = round_index, "processing round");
            let new_components = round.components.clone();
            merged.merge_from(&round);
            trace!(
                manifest = %serde_json::to_string(&merged).unwrap_or_default(),
                "merged manifest"
            );
            let queue: Vec<ComponentDecl> =
                pending.drain(..).chain(new_components).collect();
            for component_decl in queue {
                if let Some(missing) = self.missing_input(&merged, &component_decl) {
                    debug!(
                        component = %component_decl.type_data.readable(),
                        missing = %missing,
                        "deferring component to a later round"
                    );
                    pending.push(component_decl);
                    continue;
                }
                self.process_component(&merged, &component_decl, messager, sink, &mut result)?;
            }
        }
        for component_decl in pending {
            let element = component_decl.type_data.readable();
            let missing = self
                .missing_input(&merged, &component_decl)
                .unwrap_or_else(|| "an unknown input".to_owned());
            messager.error(
                &element,
                &ErrorKind::InvalidComponentDeclaration.format_message(
                    &format!(
                        "component could not be processed: {} never became available",
                        missing
                    ),
                    self.options.experimental_dagger_error_messages,
                ),
            );
            result.deferred_components.push(element);
        }
        if !result.deferred_components.is_empty() {
            info!(
                deferred = %result.deferred_components.iter().join(", "),
                "components deferred past the terminal round"
            );
        }
        Ok(result)
    }

    /// The first input the component needs that the merged manifest does not
    /// have yet, e.g. a generated module.
    fn missing_input(&self, manifest: &Manifest, component: &ComponentDecl) -> Option<String> {
        for module_type in &component.modules {
            if manifest.module(module_type).is_none() {
                return Some(module_type.readable());
            }
        }
        for subcomponent in &component.subcomponents {
            if let Some(missing) = self.missing_input(manifest, subcomponent) {
                return Some(missing);
            }
        }
        None
    }

    fn process_component(
        &self,
        manifest: &Manifest,
        component_decl: &ComponentDecl,
        messager: &mut dyn Messager,
        sink: &mut dyn OutputSink,
        result: &mut ProcessResult,
    ) -> Result<()> {
        let graph = build_graph(manifest, component_decl);
        let valid = validator::validate(
            &graph,
            self.options.experimental_dagger_error_messages,
            messager,
        );
        if !valid {
            // A fatal diagnostic aborts this component without touching
            // others.
            result.skipped_components += 1;
            return Ok(());
        }
        let mut ctx = CompilationContext {
            manifest,
            options: self.options.clone(),
            current_crate: component_decl.type_data.field_crate.clone(),
            factories: IndexMap::new(),
            proxies: IndexMap::new(),
        };
        let file = match component::emit_component(&mut ctx, &graph) {
            Ok(file) => file,
            Err(internal) => {
                self.report_internal(messager, &internal);
                result.skipped_components += 1;
                return Ok(());
            }
        };
        sink.write(file)?;
        result.generated_files += 1;
        for artifact in ctx.factories.values() {
            match factories::generate(artifact, &ctx.current_crate, &ctx.options) {
                Ok(file) => {
                    sink.write(file)?;
                    result.generated_files += 1;
                }
                Err(internal) => self.report_internal(messager, &internal),
            }
        }
        for module in ctx.proxies.values() {
            sink.write(module_proxy::generate(module, &ctx.current_crate, &ctx.options))?;
            result.generated_files += 1;
        }
        Ok(())
    }

    fn report_internal(&self, messager: &mut dyn Messager, internal: &InternalError) {
        messager.error(
            &internal.binding,
            &format!("poniard internal error: {}\n{}", internal.message, internal.backtrace()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use poniard_common::artifact::MemorySink;
    use poniard_common::diagnostic::CollectingMessager;
    use poniard_common::key::RequestKind;

    fn simple_manifest() -> (Manifest, ComponentDecl) {
        let module = module("MyModule", vec![provides("provide_foo", key("Foo"), vec![])]);
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        (
            manifest(vec![module], vec![], vec![component.clone()]),
            component,
        )
    }

    #[test]
    fn generates_component_and_factories() {
        let (manifest, component) = simple_manifest();
        let driver = Driver::new(CompilerOptions::new());
        let mut messager = CollectingMessager::new();
        let mut sink = MemorySink::new();
        let result = driver
            .process(vec![manifest], &mut messager, &mut sink)
            .unwrap();
        assert!(!messager.has_errors());
        assert_eq!(result.skipped_components, 0);
        assert!(sink.find(&component.impl_name()).is_some());
        assert!(sink.find("MyModule_provide_foo_Factory").is_some());
    }

    #[test]
    fn component_with_missing_module_defers_until_it_appears() {
        let late_module = module("LateModule", vec![provides("provide_foo", key("Foo"), vec![])]);
        let component = component(
            "MyComponent",
            &[&late_module],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let round_one = manifest(vec![], vec![], vec![component.clone()]);
        let round_two = manifest(vec![late_module], vec![], vec![]);
        let driver = Driver::new(CompilerOptions::new());
        let mut messager = CollectingMessager::new();
        let mut sink = MemorySink::new();
        let result = driver
            .process(vec![round_one, round_two], &mut messager, &mut sink)
            .unwrap();
        assert!(!messager.has_errors());
        assert!(result.deferred_components.is_empty());
        assert!(sink.find(&component.impl_name()).is_some());
    }

    #[test]
    fn terminal_deferral_is_an_error() {
        let ghost_module = module("GhostModule", vec![]);
        let component = component("MyComponent", &[&ghost_module], vec![]);
        let round = manifest(vec![], vec![], vec![component]);
        let driver = Driver::new(CompilerOptions::new());
        let mut messager = CollectingMessager::new();
        let mut sink = MemorySink::new();
        let result = driver.process(vec![round], &mut messager, &mut sink).unwrap();
        assert_eq!(result.deferred_components.len(), 1);
        assert!(messager.has_errors());
        assert!(messager
            .errors()
            .any(|diagnostic| diagnostic.message.contains("INVALID_COMPONENT_DECLARATION")));
    }

    #[test]
    fn invalid_component_is_skipped_but_others_emit() {
        let module_ok = module("OkModule", vec![provides("provide_foo", key("Foo"), vec![])]);
        let component_ok = component(
            "OkComponent",
            &[&module_ok],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let component_broken = component(
            "BrokenComponent",
            &[],
            vec![entry("bar", key("Bar"), RequestKind::Instance)],
        );
        let round = manifest(
            vec![module_ok],
            vec![],
            vec![component_broken, component_ok.clone()],
        );
        let driver = Driver::new(CompilerOptions::new());
        let mut messager = CollectingMessager::new();
        let mut sink = MemorySink::new();
        let result = driver.process(vec![round], &mut messager, &mut sink).unwrap();
        assert!(messager.has_errors());
        assert_eq!(result.skipped_components, 1);
        assert!(sink.find(&component_ok.impl_name()).is_some());
        assert!(sink.find("DaggerBrokenComponent").is_none());
    }

    #[test]
    fn knobs_do_not_change_validation_outcome() {
        let component = component(
            "MyComponent",
            &[],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let round = manifest(vec![], vec![], vec![component]);
        for options in [
            CompilerOptions::new(),
            CompilerOptions::new().fast_init(),
            CompilerOptions {
                experimental_dagger_error_messages: true,
                ..Default::default()
            },
        ] {
            let driver = Driver::new(options);
            let mut messager = CollectingMessager::new();
            let mut sink = MemorySink::new();
            let result = driver
                .process(vec![round.clone()], &mut messager, &mut sink)
                .unwrap();
            assert_eq!(result.skipped_components, 1);
            assert_eq!(messager.errors().count(), 1);
        }
    }
}
