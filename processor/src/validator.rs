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

use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::binding::BindingKind;
use crate::error::ErrorKind;
use crate::graph::BindingGraph;
use poniard_common::diagnostic::Messager;
use poniard_common::key::{RequestKind, Scope};

/// Runs every graph check and reports diagnostics. Returns `false` when a
/// fatal error was found, in which case emission must be skipped for this
/// component. Driver knobs deliberately play no part here.
pub fn validate(
    graph: &BindingGraph,
    message_layout_experimental: bool,
    messager: &mut dyn Messager,
) -> bool {
    let mut validator = Validator {
        graph,
        experimental: message_layout_experimental,
        messager,
        fatal: false,
    };
    validator.run();
    let mut valid = !validator.fatal;
    for subgraph in &graph.subgraphs {
        valid &= validate(subgraph, message_layout_experimental, messager);
    }
    valid
}

struct Validator<'a> {
    graph: &'a BindingGraph,
    experimental: bool,
    messager: &'a mut dyn Messager,
    fatal: bool,
}

impl<'a> Validator<'a> {
    fn element(&self) -> String {
        self.graph.component.type_data.readable()
    }

    fn error(&mut self, kind: ErrorKind, message: &str) {
        self.fatal = true;
        let element = self.element();
        self.messager
            .error(&element, &kind.format_message(message, self.experimental));
    }

    fn warning(&mut self, kind: ErrorKind, message: &str) {
        let element = self.element();
        self.messager
            .warning(&element, &kind.format_message(message, self.experimental));
    }

    fn run(&mut self) {
        debug!(component = %self.element(), "validating binding graph");
        self.check_unresolved();
        self.check_duplicates();
        self.check_cycles();
        self.check_scopes();
        self.check_assisted();
        self.check_production();
        self.check_nullability();
        self.check_map_keys();
        self.check_exposure();
    }

    fn check_unresolved(&mut self) {
        let graph = self.graph;
        for (key, requester) in &graph.unresolved {
            let message = format!(
                "missing bindings for {}\nrequested by: {}",
                key.readable(),
                requester
            );
            self.error(ErrorKind::MissingBinding, &message);
        }
    }

    fn check_duplicates(&mut self) {
        let graph = self.graph;
        for (key, first, second) in &graph.duplicates {
            let message = format!(
                "found duplicated bindings for {}, provided by:\n\t{}\n\t{}",
                key.readable(),
                first,
                second
            );
            self.error(ErrorKind::DuplicateBinding, &message);
        }
    }

    fn check_cycles(&mut self) {
        let graph = self.graph;
        for cycle in graph.illegal_cycles() {
            let mut rendering = String::new();
            for (position, ancestor) in cycle.ancestors.iter().enumerate() {
                if position == 0 {
                    rendering.push_str(&format!("*-- {}\n", ancestor));
                } else {
                    rendering.push_str(&format!("|   {}\n", ancestor));
                }
            }
            for (position, participant) in cycle.participants.iter().enumerate() {
                if position == 0 {
                    rendering.push_str(&format!("*-> {}\n", participant));
                } else {
                    rendering.push_str(&format!("    {}\n", participant));
                }
            }
            let message = format!("dependency cycle detected:\n{}", rendering);
            self.error(ErrorKind::DependencyCycle, &message);
        }
    }

    fn check_scopes(&mut self) {
        let graph = self.graph;
        for binding in graph.bindings() {
            if let Some(Scope::Named(scope)) = &binding.scope {
                let declared = graph.declared_scopes.iter().any(
                    |declared| matches!(declared, Scope::Named(declared) if declared == scope),
                );
                if !declared {
                    let message = format!(
                        "scope {} on {} is not declared on {} or any enclosing component",
                        scope.readable(),
                        binding.readable_name(),
                        graph.component.type_data.readable()
                    );
                    self.error(ErrorKind::ScopeNotOnComponent, &message);
                }
            }
        }
    }

    fn check_assisted(&mut self) {
        let graph = self.graph;
        // Assisted injections are only reachable through their factory, as
        // plain instances, and never scoped.
        for (key, index) in &graph.resolved {
            let binding = graph.graph.node_weight(*index).expect("node weight");
            if !matches!(binding.kind, BindingKind::AssistedInjection { .. }) {
                continue;
            }
            if binding.scope.is_some() {
                let message = format!(
                    "assisted injection {} must not be scoped",
                    binding.readable_name()
                );
                self.error(ErrorKind::IncompatibleAssistedUsage, &message);
            }
            for edge in graph
                .graph
                .edges_directed(*index, petgraph::Direction::Incoming)
            {
                let source = graph
                    .graph
                    .node_weight(edge.source())
                    .expect("node weight");
                let through_factory =
                    matches!(source.kind, BindingKind::AssistedFactory { .. });
                if !through_factory || edge.weight().kind != RequestKind::Instance {
                    let message = format!(
                        "{} is assisted-injected and can only be created through its assisted factory, not requested as {:?} by {}",
                        binding.readable_name(),
                        edge.weight().kind,
                        source.readable_name()
                    );
                    self.error(ErrorKind::IncompatibleAssistedUsage, &message);
                }
            }
            for root in &graph.roots {
                if root.key == *key {
                    let message = format!(
                        "{} is assisted-injected and cannot be exposed as entry point {}",
                        binding.readable_name(),
                        root.name
                    );
                    self.error(ErrorKind::IncompatibleAssistedUsage, &message);
                }
            }
        }
    }

    fn check_production(&mut self) {
        let graph = self.graph;
        if graph.component.production {
            return;
        }
        for binding in graph.bindings() {
            if binding.is_production() {
                let message = format!(
                    "production binding {} cannot be used in non-production component {}",
                    binding.readable_name(),
                    graph.component.type_data.readable()
                );
                self.error(ErrorKind::ProductionInNonProductionComponent, &message);
            }
        }
        for root in &graph.roots {
            if root.kind.is_production() {
                let message = format!(
                    "entry point {} requests {:?} from non-production component {}",
                    root.name,
                    root.kind,
                    graph.component.type_data.readable()
                );
                self.error(ErrorKind::ProductionInNonProductionComponent, &message);
            }
        }
    }

    fn check_nullability(&mut self) {
        let graph = self.graph;
        for index in graph.resolved.values().chain(graph.members_injections.values()) {
            for edge in graph.graph.edges(*index) {
                let target = graph
                    .graph
                    .node_weight(edge.target())
                    .expect("node weight");
                if target.nullable
                    && !edge.weight().nullable
                    && edge.weight().kind == RequestKind::Instance
                {
                    let source = graph
                        .graph
                        .node_weight(edge.source())
                        .expect("node weight");
                    let message = format!(
                        "{} is nullable, but {} requests it as non-nullable",
                        target.readable_name(),
                        source.readable_name()
                    );
                    self.error(ErrorKind::NullableToNonNullable, &message);
                }
            }
        }
        for root in &graph.roots {
            if root.kind != RequestKind::Instance || root.nullable {
                continue;
            }
            if let Some(binding) = graph.binding(&root.key) {
                if binding.nullable {
                    let message = format!(
                        "{} is nullable, but entry point {} is non-nullable",
                        binding.readable_name(),
                        root.name
                    );
                    self.error(ErrorKind::NullableToNonNullable, &message);
                }
            }
        }
    }

    fn check_map_keys(&mut self) {
        let collisions: Vec<_> = self
            .graph
            .map_key_collisions
            .iter()
            .map(|(key, map_key, first, second)| {
                (
                    key.readable(),
                    map_key.readable(),
                    first.clone(),
                    second.clone(),
                )
            })
            .collect();
        for (key, map_key, first, second) in collisions {
            if first == second {
                // Same underlying provider contributed twice; harmless but
                // worth pointing out.
                let message = format!(
                    "map {} binds key {} more than once to the same provider {}",
                    key, map_key, first
                );
                self.warning(ErrorKind::MultibindingMapKeyCollision, &message);
                continue;
            }
            let message = format!(
                "map {} has multiple bindings for key {}:\n\t{}\n\t{}",
                key, map_key, first, second
            );
            self.error(ErrorKind::MultibindingMapKeyCollision, &message);
        }
    }

    fn check_exposure(&mut self) {
        let graph = self.graph;
        let component_module = graph.component.declaring_module().to_owned();
        for root in &graph.roots {
            if !root.key.type_.erasure_accessible_from(&component_module) {
                let message = format!(
                    "entry point {} exposes {}, which is not accessible from {}",
                    root.name,
                    root.key.readable(),
                    component_module
                );
                self.error(ErrorKind::InaccessibleBindingExposure, &message);
            }
        }
    }
}

/// Convenience for tests and the driver: true when the graph would emit.
pub fn is_valid(graph: &BindingGraph, messager: &mut dyn Messager) -> bool {
    validate(graph, false, messager)
}
