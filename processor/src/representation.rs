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

use crate::binding::{Binding, BindingKind};
use crate::graph::BindingGraph;
use poniard_common::key::{RequestKind, Scope};

/// How a (binding, request kind) pair is satisfied at a usage site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Construction inlined at the usage site.
    DirectInstance,
    /// The value is obtained through a provider-like handle.
    FrameworkInstance,
}

/// Whether the binding's value must be cached behind a scoping wrapper.
///
/// A delegate caches only when its declared scope is strictly stronger than
/// its target's; equal (or weaker) scopes piggyback on the target's wrapper.
pub fn needs_caching(graph: &BindingGraph, binding: &Binding) -> bool {
    if binding.scope.is_none() {
        return false;
    }
    if let Some(source) = binding.delegate_source() {
        let target_scope = graph.scope_of(source);
        return Scope::strictly_stronger(&binding.scope, &target_scope);
    }
    true
}

/// Pure selection function over (binding, request kind, mode).
pub fn select(
    graph: &BindingGraph,
    binding: &Binding,
    request: RequestKind,
    fast_init: bool,
) -> Representation {
    if !matches!(request, RequestKind::Instance | RequestKind::Future) {
        return Representation::FrameworkInstance;
    }
    match binding.kind {
        BindingKind::MembersInjector { .. } | BindingKind::AssistedFactory { .. } => {
            Representation::FrameworkInstance
        }
        // TODO: assisted injection is inlined only under fast-init; decide
        // whether default mode should match.
        BindingKind::AssistedInjection { .. } => {
            if fast_init {
                Representation::DirectInstance
            } else {
                Representation::FrameworkInstance
            }
        }
        _ => {
            if needs_caching(graph, binding) {
                Representation::FrameworkInstance
            } else {
                Representation::DirectInstance
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::testing::*;
    use poniard_common::key::Scope;

    fn graph_with(
        bindings: Vec<poniard_common::manifest::BindingDecl>,
        entries: Vec<poniard_common::manifest::EntryPointDecl>,
    ) -> BindingGraph {
        let module = module("MyModule", bindings);
        let mut component = component("MyComponent", &[&module], entries);
        component.scopes.push(named_scope("MyScope"));
        let manifest = manifest(vec![module], vec![], vec![component.clone()]);
        build_graph(&manifest, &component)
    }

    #[test]
    fn unscoped_instance_request_is_direct() {
        let graph = graph_with(
            vec![provides("provide_foo", key("Foo"), vec![])],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let binding = graph.binding(&key("Foo")).unwrap();
        assert!(!needs_caching(&graph, binding));
        assert_eq!(
            select(&graph, binding, RequestKind::Instance, false),
            Representation::DirectInstance
        );
    }

    #[test]
    fn provider_request_is_always_framework() {
        let graph = graph_with(
            vec![provides("provide_foo", key("Foo"), vec![])],
            vec![entry("foo", key("Foo"), RequestKind::Provider)],
        );
        let binding = graph.binding(&key("Foo")).unwrap();
        assert_eq!(
            select(&graph, binding, RequestKind::Provider, false),
            Representation::FrameworkInstance
        );
        assert_eq!(
            select(&graph, binding, RequestKind::Lazy, false),
            Representation::FrameworkInstance
        );
    }

    #[test]
    fn scoped_instance_request_is_framework() {
        let mut scoped = provides("provide_foo", key("Foo"), vec![]);
        scoped.scope = Some(named_scope("MyScope"));
        let graph = graph_with(
            vec![scoped],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let binding = graph.binding(&key("Foo")).unwrap();
        assert!(needs_caching(&graph, binding));
        assert_eq!(
            select(&graph, binding, RequestKind::Instance, false),
            Representation::FrameworkInstance
        );
    }

    #[test]
    fn delegate_with_equal_scope_does_not_cache() {
        let mut source = provides("provide_impl", key("FooImpl"), vec![]);
        source.scope = Some(named_scope("MyScope"));
        let mut delegate = binds("bind_foo", key("Foo"), key("FooImpl"));
        delegate.scope = Some(named_scope("MyScope"));
        let graph = graph_with(
            vec![source, delegate],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let binding = graph.binding(&key("Foo")).unwrap();
        assert!(!needs_caching(&graph, binding));
    }

    #[test]
    fn delegate_promoted_over_reusable_target_caches() {
        let mut source = provides("provide_impl", key("FooImpl"), vec![]);
        source.scope = Some(Scope::Reusable);
        let mut delegate = binds("bind_foo", key("Foo"), key("FooImpl"));
        delegate.scope = Some(named_scope("MyScope"));
        let graph = graph_with(
            vec![source, delegate],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let binding = graph.binding(&key("Foo")).unwrap();
        assert!(needs_caching(&graph, binding));
    }

    #[test]
    fn unscoped_delegate_never_caches() {
        let mut source = provides("provide_impl", key("FooImpl"), vec![]);
        source.scope = Some(named_scope("MyScope"));
        let delegate = binds("bind_foo", key("Foo"), key("FooImpl"));
        let graph = graph_with(
            vec![source, delegate],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let binding = graph.binding(&key("Foo")).unwrap();
        assert!(!needs_caching(&graph, binding));
    }

    #[test]
    fn assisted_injection_is_direct_only_under_fast_init() {
        use poniard_common::manifest::AssistedParamDecl;
        let mut assisted = injectable("Widget", vec![]);
        assisted.assisted.push(AssistedParamDecl {
            name: "seed".to_owned(),
            type_data: poniard_common::type_data::TypeData::primitive("i32"),
        });
        let factory = poniard_common::manifest::AssistedFactoryDecl {
            type_data: type_("WidgetFactory"),
            target: key("Widget"),
            method_name: "create".to_owned(),
        };
        let component = component(
            "MyComponent",
            &[],
            vec![entry("factory", key("WidgetFactory"), RequestKind::Instance)],
        );
        let mut manifest = manifest(vec![], vec![assisted], vec![component.clone()]);
        manifest.assisted_factories.push(factory);
        let graph = build_graph(&manifest, &component);
        let binding = graph.binding(&key("Widget")).unwrap();
        assert_eq!(
            select(&graph, binding, RequestKind::Instance, true),
            Representation::DirectInstance
        );
        assert_eq!(
            select(&graph, binding, RequestKind::Instance, false),
            Representation::FrameworkInstance
        );
        let factory_binding = graph.binding(&key("WidgetFactory")).unwrap();
        assert_eq!(
            select(&graph, factory_binding, RequestKind::Instance, true),
            Representation::FrameworkInstance
        );
    }
}
