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

use std::collections::{BTreeSet, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use tracing::{debug, trace};

use crate::binding::{Binding, BindingKind, DependencyRequest};
use poniard_common::key::{Key, MapKey, MultibindingSlot, RequestKind, Scope};
use poniard_common::manifest::{
    BindingDecl, BindingDeclKind, ComponentDecl, Manifest, MultibindingContribution,
};

/// One edge of the binding graph: how the source binding asks for the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DependencyEdge {
    pub kind: RequestKind,
    pub nullable: bool,
}

/// An entry-point request seeding resolution.
#[derive(Debug, Clone)]
pub struct RootRequest {
    pub name: String,
    pub key: Key,
    pub kind: RequestKind,
    pub nullable: bool,
}

#[derive(Debug)]
pub struct CycleReport {
    /// Readable binding names along the cycle, starting at the re-entered
    /// binding.
    pub participants: Vec<String>,
    /// Request chain leading into the cycle, outermost first.
    pub ancestors: Vec<String>,
    pub legal: bool,
}

/// Rooted binding graph of one component. Nodes live in a stable arena;
/// enumeration order is resolution order, a deterministic function of
/// declaration order.
#[derive(Debug)]
pub struct BindingGraph {
    pub component: ComponentDecl,
    pub graph: StableDiGraph<Binding, DependencyEdge>,
    pub resolved: IndexMap<Key, NodeIndex>,
    /// Members-injection bindings live in their own namespace so a key can
    /// have both a provision and a members-injection recipe.
    pub members_injections: IndexMap<Key, NodeIndex>,
    pub roots: Vec<RootRequest>,
    /// Keys satisfied by an ancestor component's binding.
    pub inherited: IndexSet<Key>,
    /// Scopes declared on this component and every enclosing one.
    pub declared_scopes: Vec<Scope>,
    pub unresolved: Vec<(Key, String)>,
    pub duplicates: Vec<(Key, String, String)>,
    pub map_key_collisions: Vec<(Key, MapKey, String, String)>,
    pub cycles: Vec<CycleReport>,
    pub subgraphs: Vec<BindingGraph>,
}

impl BindingGraph {
    pub fn binding(&self, key: &Key) -> Option<&Binding> {
        self.resolved
            .get(key)
            .and_then(|index| self.graph.node_weight(*index))
    }

    pub fn members_injection(&self, key: &Key) -> Option<&Binding> {
        self.members_injections
            .get(key)
            .and_then(|index| self.graph.node_weight(*index))
    }

    pub fn scope_of(&self, key: &Key) -> Option<Scope> {
        self.binding(key).and_then(|binding| binding.scope.clone())
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.resolved
            .values()
            .chain(self.members_injections.values())
            .filter_map(|index| self.graph.node_weight(*index))
    }

    pub fn illegal_cycles(&self) -> impl Iterator<Item = &CycleReport> {
        self.cycles.iter().filter(|cycle| !cycle.legal)
    }
}

/// Resolves a component declaration into a [`BindingGraph`], recursively
/// building subgraphs for its subcomponents.
pub fn build_graph(manifest: &Manifest, component: &ComponentDecl) -> BindingGraph {
    build(manifest, component, &[])
}

/// What an enclosing component can satisfy for its subcomponents.
struct AncestorLevel {
    explicit: IndexSet<Key>,
    resolved: IndexSet<Key>,
    scopes: Vec<Scope>,
}

fn build(
    manifest: &Manifest,
    component: &ComponentDecl,
    ancestors: &[AncestorLevel],
) -> BindingGraph {
    debug!(component = %component.type_data.readable(), "building binding graph");
    let mut builder = GraphBuilder::new(manifest, component, ancestors);
    builder.index_modules();
    builder.index_component_bindings();

    for entry_point in &component.entry_points {
        builder.roots.push(RootRequest {
            name: entry_point.name.clone(),
            key: entry_point.key.clone(),
            kind: entry_point.kind,
            nullable: entry_point.nullable,
        });
    }
    builder.resolve_roots();

    // Subcomponents resolve against everything this component could provide.
    let mut declared_scopes = component.scopes.clone();
    for ancestor in ancestors {
        declared_scopes.extend_from_slice(&ancestor.scopes);
    }
    let mut subgraphs = Vec::new();
    {
        let mut levels: Vec<AncestorLevel> = Vec::new();
        for ancestor in ancestors {
            levels.push(AncestorLevel {
                explicit: ancestor.explicit.clone(),
                resolved: ancestor.resolved.clone(),
                scopes: ancestor.scopes.clone(),
            });
        }
        levels.push(AncestorLevel {
            explicit: builder.explicit.keys().cloned().collect(),
            resolved: builder.resolved.keys().cloned().collect(),
            scopes: component.scopes.clone(),
        });
        for subcomponent in &component.subcomponents {
            let subgraph = build(manifest, subcomponent, &levels);
            // Absorb whatever the children could not resolve themselves and
            // this component is the nearest owner of.
            let absorbed: Vec<Key> = subgraph
                .inherited
                .iter()
                .filter(|key| !builder.resolved.contains_key(*key))
                .cloned()
                .collect();
            for key in absorbed {
                builder.resolve_inherited(key, &subgraph.component);
            }
            subgraphs.push(subgraph);
        }
    }

    let cycles = builder.detect_cycles();
    BindingGraph {
        component: component.clone(),
        graph: builder.graph,
        resolved: builder.resolved,
        members_injections: builder.members_injections,
        roots: builder.roots,
        inherited: builder.inherited,
        declared_scopes,
        unresolved: builder.unresolved,
        duplicates: builder.duplicates,
        map_key_collisions: builder.map_key_collisions,
        cycles,
        subgraphs,
    }
}

enum Resolution {
    Binding(Binding),
    Inherited,
    Missing,
}

struct GraphBuilder<'a> {
    manifest: &'a Manifest,
    component: &'a ComponentDecl,
    ancestors: &'a [AncestorLevel],
    explicit: IndexMap<Key, Binding>,
    vec_contributions: IndexMap<Key, Vec<Key>>,
    map_contributions: IndexMap<Key, Vec<(MapKey, Key)>>,
    optional_decls: IndexSet<Key>,
    graph: StableDiGraph<Binding, DependencyEdge>,
    resolved: IndexMap<Key, NodeIndex>,
    members_injections: IndexMap<Key, NodeIndex>,
    inherited: IndexSet<Key>,
    roots: Vec<RootRequest>,
    unresolved: Vec<(Key, String)>,
    duplicates: Vec<(Key, String, String)>,
    map_key_collisions: Vec<(Key, MapKey, String, String)>,
}

impl<'a> GraphBuilder<'a> {
    fn new(
        manifest: &'a Manifest,
        component: &'a ComponentDecl,
        ancestors: &'a [AncestorLevel],
    ) -> Self {
        GraphBuilder {
            manifest,
            component,
            ancestors,
            explicit: IndexMap::new(),
            vec_contributions: IndexMap::new(),
            map_contributions: IndexMap::new(),
            optional_decls: IndexSet::new(),
            graph: StableDiGraph::new(),
            resolved: IndexMap::new(),
            members_injections: IndexMap::new(),
            inherited: IndexSet::new(),
            roots: Vec::new(),
            unresolved: Vec::new(),
            duplicates: Vec::new(),
            map_key_collisions: Vec::new(),
        }
    }

    fn register(&mut self, key: Key, binding: Binding) {
        if let Some(existing) = self.explicit.get(&key) {
            let equivalent = existing.is_delegate()
                && binding.is_delegate()
                && existing.delegate_source() == binding.delegate_source()
                && existing.scope == binding.scope;
            if !equivalent {
                self.duplicates.push((
                    key,
                    existing.readable_name(),
                    binding.readable_name(),
                ));
            }
            return;
        }
        self.explicit.insert(key, binding);
    }

    fn index_modules(&mut self) {
        let manifest = self.manifest;
        let component = self.component;
        for module_type in &component.modules {
            let Some(module) = manifest.module(module_type) else {
                // The driver defers components whose modules are not in the
                // manifest yet; reaching this means the terminal round already
                // reported it.
                continue;
            };
            for decl in &module.bindings {
                match decl.decl_kind {
                    BindingDeclKind::BindsOptionalOf => {
                        self.optional_decls.insert(decl.key.clone());
                    }
                    BindingDeclKind::Multibinds => {
                        if decl.key.type_.path == "std::collections::HashMap" {
                            self.map_contributions
                                .entry(decl.key.clone())
                                .or_default();
                        } else {
                            self.vec_contributions
                                .entry(decl.key.clone())
                                .or_default();
                        }
                    }
                    BindingDeclKind::Provides
                    | BindingDeclKind::Binds
                    | BindingDeclKind::Produces => match &decl.multibinding {
                        MultibindingContribution::None => {
                            let binding =
                                Binding::from_module_decl(module, decl, decl.key.clone());
                            self.register(decl.key.clone(), binding);
                        }
                        MultibindingContribution::IntoVec => {
                            let aggregated = decl.key.multibound_vec();
                            let index = self
                                .vec_contributions
                                .entry(aggregated.clone())
                                .or_default()
                                .len() as u32;
                            let slotted = decl
                                .key
                                .clone()
                                .with_slot(MultibindingSlot::Element(index));
                            self.vec_contributions
                                .get_mut(&aggregated)
                                .expect("just inserted")
                                .push(slotted.clone());
                            let binding =
                                Binding::from_module_decl(module, decl, slotted.clone());
                            self.register(slotted, binding);
                        }
                        MultibindingContribution::IntoMap(map_key) => {
                            let aggregated = decl.key.multibound_map(map_key);
                            let slotted = decl
                                .key
                                .clone()
                                .with_slot(MultibindingSlot::Entry(map_key.clone()));
                            let binding =
                                Binding::from_module_decl(module, decl, slotted.clone());
                            let entries = self
                                .map_contributions
                                .entry(aggregated.clone())
                                .or_default();
                            if let Some((_, previous)) = entries
                                .iter()
                                .find(|(existing_key, _)| existing_key == map_key)
                            {
                                let previous = previous.clone();
                                self.map_key_collisions.push((
                                    aggregated,
                                    map_key.clone(),
                                    previous.readable(),
                                    binding.readable_name(),
                                ));
                                continue;
                            }
                            entries.push((map_key.clone(), slotted.clone()));
                            self.register(slotted, binding);
                        }
                    },
                }
            }
        }
    }

    fn index_component_bindings(&mut self) {
        let component = self.component;
        let declaring_module = component.declaring_module().to_owned();
        let component_binding = Binding {
            key: Key::new(component.type_data.clone()),
            kind: BindingKind::Component {
                type_: component.type_data.clone(),
            },
            scope: None,
            dependencies: Vec::new(),
            declaring_module: declaring_module.clone(),
            nullable: false,
        };
        self.register(component_binding.key.clone(), component_binding);

        for dependency in &component.dependencies {
            let dependency_binding = Binding {
                key: Key::new(dependency.type_data.clone()),
                kind: BindingKind::ComponentDependency {
                    type_: dependency.type_data.clone(),
                },
                scope: None,
                dependencies: Vec::new(),
                declaring_module: declaring_module.clone(),
                nullable: false,
            };
            self.register(dependency_binding.key.clone(), dependency_binding);
            for provision in &dependency.provisions {
                let kind = if provision.production {
                    BindingKind::ComponentProduction {
                        dependency: dependency.type_data.clone(),
                        method: provision.name.clone(),
                    }
                } else {
                    BindingKind::ComponentProvision {
                        dependency: dependency.type_data.clone(),
                        method: provision.name.clone(),
                    }
                };
                let binding = Binding {
                    key: provision.key.clone(),
                    kind,
                    scope: None,
                    dependencies: Vec::new(),
                    declaring_module: declaring_module.clone(),
                    nullable: false,
                };
                self.register(provision.key.clone(), binding);
            }
        }

        for bound in &component.bound_instances {
            let binding = Binding {
                key: bound.key.clone(),
                kind: BindingKind::BoundInstance {
                    name: bound.name.clone(),
                },
                scope: None,
                dependencies: Vec::new(),
                declaring_module: declaring_module.clone(),
                nullable: bound.nullable,
            };
            self.register(bound.key.clone(), binding);
        }

        for subcomponent in &component.subcomponents {
            let binding = Binding {
                key: Key::new(subcomponent.type_data.clone()),
                kind: BindingKind::SubcomponentCreator {
                    subcomponent: subcomponent.type_data.clone(),
                },
                scope: None,
                dependencies: Vec::new(),
                declaring_module: declaring_module.clone(),
                nullable: false,
            };
            self.register(binding.key.clone(), binding);
        }
    }

    fn resolve_roots(&mut self) {
        let mut queue: VecDeque<(Key, bool, String)> = VecDeque::new();
        for root in &self.roots {
            let requester = format!(
                "{}.{}",
                self.component.type_data.readable(),
                root.name
            );
            match root.kind {
                RequestKind::MembersInjector => {
                    queue.push_back((root.key.clone(), true, requester))
                }
                _ => queue.push_back((root.key.clone(), false, requester)),
            }
        }
        self.run_worklist(queue);
    }

    /// Resolves a key a subcomponent needs from this component.
    fn resolve_inherited(&mut self, key: Key, requester: &ComponentDecl) {
        let mut queue = VecDeque::new();
        queue.push_back((
            key,
            false,
            format!("subcomponent {}", requester.type_data.readable()),
        ));
        self.run_worklist(queue);
    }

    fn run_worklist(&mut self, mut queue: VecDeque<(Key, bool, String)>) {
        // Edges are recorded as (source node, target key, edge, namespace) and
        // linked once every endpoint has a node.
        let mut pending_edges: Vec<(NodeIndex, Key, DependencyEdge, bool)> = Vec::new();

        while let Some((key, members_namespace, requester)) = queue.pop_front() {
            if members_namespace {
                if self.members_injections.contains_key(&key) {
                    continue;
                }
                let binding = self.members_injection_binding(&key);
                let index = self.add_node(&key, binding, true, &mut queue, &mut pending_edges);
                trace!(key = %key.readable(), node = index.index(), "members injection");
                continue;
            }
            if self.resolved.contains_key(&key) || self.inherited.contains(&key) {
                continue;
            }
            match self.lookup(&key) {
                Resolution::Binding(binding) => {
                    let index =
                        self.add_node(&key, binding, false, &mut queue, &mut pending_edges);
                    trace!(key = %key.readable(), node = index.index(), "resolved");
                }
                Resolution::Inherited => {
                    self.inherited.insert(key);
                }
                Resolution::Missing => {
                    self.unresolved.push((key, requester));
                }
            }
        }

        for (source, target_key, edge, members_namespace) in pending_edges {
            let target = if members_namespace {
                self.members_injections.get(&target_key)
            } else {
                self.resolved.get(&target_key)
            };
            if let Some(target) = target {
                self.graph.add_edge(source, *target, edge);
            }
        }
    }

    fn add_node(
        &mut self,
        key: &Key,
        binding: Binding,
        members_namespace: bool,
        queue: &mut VecDeque<(Key, bool, String)>,
        pending_edges: &mut Vec<(NodeIndex, Key, DependencyEdge, bool)>,
    ) -> NodeIndex {
        let requester = binding.readable_name();
        let dependencies = binding.dependencies.clone();
        let index = self.graph.add_node(binding);
        if members_namespace {
            self.members_injections.insert(key.clone(), index);
        } else {
            self.resolved.insert(key.clone(), index);
        }
        for dependency in dependencies {
            let dependency_namespace = dependency.kind == RequestKind::MembersInjector;
            queue.push_back((
                dependency.key.clone(),
                dependency_namespace,
                requester.clone(),
            ));
            pending_edges.push((
                index,
                dependency.key.clone(),
                DependencyEdge {
                    kind: dependency.kind,
                    nullable: dependency.nullable,
                },
                dependency_namespace,
            ));
        }
        index
    }

    fn members_injection_binding(&self, key: &Key) -> Binding {
        let members: Vec<_> = self
            .manifest
            .injectable(&key.type_)
            .map(|injectable| {
                injectable
                    .members
                    .iter()
                    .map(DependencyRequest::from_decl)
                    .collect()
            })
            .unwrap_or_default();
        Binding {
            key: key.clone(),
            kind: BindingKind::MembersInjection {
                target: key.type_.clone(),
                members: members.clone(),
            },
            scope: None,
            dependencies: members,
            declaring_module: key.type_.declaring_module.clone(),
            nullable: false,
        }
    }

    /// Locates the binding source for a key, in priority order: explicit
    /// module binding, constructor-injectable type, multibinding synthesis,
    /// optional synthesis, ancestor component's binding.
    fn lookup(&mut self, key: &Key) -> Resolution {
        if let Some(binding) = self.explicit.get(key) {
            return Resolution::Binding(binding.clone());
        }
        if self
            .ancestors
            .iter()
            .any(|ancestor| ancestor.explicit.contains(key))
        {
            return Resolution::Inherited;
        }
        if key.type_.path == "poniard::MembersInjector" {
            if let Some(target) = key.type_.args.first() {
                return Resolution::Binding(Binding {
                    key: key.clone(),
                    kind: BindingKind::MembersInjector {
                        target: target.clone(),
                    },
                    scope: None,
                    dependencies: vec![DependencyRequest {
                        name: "target".to_owned(),
                        key: Key::new(target.clone()),
                        kind: RequestKind::MembersInjector,
                        nullable: false,
                    }],
                    declaring_module: target.declaring_module.clone(),
                    nullable: false,
                });
            }
        }
        if key.qualifier.is_none() && key.slot.is_none() {
            if let Some(injectable) = self.manifest.injectable(&key.type_) {
                // A binding whose scope only an enclosing component declares
                // belongs to that component.
                if let Some(Scope::Named(scope)) = &injectable.scope {
                    let own = self
                        .component
                        .scopes
                        .iter()
                        .any(|declared| matches!(declared, Scope::Named(s) if s == scope));
                    let ancestor = self.ancestors.iter().any(|level| {
                        level
                            .scopes
                            .iter()
                            .any(|declared| matches!(declared, Scope::Named(s) if s == scope))
                    });
                    if !own && ancestor {
                        return Resolution::Inherited;
                    }
                }
                return Resolution::Binding(Binding::from_injectable(injectable));
            }
            if let Some(factory) = self
                .manifest
                .assisted_factories
                .iter()
                .find(|factory| factory.type_data == key.type_)
            {
                return Resolution::Binding(Binding {
                    key: key.clone(),
                    kind: BindingKind::AssistedFactory {
                        factory: factory.type_data.clone(),
                        target: factory.target.clone(),
                        method: factory.method_name.clone(),
                    },
                    scope: None,
                    dependencies: vec![DependencyRequest::instance(factory.target.clone())],
                    declaring_module: factory.type_data.declaring_module.clone(),
                    nullable: false,
                });
            }
        }
        if let Some(contributions) = self.vec_contributions.get(key) {
            return Resolution::Binding(Binding {
                key: key.clone(),
                kind: BindingKind::MultiboundVec {
                    contributions: contributions.clone(),
                },
                scope: None,
                dependencies: contributions
                    .iter()
                    .cloned()
                    .map(DependencyRequest::instance)
                    .collect(),
                declaring_module: self.component.declaring_module().to_owned(),
                nullable: false,
            });
        }
        if let Some(contributions) = self.map_contributions.get(key) {
            return Resolution::Binding(Binding {
                key: key.clone(),
                kind: BindingKind::MultiboundMap {
                    contributions: contributions.clone(),
                },
                scope: None,
                dependencies: contributions
                    .iter()
                    .map(|(_, contribution)| DependencyRequest::instance(contribution.clone()))
                    .collect(),
                declaring_module: self.component.declaring_module().to_owned(),
                nullable: false,
            });
        }
        if key.type_.path == "std::option::Option" {
            if let Some(inner) = key.type_.args.first() {
                let inner_key = Key {
                    type_: inner.clone(),
                    qualifier: key.qualifier.clone(),
                    slot: None,
                };
                if self.optional_decls.contains(&inner_key) {
                    let present = self.can_resolve(&inner_key);
                    return Resolution::Binding(Binding {
                        key: key.clone(),
                        kind: BindingKind::Optional {
                            underlying: present.then(|| inner_key.clone()),
                        },
                        scope: None,
                        dependencies: if present {
                            vec![DependencyRequest::instance(inner_key)]
                        } else {
                            Vec::new()
                        },
                        declaring_module: self.component.declaring_module().to_owned(),
                        nullable: false,
                    });
                }
            }
        }
        if self.ancestors.iter().any(|ancestor| {
            ancestor.resolved.contains(key) || ancestor.explicit.contains(key)
        }) {
            return Resolution::Inherited;
        }
        Resolution::Missing
    }

    /// Presence probe for optional synthesis; must not allocate nodes.
    fn can_resolve(&self, key: &Key) -> bool {
        self.explicit.contains_key(key)
            || (key.qualifier.is_none()
                && key.slot.is_none()
                && self.manifest.injectable(&key.type_).is_some())
            || self.vec_contributions.contains_key(key)
            || self.map_contributions.contains_key(key)
            || self
                .ancestors
                .iter()
                .any(|ancestor| ancestor.explicit.contains(key))
    }

    /// DFS cycle search. A cycle is legal when a non-`Instance` edge breaks
    /// it, unless every participant is a delegate: pure delegate chains get no
    /// indirection exception.
    fn detect_cycles(&self) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        let mut reported: HashSet<BTreeSet<usize>> = HashSet::new();
        let mut done: HashSet<NodeIndex> = HashSet::new();
        for index in self.resolved.values().chain(self.members_injections.values()) {
            if !done.contains(index) {
                // The incoming kind of the starting node is never inspected;
                // kinds are collected from the second cycle participant on.
                let mut path = vec![(*index, RequestKind::Instance)];
                self.visit_cycles(*index, &mut path, &mut done, &mut reported, &mut reports);
            }
        }
        reports
    }

    /// `path` always ends with `node` paired with the kind of the edge that
    /// led into it.
    fn visit_cycles(
        &self,
        node: NodeIndex,
        path: &mut Vec<(NodeIndex, RequestKind)>,
        done: &mut HashSet<NodeIndex>,
        reported: &mut HashSet<BTreeSet<usize>>,
        reports: &mut Vec<CycleReport>,
    ) {
        let neighbors: Vec<(NodeIndex, DependencyEdge)> = self
            .graph
            .edges(node)
            .map(|edge| {
                (
                    petgraph::visit::EdgeRef::target(&edge),
                    *petgraph::visit::EdgeRef::weight(&edge),
                )
            })
            .collect();
        for (target, edge) in neighbors {
            if let Some(position) = path.iter().position(|(on_path, _)| *on_path == target) {
                let cycle_nodes: Vec<NodeIndex> =
                    path[position..].iter().map(|(index, _)| *index).collect();
                let signature: BTreeSet<usize> =
                    cycle_nodes.iter().map(|index| index.index()).collect();
                if !reported.insert(signature) {
                    continue;
                }
                // Edge kinds within the cycle: the incoming kinds of every
                // participant after the entry, plus the closing edge.
                let mut kinds: Vec<RequestKind> = path[position + 1..]
                    .iter()
                    .map(|(_, incoming)| *incoming)
                    .collect();
                kinds.push(edge.kind);
                let all_delegates = cycle_nodes.iter().all(|index| {
                    self.graph
                        .node_weight(*index)
                        .map(Binding::is_delegate)
                        .unwrap_or(false)
                });
                let legal = kinds.iter().any(|kind| *kind != RequestKind::Instance)
                    && !all_delegates;
                let participants = cycle_nodes
                    .iter()
                    .filter_map(|index| self.graph.node_weight(*index))
                    .map(Binding::readable_name)
                    .collect();
                let ancestors = path[..position]
                    .iter()
                    .filter_map(|(index, _)| self.graph.node_weight(*index))
                    .map(Binding::readable_name)
                    .collect();
                reports.push(CycleReport {
                    participants,
                    ancestors,
                    legal,
                });
            } else if !done.contains(&target) {
                path.push((target, edge.kind));
                self.visit_cycles(target, path, done, reported, reports);
                path.pop();
            }
        }
        done.insert(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use poniard_common::manifest::MultibindingContribution;

    #[test]
    fn resolves_linear_chain() {
        let module = module(
            "MyModule",
            vec![
                provides("provide_foo", key("Foo"), vec![dependency("Bar", RequestKind::Instance)]),
                provides("provide_bar", key("Bar"), vec![]),
            ],
        );
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let manifest = manifest(vec![module], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest, &component);
        assert!(graph.unresolved.is_empty());
        assert!(graph.binding(&key("Foo")).is_some());
        assert!(graph.binding(&key("Bar")).is_some());
        assert!(graph.illegal_cycles().next().is_none());
    }

    #[test]
    fn explicit_binding_wins_over_injectable() {
        let module = module("MyModule", vec![provides("provide_foo", key("Foo"), vec![])]);
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let manifest = manifest(
            vec![module],
            vec![injectable("Foo", vec![])],
            vec![component.clone()],
        );
        let graph = build_graph(&manifest, &component);
        assert!(matches!(
            graph.binding(&key("Foo")).unwrap().kind,
            BindingKind::Provision { .. }
        ));
    }

    #[test]
    fn missing_binding_records_requester() {
        let component = component(
            "MyComponent",
            &[],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let manifest = manifest(vec![], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest, &component);
        assert_eq!(graph.unresolved.len(), 1);
        assert_eq!(graph.unresolved[0].0, key("Foo"));
        assert!(graph.unresolved[0].1.contains("foo"));
    }

    #[test]
    fn duplicate_bindings_are_recorded() {
        let module_a = module("ModuleA", vec![provides("provide_foo", key("Foo"), vec![])]);
        let module_b = module("ModuleB", vec![provides("also_foo", key("Foo"), vec![])]);
        let component = component(
            "MyComponent",
            &[&module_a, &module_b],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let manifest = manifest(vec![module_a, module_b], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest, &component);
        assert_eq!(graph.duplicates.len(), 1);
    }

    #[test]
    fn equivalent_delegates_are_not_duplicates() {
        let module_a = module("ModuleA", vec![binds("bind_foo", key("Foo"), key("FooImpl"))]);
        let module_b = module("ModuleB", vec![binds("bind_foo", key("Foo"), key("FooImpl"))]);
        let component = component(
            "MyComponent",
            &[&module_a, &module_b],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let manifest = manifest(
            vec![module_a, module_b],
            vec![injectable("FooImpl", vec![])],
            vec![component.clone()],
        );
        let graph = build_graph(&manifest, &component);
        assert!(graph.duplicates.is_empty());
    }

    #[test]
    fn instance_cycle_is_illegal() {
        let module = module(
            "MyModule",
            vec![
                provides("provide_foo", key("Foo"), vec![dependency("Bar", RequestKind::Instance)]),
                provides("provide_bar", key("Bar"), vec![dependency("Foo", RequestKind::Instance)]),
            ],
        );
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let manifest = manifest(vec![module], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest, &component);
        assert_eq!(graph.illegal_cycles().count(), 1);
    }

    #[test]
    fn provider_edge_legalizes_cycle() {
        let module = module(
            "MyModule",
            vec![
                provides("provide_foo", key("Foo"), vec![dependency("Bar", RequestKind::Instance)]),
                provides("provide_bar", key("Bar"), vec![dependency("Foo", RequestKind::Provider)]),
            ],
        );
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let manifest = manifest(vec![module], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest, &component);
        assert_eq!(graph.cycles.len(), 1);
        assert!(graph.cycles[0].legal);
        assert!(graph.illegal_cycles().next().is_none());
    }

    #[test]
    fn pure_delegate_cycle_is_illegal_despite_kind() {
        // Foo binds to Bar binds to Foo; no indirection exception applies.
        let mut bind_a = binds("bind_foo", key("Foo"), key("Bar"));
        bind_a.dependencies[0].kind = RequestKind::Provider;
        let bind_b = binds("bind_bar", key("Bar"), key("Foo"));
        let module = module("MyModule", vec![bind_a, bind_b]);
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let manifest = manifest(vec![module], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest, &component);
        assert_eq!(graph.illegal_cycles().count(), 1);
    }

    #[test]
    fn vec_contributions_aggregate() {
        let mut contribution_a = provides("provide_one", key("Foo"), vec![]);
        contribution_a.multibinding = MultibindingContribution::IntoVec;
        let mut contribution_b = provides("provide_two", key("Foo"), vec![]);
        contribution_b.multibinding = MultibindingContribution::IntoVec;
        let module = module("MyModule", vec![contribution_a, contribution_b]);
        let vec_key = key("Foo").multibound_vec();
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foos", vec_key.clone(), RequestKind::Instance)],
        );
        let manifest = manifest(vec![module], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest, &component);
        let binding = graph.binding(&vec_key).unwrap();
        match &binding.kind {
            BindingKind::MultiboundVec { contributions } => assert_eq!(contributions.len(), 2),
            kind => panic!("wrong kind: {:?}", kind),
        }
    }

    #[test]
    fn duplicate_map_keys_are_collisions_not_duplicates() {
        let map_key = MapKey::Str("k".to_owned());
        let mut contribution_a = provides("provide_one", key("Foo"), vec![]);
        contribution_a.multibinding = MultibindingContribution::IntoMap(map_key.clone());
        let mut contribution_b = provides("provide_two", key("Foo"), vec![]);
        contribution_b.multibinding = MultibindingContribution::IntoMap(map_key.clone());
        let module = module("MyModule", vec![contribution_a, contribution_b]);
        let map_key_aggregated = key("Foo").multibound_map(&map_key);
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foos", map_key_aggregated, RequestKind::Instance)],
        );
        let manifest = manifest(vec![module], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest, &component);
        assert!(graph.duplicates.is_empty());
        assert_eq!(graph.map_key_collisions.len(), 1);
    }

    #[test]
    fn optional_synthesis_tracks_presence() {
        use poniard_common::key::option_of;
        let mut optional_decl = BindingDecl::new(BindingDeclKind::BindsOptionalOf);
        optional_decl.name = "optional_foo".to_owned();
        optional_decl.key = key("Foo");
        let module = module("MyModule", vec![optional_decl]);
        let option_key = Key::new(option_of(&type_("Foo")));
        let component = component(
            "MyComponent",
            &[&module],
            vec![entry("foo", option_key.clone(), RequestKind::Instance)],
        );
        // Absent underlying binding.
        let manifest_absent = manifest(vec![module.clone()], vec![], vec![component.clone()]);
        let graph = build_graph(&manifest_absent, &component);
        match &graph.binding(&option_key).unwrap().kind {
            BindingKind::Optional { underlying } => assert!(underlying.is_none()),
            kind => panic!("wrong kind: {:?}", kind),
        }
        // Present underlying binding.
        let manifest_present = manifest(
            vec![module],
            vec![injectable("Foo", vec![])],
            vec![component.clone()],
        );
        let graph = build_graph(&manifest_present, &component);
        match &graph.binding(&option_key).unwrap().kind {
            BindingKind::Optional { underlying } => assert!(underlying.is_some()),
            kind => panic!("wrong kind: {:?}", kind),
        }
    }

    #[test]
    fn subcomponent_inherits_parent_binding() {
        let parent_module = module("ParentModule", vec![provides("provide_bar", key("Bar"), vec![])]);
        let child_module = module(
            "ChildModule",
            vec![provides("provide_foo", key("Foo"), vec![dependency("Bar", RequestKind::Instance)])],
        );
        let child = component(
            "Child",
            &[&child_module],
            vec![entry("foo", key("Foo"), RequestKind::Instance)],
        );
        let mut parent = component("Parent", &[&parent_module], vec![]);
        parent.subcomponents.push(child);
        let manifest = manifest(
            vec![parent_module, child_module],
            vec![],
            vec![parent.clone()],
        );
        let graph = build_graph(&manifest, &parent);
        let subgraph = &graph.subgraphs[0];
        assert!(subgraph.unresolved.is_empty());
        assert!(subgraph.inherited.contains(&key("Bar")));
        // The parent absorbed the binding the child needs.
        assert!(graph.binding(&key("Bar")).is_some());
    }

    #[test]
    fn members_injector_requests_use_their_own_namespace() {
        let module = module("MyModule", vec![provides("provide_foo", key("Foo"), vec![])]);
        let mut target = injectable("Foo", vec![]);
        target.members.push(dependency("Bar", RequestKind::Instance));
        let component = component(
            "MyComponent",
            &[&module],
            vec![
                entry("foo", key("Foo"), RequestKind::Instance),
                entry("inject_foo", key("Foo"), RequestKind::MembersInjector),
            ],
        );
        let manifest = manifest(
            vec![module],
            vec![target, injectable("Bar", vec![])],
            vec![component.clone()],
        );
        let graph = build_graph(&manifest, &component);
        // Provision and members injection coexist for the same key.
        assert!(matches!(
            graph.binding(&key("Foo")).unwrap().kind,
            BindingKind::Provision { .. }
        ));
        assert!(matches!(
            graph.members_injection(&key("Foo")).unwrap().kind,
            BindingKind::MembersInjection { .. }
        ));
        assert!(graph.binding(&key("Bar")).is_some());
    }

    #[test]
    fn resolution_order_is_deterministic() {
        let module = module(
            "MyModule",
            vec![
                provides("provide_foo", key("Foo"), vec![dependency("Bar", RequestKind::Instance)]),
                provides("provide_bar", key("Bar"), vec![]),
                provides("provide_baz", key("Baz"), vec![]),
            ],
        );
        let component = component(
            "MyComponent",
            &[&module],
            vec![
                entry("baz", key("Baz"), RequestKind::Instance),
                entry("foo", key("Foo"), RequestKind::Instance),
            ],
        );
        let manifest = manifest(vec![module], vec![], vec![component.clone()]);
        let first: Vec<Key> = build_graph(&manifest, &component)
            .resolved
            .keys()
            .cloned()
            .collect();
        let second: Vec<Key> = build_graph(&manifest, &component)
            .resolved
            .keys()
            .cloned()
            .collect();
        assert_eq!(first, second);
        assert_eq!(first[0], key("Baz"));
    }
}
