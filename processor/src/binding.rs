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

use poniard_common::key::{Key, MapKey, RequestKind, Scope};
use poniard_common::manifest::{
    BindingDecl, DependencyDecl, InjectableDecl, ModuleDecl,
};
use poniard_common::type_data::TypeData;

/// One dependency of a binding: which key is needed and how it is requested.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRequest {
    /// Declared parameter or member name; empty for synthesized requests.
    pub name: String,
    pub key: Key,
    pub kind: RequestKind,
    pub nullable: bool,
}

impl DependencyRequest {
    pub fn instance(key: Key) -> Self {
        DependencyRequest {
            name: String::new(),
            key,
            kind: RequestKind::Instance,
            nullable: false,
        }
    }

    pub fn from_decl(decl: &DependencyDecl) -> Self {
        DependencyRequest {
            name: decl.name.clone(),
            key: decl.key.clone(),
            kind: decl.kind,
            nullable: decl.nullable,
        }
    }
}

/// A declarative recipe mapping a key to a construction strategy. Closed set;
/// every stage dispatches exhaustively so a missing case fails to compile.
#[derive(Debug, Clone)]
pub enum BindingKind {
    /// Constructor-discovered.
    Injection { injectable: InjectableDecl },
    /// Module-provided.
    Provision {
        module: TypeData,
        method: String,
        is_static: bool,
    },
    /// One key bound as another.
    Delegate { source: Key },
    /// Aggregate of element contributions, emitted as a `Vec`.
    MultiboundVec { contributions: Vec<Key> },
    /// Aggregate of keyed contributions, emitted as a `HashMap`.
    MultiboundMap { contributions: Vec<(MapKey, Key)> },
    /// Present iff an underlying binding for the wrapped key exists.
    Optional { underlying: Option<Key> },
    /// The component instance itself.
    Component { type_: TypeData },
    /// A provision method exposed by a component dependency.
    ComponentProvision { dependency: TypeData, method: String },
    /// An instance of a component dependency.
    ComponentDependency { type_: TypeData },
    /// Instance supplied through the component creator.
    BoundInstance { name: String },
    /// Entry into a subcomponent's implementation.
    SubcomponentCreator { subcomponent: TypeData },
    /// Constructor injection with caller-supplied parameters; reachable only
    /// through its assisted factory.
    AssistedInjection { injectable: InjectableDecl },
    /// Factory object constructing an assisted-injection target, enclosing
    /// captured providers for the non-assisted parameters.
    AssistedFactory {
        factory: TypeData,
        target: Key,
        method: String,
    },
    /// The `MembersInjector<T>` framework object.
    MembersInjector { target: TypeData },
    /// Injection into the members of an existing instance.
    MembersInjection {
        target: TypeData,
        members: Vec<DependencyRequest>,
    },
    /// Asynchronous module-provided binding.
    Production {
        module: TypeData,
        method: String,
        is_static: bool,
    },
    /// Asynchronous provision from a production component dependency.
    ComponentProduction { dependency: TypeData, method: String },
}

/// An immutable node of the binding graph.
#[derive(Debug, Clone)]
pub struct Binding {
    pub key: Key,
    pub kind: BindingKind,
    pub scope: Option<Scope>,
    pub dependencies: Vec<DependencyRequest>,
    /// Module path the binding is declared in, for accessibility decisions.
    pub declaring_module: String,
    pub nullable: bool,
}

impl Binding {
    pub fn kind_tag(&self) -> &'static str {
        match self.kind {
            BindingKind::Injection { .. } => "injectable",
            BindingKind::Provision { .. } => "module provides",
            BindingKind::Delegate { .. } => "module binds",
            BindingKind::MultiboundVec { .. } => "multibound vec",
            BindingKind::MultiboundMap { .. } => "multibound map",
            BindingKind::Optional { .. } => "optional binding",
            BindingKind::Component { .. } => "component",
            BindingKind::ComponentProvision { .. } => "component dependency provision",
            BindingKind::ComponentDependency { .. } => "component dependency",
            BindingKind::BoundInstance { .. } => "bound instance",
            BindingKind::SubcomponentCreator { .. } => "subcomponent",
            BindingKind::AssistedInjection { .. } => "assisted injectable",
            BindingKind::AssistedFactory { .. } => "assisted factory",
            BindingKind::MembersInjector { .. } => "members injector",
            BindingKind::MembersInjection { .. } => "members injection",
            BindingKind::Production { .. } => "module produces",
            BindingKind::ComponentProduction { .. } => "component dependency production",
        }
    }

    /// Human readable name used in diagnostics, e.g.
    /// `::my_crate::MyModule.provide_foo (module provides)`.
    pub fn readable_name(&self) -> String {
        match &self.kind {
            BindingKind::Provision { module, method, .. }
            | BindingKind::Production { module, method, .. } => {
                format!("{}.{} ({})", module.readable(), method, self.kind_tag())
            }
            BindingKind::Delegate { .. } => {
                format!("{} ({})", self.key.readable(), self.kind_tag())
            }
            _ => format!("{} ({})", self.key.readable(), self.kind_tag()),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.kind,
            BindingKind::Production { .. } | BindingKind::ComponentProduction { .. }
        )
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self.kind, BindingKind::Delegate { .. })
    }

    pub fn delegate_source(&self) -> Option<&Key> {
        match &self.kind {
            BindingKind::Delegate { source } => Some(source),
            _ => None,
        }
    }

    /// Whether a pre-generated `create()`-shaped static factory type exists
    /// for this binding.
    pub fn has_static_factory(&self) -> bool {
        matches!(
            self.kind,
            BindingKind::Injection { .. }
                | BindingKind::Provision { .. }
                | BindingKind::Production { .. }
                | BindingKind::AssistedInjection { .. }
                | BindingKind::AssistedFactory { .. }
                | BindingKind::MembersInjection { .. }
        )
    }

    /// Whether the binding needs a module instance captured by the component.
    pub fn requires_module_instance(&self) -> Option<&TypeData> {
        match &self.kind {
            BindingKind::Provision {
                module,
                is_static: false,
                ..
            }
            | BindingKind::Production {
                module,
                is_static: false,
                ..
            } => Some(module),
            _ => None,
        }
    }

    /// Builds an explicit binding from a module declaration. `slot_key` is the
    /// (possibly slotted) key the binding registers under.
    pub fn from_module_decl(module: &ModuleDecl, decl: &BindingDecl, slot_key: Key) -> Binding {
        use poniard_common::manifest::BindingDeclKind;
        let kind = match decl.decl_kind {
            BindingDeclKind::Provides => BindingKind::Provision {
                module: module.type_data.clone(),
                method: decl.name.clone(),
                is_static: decl.is_static,
            },
            BindingDeclKind::Produces => BindingKind::Production {
                module: module.type_data.clone(),
                method: decl.name.clone(),
                is_static: decl.is_static,
            },
            BindingDeclKind::Binds => BindingKind::Delegate {
                source: decl
                    .dependencies
                    .first()
                    .map(|dependency| dependency.key.clone())
                    .unwrap_or_default(),
            },
            BindingDeclKind::BindsOptionalOf | BindingDeclKind::Multibinds => {
                panic!("declaration-only binding turned into a node: {}", decl.name)
            }
        };
        Binding {
            key: slot_key,
            kind,
            scope: decl.scope.clone(),
            dependencies: decl
                .dependencies
                .iter()
                .map(DependencyRequest::from_decl)
                .collect(),
            declaring_module: module.type_data.declaring_module.clone(),
            nullable: decl.nullable,
        }
    }

    pub fn from_injectable(injectable: &InjectableDecl) -> Binding {
        let assisted = injectable.is_assisted();
        let kind = if assisted {
            BindingKind::AssistedInjection {
                injectable: injectable.clone(),
            }
        } else {
            BindingKind::Injection {
                injectable: injectable.clone(),
            }
        };
        Binding {
            key: Key::new(injectable.type_data.clone()),
            kind,
            // A scope on an assisted injection is rejected by the validator;
            // carried through so the diagnostic can point at it.
            scope: injectable.scope.clone(),
            dependencies: injectable
                .dependencies
                .iter()
                .map(DependencyRequest::from_decl)
                .collect(),
            declaring_module: injectable.type_data.declaring_module.clone(),
            nullable: false,
        }
    }
}
