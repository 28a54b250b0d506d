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

use crate::key::{Key, MapKey, RequestKind, Scope};
use crate::type_data::{TypeData, Visibility};

/// Declarative DI metadata produced by the front end for one round.
///
/// Manifests from later rounds (e.g. containing generated modules) are merged
/// into the accumulated manifest with [`Manifest::merge_from`].
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct Manifest {
    pub components: Vec<ComponentDecl>,
    pub modules: Vec<ModuleDecl>,
    pub injectables: Vec<InjectableDecl>,
    pub assisted_factories: Vec<AssistedFactoryDecl>,
    pub qualifiers: Vec<TypeData>,
    pub merged_crates: Vec<String>,
}

impl Manifest {
    pub fn new() -> Manifest {
        Default::default()
    }

    pub fn merge_from(&mut self, other: &Manifest) {
        self.components.extend_from_slice(other.components.as_slice());
        self.modules.extend_from_slice(other.modules.as_slice());
        self.injectables
            .extend_from_slice(other.injectables.as_slice());
        self.assisted_factories
            .extend_from_slice(other.assisted_factories.as_slice());
        self.qualifiers.extend_from_slice(other.qualifiers.as_slice());
        self.merged_crates
            .extend_from_slice(other.merged_crates.as_slice());
    }

    pub fn module(&self, type_: &TypeData) -> Option<&ModuleDecl> {
        self.modules.iter().find(|module| module.type_data == *type_)
    }

    pub fn injectable(&self, type_: &TypeData) -> Option<&InjectableDecl> {
        self.injectables
            .iter()
            .find(|injectable| injectable.type_data == *type_)
    }
}

/// A user-declared root with an API surface whose implementation must be
/// synthesized.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct ComponentDecl {
    pub type_data: TypeData,
    /// Scopes declared on the component. Bindings carrying any other named
    /// scope are rejected.
    pub scopes: Vec<Scope>,
    /// Installed module types, in declaration order.
    pub modules: Vec<TypeData>,
    /// Other components this component consumes provisions from.
    pub dependencies: Vec<ComponentDependencyDecl>,
    /// Instances supplied through the component's creator.
    pub bound_instances: Vec<BoundInstanceDecl>,
    pub entry_points: Vec<EntryPointDecl>,
    pub subcomponents: Vec<ComponentDecl>,
    /// Production components admit `Production` bindings and asynchronous
    /// request kinds.
    pub production: bool,
}

impl ComponentDecl {
    pub fn new() -> Self {
        Default::default()
    }

    /// The module this component's implementation is emitted into.
    pub fn declaring_module(&self) -> &str {
        &self.type_data.declaring_module
    }

    /// `DaggerOuter_Inner` for a component `outer::Inner`.
    pub fn impl_name(&self) -> String {
        format!("Dagger{}", self.type_data.joined_simple_names())
    }
}

/// A component API method whose return defines a root request.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct EntryPointDecl {
    pub name: String,
    pub key: Key,
    pub kind: RequestKind,
    pub nullable: bool,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct ComponentDependencyDecl {
    pub type_data: TypeData,
    pub provisions: Vec<ProvisionMethodDecl>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct ProvisionMethodDecl {
    pub name: String,
    pub key: Key,
    /// Asynchronous provision from a production component dependency.
    pub production: bool,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct BoundInstanceDecl {
    pub name: String,
    pub key: Key,
    pub nullable: bool,
}

/// A module: a bag of bindings, plus the constructor metadata the emitter
/// needs to instantiate it.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct ModuleDecl {
    pub type_data: TypeData,
    pub bindings: Vec<BindingDecl>,
    /// Visibility of the nullary constructor, for proxy generation.
    pub constructor_visibility: Visibility,
}

impl ModuleDecl {
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether any binding needs a module instance at runtime.
    pub fn requires_instance(&self) -> bool {
        self.bindings.iter().any(|binding| !binding.is_static)
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub enum BindingDeclKind {
    Provides,
    Binds,
    BindsOptionalOf,
    Multibinds,
    Produces,
}

impl Default for BindingDeclKind {
    fn default() -> Self {
        BindingDeclKind::Provides
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub enum MultibindingContribution {
    None,
    IntoVec,
    IntoMap(MapKey),
}

impl Default for MultibindingContribution {
    fn default() -> Self {
        MultibindingContribution::None
    }
}

/// A single declaration inside a module.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct BindingDecl {
    pub name: String,
    pub decl_kind: BindingDeclKind,
    pub key: Key,
    pub scope: Option<Scope>,
    pub dependencies: Vec<DependencyDecl>,
    /// Static module methods are invoked on the type; the rest need a module
    /// instance captured by the component.
    pub is_static: bool,
    pub nullable: bool,
    pub multibinding: MultibindingContribution,
}

impl BindingDecl {
    pub fn new(decl_kind: BindingDeclKind) -> Self {
        BindingDecl {
            decl_kind,
            is_static: true,
            ..Default::default()
        }
    }
}

/// One dependency of a binding or constructor: what is needed and how.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct DependencyDecl {
    pub name: String,
    pub key: Key,
    pub kind: RequestKind,
    pub nullable: bool,
}

/// A constructor-discovered binding.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct InjectableDecl {
    pub type_data: TypeData,
    pub ctor_name: String,
    pub scope: Option<Scope>,
    pub dependencies: Vec<DependencyDecl>,
    /// Caller-supplied constructor parameters; non-empty makes this an
    /// assisted injection usable only through its assisted factory.
    pub assisted: Vec<AssistedParamDecl>,
    /// Members injected after construction, for members-injection requests.
    pub members: Vec<DependencyDecl>,
}

impl InjectableDecl {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_assisted(&self) -> bool {
        !self.assisted.is_empty()
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct AssistedParamDecl {
    pub name: String,
    pub type_data: TypeData,
}

/// A factory trait constructing an assisted-injection type.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct AssistedFactoryDecl {
    pub type_data: TypeData,
    pub target: Key,
    pub method_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_concatenates_declarations() {
        let mut left = Manifest::new();
        left.modules.push(ModuleDecl {
            type_data: TypeData::crate_local("c", "ModuleA"),
            ..Default::default()
        });
        let mut right = Manifest::new();
        right.modules.push(ModuleDecl {
            type_data: TypeData::crate_local("c", "ModuleB"),
            ..Default::default()
        });
        right.merged_crates.push("c".to_owned());
        left.merge_from(&right);
        assert_eq!(left.modules.len(), 2);
        assert_eq!(left.merged_crates, vec!["c".to_owned()]);
    }

    #[test]
    fn requires_instance_follows_static_flags() {
        let mut module = ModuleDecl::new();
        module.bindings.push(BindingDecl::new(BindingDeclKind::Provides));
        assert!(!module.requires_instance());
        let mut instance_binding = BindingDecl::new(BindingDeclKind::Provides);
        instance_binding.is_static = false;
        module.bindings.push(instance_binding);
        assert!(module.requires_instance());
    }

    #[test]
    fn impl_name_joins_nested_simple_names() {
        let mut component = ComponentDecl::new();
        component.type_data = TypeData::crate_local("my_crate", "outer::Inner");
        assert_eq!(component.impl_name(), "Daggerouter_Inner");
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let mut manifest = Manifest::new();
        let mut component = ComponentDecl::new();
        component.type_data = TypeData::crate_local("c", "MyComponent");
        component.entry_points.push(EntryPointDecl {
            name: "foo".to_owned(),
            key: Key::new(TypeData::crate_local("c", "Foo")),
            kind: RequestKind::Provider,
            nullable: false,
        });
        manifest.components.push(component);
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
    }
}
