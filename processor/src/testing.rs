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

//! Manifest construction shorthand for unit tests. Everything lives in a
//! fictional `test_crate`.

use poniard_common::key::{Key, RequestKind, Scope};
use poniard_common::manifest::{
    BindingDecl, BindingDeclKind, ComponentDecl, DependencyDecl, EntryPointDecl, InjectableDecl,
    Manifest, ModuleDecl,
};
use poniard_common::type_data::TypeData;

pub fn type_(path: &str) -> TypeData {
    TypeData::crate_local("test_crate", path)
}

pub fn key(path: &str) -> Key {
    Key::new(type_(path))
}

pub fn named_scope(path: &str) -> Scope {
    Scope::Named(type_(path))
}

pub fn dependency(path: &str, kind: RequestKind) -> DependencyDecl {
    DependencyDecl {
        name: path.to_lowercase().replace("::", "_"),
        key: key(path),
        kind,
        nullable: false,
    }
}

pub fn provides(name: &str, provided: Key, dependencies: Vec<DependencyDecl>) -> BindingDecl {
    let mut decl = BindingDecl::new(BindingDeclKind::Provides);
    decl.name = name.to_owned();
    decl.key = provided;
    decl.dependencies = dependencies;
    decl
}

pub fn binds(name: &str, provided: Key, source: Key) -> BindingDecl {
    let mut decl = BindingDecl::new(BindingDeclKind::Binds);
    decl.name = name.to_owned();
    decl.key = provided;
    decl.dependencies.push(DependencyDecl {
        name: "source".to_owned(),
        key: source,
        kind: RequestKind::Instance,
        nullable: false,
    });
    decl
}

pub fn module(path: &str, bindings: Vec<BindingDecl>) -> ModuleDecl {
    ModuleDecl {
        type_data: type_(path),
        bindings,
        ..Default::default()
    }
}

pub fn injectable(path: &str, dependencies: Vec<DependencyDecl>) -> InjectableDecl {
    InjectableDecl {
        type_data: type_(path),
        ctor_name: "new".to_owned(),
        dependencies,
        ..Default::default()
    }
}

pub fn entry(name: &str, requested: Key, kind: RequestKind) -> EntryPointDecl {
    EntryPointDecl {
        name: name.to_owned(),
        key: requested,
        kind,
        nullable: false,
    }
}

pub fn component(path: &str, modules: &[&ModuleDecl], entry_points: Vec<EntryPointDecl>) -> ComponentDecl {
    ComponentDecl {
        type_data: type_(path),
        modules: modules.iter().map(|module| module.type_data.clone()).collect(),
        entry_points,
        ..Default::default()
    }
}

pub fn manifest(
    modules: Vec<ModuleDecl>,
    injectables: Vec<InjectableDecl>,
    components: Vec<ComponentDecl>,
) -> Manifest {
    Manifest {
        components,
        modules,
        injectables,
        ..Default::default()
    }
}
