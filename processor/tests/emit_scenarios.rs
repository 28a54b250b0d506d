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

//! End-to-end emission checks over generated token streams, covering the
//! delegate caching matrix, erased providers, determinism and the fast-init
//! dispatcher.

use poniard_common::artifact::MemorySink;
use poniard_common::diagnostic::CollectingMessager;
use poniard_common::key::{Key, RequestKind, Scope};
use poniard_common::manifest::{
    BindingDecl, BindingDeclKind, ComponentDecl, DependencyDecl, EntryPointDecl, InjectableDecl,
    Manifest, ModuleDecl,
};
use poniard_common::type_data::{TypeData, Visibility};
use poniard_processor::config::CompilerOptions;
use poniard_processor::driver::Driver;
use poniard_processor::suppliers::provider_field;

fn type_(path: &str) -> TypeData {
    TypeData::crate_local("test_crate", path)
}

fn key(path: &str) -> Key {
    Key::new(type_(path))
}

fn provides(name: &str, provided: Key, scope: Option<Scope>) -> BindingDecl {
    let mut decl = BindingDecl::new(BindingDeclKind::Provides);
    decl.name = name.to_owned();
    decl.key = provided;
    decl.scope = scope;
    decl
}

fn binds(name: &str, provided: Key, source: Key, scope: Option<Scope>) -> BindingDecl {
    let mut decl = BindingDecl::new(BindingDeclKind::Binds);
    decl.name = name.to_owned();
    decl.key = provided;
    decl.scope = scope;
    decl.dependencies.push(DependencyDecl {
        name: "source".to_owned(),
        key: source,
        kind: RequestKind::Instance,
        nullable: false,
    });
    decl
}

fn entry(name: &str, requested: Key, kind: RequestKind) -> EntryPointDecl {
    EntryPointDecl {
        name: name.to_owned(),
        key: requested,
        kind,
        nullable: false,
    }
}

fn module(path: &str, bindings: Vec<BindingDecl>) -> ModuleDecl {
    ModuleDecl {
        type_data: type_(path),
        bindings,
        ..Default::default()
    }
}

fn run(manifest: Manifest, options: CompilerOptions) -> MemorySink {
    let driver = Driver::new(options);
    let mut messager = CollectingMessager::new();
    let mut sink = MemorySink::new();
    driver
        .process(vec![manifest], &mut messager, &mut sink)
        .unwrap();
    assert!(
        !messager.has_errors(),
        "unexpected diagnostics: {:#?}",
        messager.diagnostics
    );
    sink
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

fn custom_scope() -> Scope {
    Scope::Named(type_("CustomScope"))
}

/// Module from the delegate caching matrix: three targets with different
/// scopes, three qualified delegates onto them.
fn delegate_matrix(delegate_scope: Option<Scope>) -> (Manifest, ComponentDecl) {
    let regular_delegate = Key::qualified(type_("Object"), type_("RegularQ"));
    let reusable_delegate = Key::qualified(type_("Object"), type_("ReusableQ"));
    let unscoped_delegate = Key::qualified(type_("Object"), type_("UnscopedQ"));
    let module = module(
        "MatrixModule",
        vec![
            provides("provide_regular", key("RegularScoped"), Some(custom_scope())),
            provides("provide_reusable", key("ReusableScoped"), Some(Scope::Reusable)),
            provides("provide_unscoped", key("Unscoped"), None),
            binds(
                "bind_regular",
                regular_delegate.clone(),
                key("RegularScoped"),
                delegate_scope.clone(),
            ),
            binds(
                "bind_reusable",
                reusable_delegate.clone(),
                key("ReusableScoped"),
                delegate_scope.clone(),
            ),
            binds(
                "bind_unscoped",
                unscoped_delegate.clone(),
                key("Unscoped"),
                delegate_scope,
            ),
        ],
    );
    let component = ComponentDecl {
        type_data: type_("MatrixComponent"),
        scopes: vec![custom_scope()],
        modules: vec![module.type_data.clone()],
        entry_points: vec![
            entry("regular", regular_delegate, RequestKind::Provider),
            entry("reusable", reusable_delegate, RequestKind::Provider),
            entry("unscoped", unscoped_delegate, RequestKind::Provider),
        ],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![module],
        components: vec![component.clone()],
        ..Default::default()
    };
    (manifest, component)
}

#[test]
fn double_check_delegates() {
    let (manifest, component) = delegate_matrix(Some(custom_scope()));
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    // Scoped target double-checked, reusable target single-checked, the
    // promoted delegates over the reusable and unscoped targets each
    // double-checked. The same-scope delegate adds no wrapper.
    assert_eq!(count(&source, "DoubleCheck :: provider"), 3, "{}", source);
    assert_eq!(count(&source, "SingleCheck :: provider"), 1, "{}", source);
}

#[test]
fn single_check_delegates() {
    let (manifest, component) = delegate_matrix(Some(Scope::Reusable));
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    // Only the delegate over the unscoped source earns a wrapper, and it is a
    // single-check; the strong targets keep their own wrappers.
    assert_eq!(count(&source, "DoubleCheck :: provider"), 1, "{}", source);
    assert_eq!(count(&source, "SingleCheck :: provider"), 2, "{}", source);
}

#[test]
fn unscoped_delegates_reuse_target_providers() {
    let (manifest, component) = delegate_matrix(None);
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    assert_eq!(count(&source, "DoubleCheck :: provider"), 1, "{}", source);
    assert_eq!(count(&source, "SingleCheck :: provider"), 1, "{}", source);
    // No provider fields for the delegates themselves; entry points read the
    // target providers.
    let regular_delegate = Key::qualified(type_("Object"), type_("RegularQ"));
    let delegate_field = provider_field::field_ident(&regular_delegate).to_string();
    assert_eq!(count(&source, &delegate_field), 0, "{}", source);
    let target_field = provider_field::field_ident(&key("RegularScoped")).to_string();
    assert!(source.contains(&target_field), "{}", source);
}

#[test]
fn inaccessible_subtype_gets_raw_provider_and_single_cast() {
    let mut subtype = type_("SubtypeImpl");
    subtype.visibility = Visibility::Restricted("test_crate::internal".to_owned());
    let injectable = InjectableDecl {
        type_data: subtype.clone(),
        ctor_name: "new".to_owned(),
        ..Default::default()
    };
    let module = module(
        "BindModule",
        vec![binds(
            "bind_supertype",
            key("Supertype"),
            Key::new(subtype),
            None,
        )],
    );
    let component = ComponentDecl {
        type_data: type_("CastComponent"),
        modules: vec![module.type_data.clone()],
        entry_points: vec![entry("supertype", key("Supertype"), RequestKind::Instance)],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![module],
        injectables: vec![injectable],
        components: vec![component.clone()],
        ..Default::default()
    };
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    // Raw provider field over the erased value.
    assert!(
        source.contains("Provider < :: std :: boxed :: Box < dyn :: std :: any :: Any"),
        "{}",
        source
    );
    // A single cast, at the entry point, back to the accessible supertype.
    assert_eq!(count(&source, "unchecked_cast"), 1, "{}", source);
    assert!(
        source.contains("unchecked_cast :: < crate :: Supertype >"),
        "{}",
        source
    );
    // The factory grows an erased creation surface.
    let factory = sink.find("SubtypeImpl_Factory").unwrap().source_string();
    assert!(factory.contains("create_erased"), "{}", factory);
}

#[test]
fn chained_binds_share_one_factory_reference() {
    let module = module(
        "ChainModule",
        vec![
            binds("bind_a", key("A"), key("B"), None),
            binds("bind_b", key("B"), key("C"), None),
        ],
    );
    let injectable = InjectableDecl {
        type_data: type_("C"),
        ctor_name: "new".to_owned(),
        ..Default::default()
    };
    let component = ComponentDecl {
        type_data: type_("ChainComponent"),
        modules: vec![module.type_data.clone()],
        entry_points: vec![
            entry("a", key("A"), RequestKind::Provider),
            entry("b", key("B"), RequestKind::Provider),
        ],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![module],
        injectables: vec![injectable],
        components: vec![component.clone()],
        ..Default::default()
    };
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    // Both entry points bottom out on the same static factory; no fields, no
    // wrappers.
    assert_eq!(count(&source, "C_Factory :: create ()"), 2, "{}", source);
    assert_eq!(count(&source, "DoubleCheck"), 0, "{}", source);
    assert_eq!(count(&source, "_provider :"), 0, "{}", source);
}

#[test]
fn reusable_source_with_promoted_delegate() {
    let module = module(
        "PromotionModule",
        vec![
            provides("provide_foo", key("Foo"), Some(Scope::Reusable)),
            binds(
                "bind_bar",
                key("Bar"),
                key("Foo"),
                Some(Scope::Named(type_("Singleton"))),
            ),
        ],
    );
    let component = ComponentDecl {
        type_data: type_("PromotionComponent"),
        scopes: vec![Scope::Named(type_("Singleton"))],
        modules: vec![module.type_data.clone()],
        entry_points: vec![entry("bar", key("Bar"), RequestKind::Provider)],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![module],
        components: vec![component.clone()],
        ..Default::default()
    };
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    assert_eq!(count(&source, "SingleCheck :: provider"), 1, "{}", source);
    assert_eq!(count(&source, "DoubleCheck :: provider"), 1, "{}", source);
}

#[test]
fn emission_is_deterministic_across_runs() {
    for options in [CompilerOptions::new(), CompilerOptions::new().fast_init()] {
        let (manifest, _) = delegate_matrix(Some(custom_scope()));
        let first: Vec<String> = run(manifest.clone(), options.clone())
            .files
            .iter()
            .map(|file| format!("{}::{} {}", file.module_path, file.name, file.source_string()))
            .collect();
        let second: Vec<String> = run(manifest, options)
            .files
            .iter()
            .map(|file| format!("{}::{} {}", file.module_path, file.name, file.source_string()))
            .collect();
        assert_eq!(first, second);
    }
}

#[test]
fn provider_fields_are_deduplicated_per_key() {
    let module = module(
        "DedupModule",
        vec![provides("provide_foo", key("Foo"), Some(custom_scope()))],
    );
    let component = ComponentDecl {
        type_data: type_("DedupComponent"),
        scopes: vec![custom_scope()],
        modules: vec![module.type_data.clone()],
        entry_points: vec![
            entry("foo", key("Foo"), RequestKind::Instance),
            entry("foo_provider", key("Foo"), RequestKind::Provider),
            entry("foo_lazy", key("Foo"), RequestKind::Lazy),
        ],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![module],
        components: vec![component.clone()],
        ..Default::default()
    };
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    // One caching wrapper, one initialization, three consumers.
    assert_eq!(count(&source, "DoubleCheck :: provider"), 1, "{}", source);
    let field = provider_field::field_ident(&key("Foo")).to_string();
    assert_eq!(count(&source, &format!("let {}", field)), 1, "{}", source);
}

#[test]
fn fast_init_uses_one_dispatcher_with_stable_ids() {
    let module = module(
        "FastModule",
        vec![
            provides("provide_foo", key("Foo"), None),
            provides("provide_bar", key("Bar"), Some(custom_scope())),
        ],
    );
    let component = ComponentDecl {
        type_data: type_("FastComponent"),
        scopes: vec![custom_scope()],
        modules: vec![module.type_data.clone()],
        entry_points: vec![
            entry("foo", key("Foo"), RequestKind::Provider),
            entry("bar", key("Bar"), RequestKind::Provider),
        ],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![module],
        components: vec![component.clone()],
        ..Default::default()
    };
    let sink = run(manifest.clone(), CompilerOptions::new().fast_init());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    let dispatcher = format!("{}_SwitchingProvider", component.impl_name());
    assert!(source.contains(&dispatcher), "{}", source);
    // First demand order: foo gets id 0, bar id 1; the scoped binding
    // composes its memoizer over the dispatcher.
    assert!(source.contains("id : 0u32"), "{}", source);
    assert!(source.contains("id : 1u32"), "{}", source);
    assert!(source.contains("0u32 =>"), "{}", source);
    assert!(source.contains("1u32 =>"), "{}", source);
    assert!(
        count(&source, "DoubleCheck :: provider (:: std :: rc :: Rc :: new (") >= 1,
        "{}",
        source
    );

    // Default mode must not emit the dispatcher.
    let default_sink = run(manifest, CompilerOptions::new());
    let default_source = default_sink
        .find(&component.impl_name())
        .unwrap()
        .source_string();
    assert!(!default_source.contains("SwitchingProvider"), "{}", default_source);
}

#[test]
fn both_modes_expose_the_same_public_surface() {
    let (manifest, component) = delegate_matrix(Some(custom_scope()));
    let default_source = run(manifest.clone(), CompilerOptions::new())
        .find(&component.impl_name())
        .unwrap()
        .source_string();
    let fast_source = run(manifest, CompilerOptions::new().fast_init())
        .find(&component.impl_name())
        .unwrap()
        .source_string();
    for method in ["fn regular", "fn reusable", "fn unscoped"] {
        assert!(default_source.contains(method), "{}", default_source);
        assert!(fast_source.contains(method), "{}", fast_source);
    }
}

#[test]
fn subcomponent_reaches_parent_provider_through_the_chain() {
    let parent_module = module(
        "ParentModule",
        vec![provides("provide_bar", key("Bar"), Some(custom_scope()))],
    );
    let child_module = module("ChildModule", {
        let mut decl = provides("provide_foo", key("Foo"), None);
        decl.dependencies.push(DependencyDecl {
            name: "bar".to_owned(),
            key: key("Bar"),
            kind: RequestKind::Instance,
            nullable: false,
        });
        vec![decl]
    });
    let child = ComponentDecl {
        type_data: type_("Child"),
        modules: vec![child_module.type_data.clone()],
        entry_points: vec![entry("foo", key("Foo"), RequestKind::Instance)],
        ..Default::default()
    };
    let parent = ComponentDecl {
        type_data: type_("Parent"),
        scopes: vec![custom_scope()],
        modules: vec![parent_module.type_data.clone()],
        entry_points: vec![entry("child", key("Child"), RequestKind::Instance)],
        subcomponents: vec![child],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![parent_module, child_module],
        components: vec![parent.clone()],
        ..Default::default()
    };
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&parent.impl_name()).unwrap().source_string();
    assert!(source.contains("DaggerParent_ChildImpl"), "{}", source);
    // The child keeps a handle to its parent and reads the inherited
    // provider through it.
    assert!(source.contains("parent : :: std :: rc :: Rc < DaggerParent >"), "{}", source);
    let bar_field = provider_field::field_ident(&key("Bar")).to_string();
    assert!(
        source.contains(&format!("parent . {}", bar_field)),
        "{}",
        source
    );
}

#[test]
fn members_injection_entry_point_uses_the_injector() {
    let target = InjectableDecl {
        type_data: type_("Widget"),
        ctor_name: "new".to_owned(),
        members: vec![DependencyDecl {
            name: "label".to_owned(),
            key: key("Label"),
            kind: RequestKind::Instance,
            nullable: false,
        }],
        ..Default::default()
    };
    let label = InjectableDecl {
        type_data: type_("Label"),
        ctor_name: "new".to_owned(),
        ..Default::default()
    };
    let component = ComponentDecl {
        type_data: type_("InjectComponent"),
        entry_points: vec![entry("inject_widget", key("Widget"), RequestKind::MembersInjector)],
        ..Default::default()
    };
    let manifest = Manifest {
        injectables: vec![target, label],
        components: vec![component.clone()],
        ..Default::default()
    };
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    assert!(source.contains("instance : & mut crate :: Widget"), "{}", source);
    assert!(source.contains("inject_members"), "{}", source);
    let injector = sink.find("Widget_MembersInjector").unwrap().source_string();
    assert!(injector.contains("instance . label ="), "{}", injector);
}

#[test]
fn assisted_factory_encloses_captured_providers() {
    use poniard_common::manifest::{AssistedFactoryDecl, AssistedParamDecl};
    let assisted = InjectableDecl {
        type_data: type_("Widget"),
        ctor_name: "new".to_owned(),
        dependencies: vec![DependencyDecl {
            name: "label".to_owned(),
            key: key("Label"),
            kind: RequestKind::Instance,
            nullable: false,
        }],
        assisted: vec![AssistedParamDecl {
            name: "seed".to_owned(),
            type_data: TypeData::primitive("i32"),
        }],
        ..Default::default()
    };
    let label = InjectableDecl {
        type_data: type_("Label"),
        ctor_name: "new".to_owned(),
        ..Default::default()
    };
    let component = ComponentDecl {
        type_data: type_("AssistedComponent"),
        entry_points: vec![entry("factory", key("WidgetFactory"), RequestKind::Instance)],
        ..Default::default()
    };
    let mut manifest = Manifest {
        injectables: vec![assisted, label],
        components: vec![component.clone()],
        ..Default::default()
    };
    manifest.assisted_factories.push(AssistedFactoryDecl {
        type_data: type_("WidgetFactory"),
        target: key("Widget"),
        method_name: "create".to_owned(),
    });
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    assert!(source.contains("WidgetFactory_Impl :: create"), "{}", source);
    let factory_impl = sink.find("WidgetFactory_Impl").unwrap().source_string();
    assert!(factory_impl.contains("fn create (& self , seed : i32"), "{}", factory_impl);
    assert!(
        factory_impl.contains("Widget_Factory :: new_instance (seed"),
        "{}",
        factory_impl
    );
}

#[test]
fn local_types_stay_nameable_inside_aggregate_wrappers() {
    use poniard_common::manifest::MultibindingContribution;
    let mut contribution_one = provides("provide_one", key("Foo"), None);
    contribution_one.multibinding = MultibindingContribution::IntoVec;
    let mut contribution_two = provides("provide_two", key("Foo"), None);
    contribution_two.multibinding = MultibindingContribution::IntoVec;
    let module = module("VecModule", vec![contribution_one, contribution_two]);
    let vec_key = key("Foo").multibound_vec();
    let component = ComponentDecl {
        type_data: type_("VecComponent"),
        modules: vec![module.type_data.clone()],
        entry_points: vec![
            entry("foos", vec_key.clone(), RequestKind::Instance),
            entry("foos_provider", vec_key, RequestKind::Provider),
        ],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![module],
        components: vec![component.clone()],
        ..Default::default()
    };
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    // The element type of the aggregate is written as the emitting crate
    // names it; `::test_crate::Foo` would not resolve from inside the crate.
    assert!(source.contains("Vec < crate :: Foo >"), "{}", source);
    assert!(!source.contains(":: test_crate"), "{}", source);
}

#[test]
fn module_with_hidden_constructor_is_built_through_its_proxy() {
    let mut hidden = module("inner::HiddenModule", {
        let mut decl = provides("provide_foo", key("Foo"), None);
        decl.is_static = false;
        vec![decl]
    });
    hidden.constructor_visibility = Visibility::Restricted("test_crate::inner".to_owned());
    let component = ComponentDecl {
        type_data: type_("ProxyComponent"),
        modules: vec![hidden.type_data.clone()],
        entry_points: vec![entry("foo", key("Foo"), RequestKind::Instance)],
        ..Default::default()
    };
    let manifest = Manifest {
        modules: vec![hidden],
        components: vec![component.clone()],
        ..Default::default()
    };
    let sink = run(manifest, CompilerOptions::new());
    let source = sink.find(&component.impl_name()).unwrap().source_string();
    assert!(source.contains("inner_HiddenModule_Proxy :: new_instance ()"), "{}", source);
    let proxy = sink.find("inner_HiddenModule_Proxy").unwrap().source_string();
    assert!(proxy.contains("pub fn new_instance"), "{}", proxy);
}
