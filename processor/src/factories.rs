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

//! Generation of the sibling factory types referenced by component
//! implementations: `X_Factory` for injectables and module methods,
//! `F_Impl` for assisted factories, `T_MembersInjector` for members
//! injection.

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use crate::binding::{Binding, BindingKind, DependencyRequest};
use crate::config::CompilerOptions;
use crate::error::InternalError;
use poniard_common::artifact::GeneratedFile;
use poniard_common::key::RequestKind;
use poniard_common::type_data::Visibility;

/// Simple name of the pre-generated factory type for a binding, if the
/// binding kind has one.
pub fn factory_name(binding: &Binding) -> Option<String> {
    match &binding.kind {
        BindingKind::Injection { injectable } | BindingKind::AssistedInjection { injectable } => {
            Some(format!("{}_Factory", injectable.type_data.joined_simple_names()))
        }
        BindingKind::Provision { module, method, .. }
        | BindingKind::Production { module, method, .. } => Some(format!(
            "{}_{}_Factory",
            module.joined_simple_names(),
            method
        )),
        BindingKind::AssistedFactory { factory, .. } => {
            Some(format!("{}_Impl", factory.joined_simple_names()))
        }
        BindingKind::MembersInjection { target, .. } => {
            Some(format!("{}_MembersInjector", target.joined_simple_names()))
        }
        _ => None,
    }
}

/// Module the factory is emitted into: next to the type (or module) it
/// constructs, where visibility permits calling the constructor.
pub fn factory_module(binding: &Binding) -> Option<String> {
    match &binding.kind {
        BindingKind::Injection { injectable } | BindingKind::AssistedInjection { injectable } => {
            Some(injectable.type_data.declaring_module.clone())
        }
        BindingKind::Provision { module, .. } | BindingKind::Production { module, .. } => {
            Some(module.declaring_module.clone())
        }
        BindingKind::AssistedFactory { factory, .. } => Some(factory.declaring_module.clone()),
        BindingKind::MembersInjection { target, .. } => Some(target.declaring_module.clone()),
        _ => None,
    }
}

/// Full path tokens of the factory as written from `current_crate`.
pub fn factory_path(binding: &Binding, current_crate: &str) -> Option<TokenStream> {
    let name = factory_name(binding)?;
    let module = factory_module(binding)?;
    Some(path_tokens(&module, &name, current_crate))
}

pub fn path_tokens(module_path: &str, name: &str, current_crate: &str) -> TokenStream {
    let rendered = if module_path == current_crate {
        format!("crate::{}", name)
    } else if let Some(rest) = module_path.strip_prefix(&format!("{}::", current_crate)) {
        format!("crate::{}::{}", rest, name)
    } else {
        format!("::{}::{}", module_path, name)
    };
    let path: syn::Path =
        syn::parse_str(&rendered).unwrap_or_else(|_| panic!("not a path: {}", rendered));
    quote! { #path }
}

/// A factory artifact queued for generation; self-contained so it outlives
/// the graph it was discovered in.
#[derive(Debug, Clone)]
pub struct FactoryArtifact {
    pub name: String,
    pub module_path: String,
    pub binding: Binding,
    /// Construction target for assisted factory impls.
    pub target: Option<Binding>,
}

pub fn artifact_for(binding: &Binding, target: Option<&Binding>) -> Option<FactoryArtifact> {
    Some(FactoryArtifact {
        name: factory_name(binding)?,
        module_path: factory_module(binding)?,
        binding: binding.clone(),
        target: target.cloned(),
    })
}

/// Field name of the provider captured for a dependency.
fn dependency_field(dependency: &DependencyRequest) -> Ident {
    format_ident!("{}_provider", dependency.key.identifier_string())
}

/// Declared type of a captured dependency handle.
fn dependency_handle_type(dependency: &DependencyRequest, current_crate: &str) -> TokenStream {
    let ty = dependency.key.type_.local_syn_type(current_crate);
    match dependency.kind {
        RequestKind::Producer | RequestKind::Produced | RequestKind::Future => {
            quote! { ::std::rc::Rc<dyn poniard::Producer<#ty>> }
        }
        _ => quote! { ::std::rc::Rc<dyn poniard::Provider<#ty>> },
    }
}

/// The value handed to `new_instance` for a dependency, read from the
/// captured handle.
fn dependency_value(dependency: &DependencyRequest) -> TokenStream {
    let field = dependency_field(dependency);
    match dependency.kind {
        RequestKind::Instance => quote! { self.#field.get() },
        RequestKind::Provider | RequestKind::MembersInjector | RequestKind::Producer => {
            quote! { self.#field.clone() }
        }
        RequestKind::Lazy => quote! { poniard::Lazy::new(self.#field.clone()) },
        RequestKind::ProviderOfLazy => {
            quote! { poniard::ProviderOfLazy::create(self.#field.clone()) }
        }
        RequestKind::Produced | RequestKind::Future => quote! { self.#field.clone() },
    }
}

/// Parameter type of `new_instance` for a dependency.
fn dependency_param_type(dependency: &DependencyRequest, current_crate: &str) -> TokenStream {
    let ty = dependency.key.type_.local_syn_type(current_crate);
    match dependency.kind {
        RequestKind::Instance => quote! { #ty },
        RequestKind::Provider | RequestKind::MembersInjector => {
            quote! { ::std::rc::Rc<dyn poniard::Provider<#ty>> }
        }
        RequestKind::Lazy => quote! { poniard::Lazy<#ty> },
        RequestKind::ProviderOfLazy => {
            quote! { ::std::rc::Rc<dyn poniard::Provider<poniard::Lazy<#ty>>> }
        }
        RequestKind::Producer | RequestKind::Produced | RequestKind::Future => {
            quote! { ::std::rc::Rc<dyn poniard::Producer<#ty>> }
        }
    }
}

pub fn generate(
    artifact: &FactoryArtifact,
    current_crate: &str,
    options: &CompilerOptions,
) -> Result<GeneratedFile, InternalError> {
    let source = match &artifact.binding.kind {
        BindingKind::Injection { .. } | BindingKind::AssistedInjection { .. } => {
            injection_factory(artifact, current_crate)
        }
        BindingKind::Provision { .. } => provision_factory(artifact, current_crate, false, options),
        BindingKind::Production { .. } => provision_factory(artifact, current_crate, true, options),
        BindingKind::AssistedFactory { .. } => assisted_factory_impl(artifact, current_crate)?,
        BindingKind::MembersInjection { .. } => members_injector(artifact, current_crate),
        _ => {
            return Err(InternalError::new(
                &artifact.binding.readable_name(),
                "factory generation requested for a binding kind without factories",
            ))
        }
    };
    Ok(GeneratedFile {
        module_path: artifact.module_path.clone(),
        name: artifact.name.clone(),
        source,
        format: options.format_generated_source,
    })
}

fn capture_sections(
    dependencies: &[DependencyRequest],
    current_crate: &str,
) -> (Vec<TokenStream>, Vec<TokenStream>, Vec<Ident>) {
    let mut fields = Vec::new();
    let mut params = Vec::new();
    let mut names = Vec::new();
    for dependency in dependencies {
        let field = dependency_field(dependency);
        let handle = dependency_handle_type(dependency, current_crate);
        fields.push(quote! { #field: #handle, });
        params.push(quote! { #field: #handle, });
        names.push(field);
    }
    (fields, params, names)
}

fn injection_factory(artifact: &FactoryArtifact, current_crate: &str) -> TokenStream {
    let binding = &artifact.binding;
    let (injectable, assisted) = match &binding.kind {
        BindingKind::Injection { injectable } => (injectable, false),
        BindingKind::AssistedInjection { injectable } => (injectable, true),
        _ => unreachable!("injection factory for non-injection binding"),
    };
    let factory = format_ident!("{}", artifact.name);
    let target = injectable.type_data.local_syn_type(current_crate);
    let ctor = format_ident!("{}", injectable.ctor_name);
    let (fields, create_params, names) =
        capture_sections(&binding.dependencies, current_crate);

    let mut instance_params = Vec::new();
    let mut ctor_args = Vec::new();
    for assisted_param in &injectable.assisted {
        let name = format_ident!("{}", assisted_param.name);
        let ty = assisted_param.type_data.local_syn_type(current_crate);
        instance_params.push(quote! { #name: #ty, });
        ctor_args.push(quote! { #name, });
    }
    for (index, dependency) in binding.dependencies.iter().enumerate() {
        let name = format_ident!("dep_{}", index);
        let ty = dependency_param_type(dependency, current_crate);
        instance_params.push(quote! { #name: #ty, });
        ctor_args.push(quote! { #name, });
    }

    let get_args: Vec<TokenStream> = binding
        .dependencies
        .iter()
        .map(|dependency| {
            let value = dependency_value(dependency);
            quote! { #value, }
        })
        .collect();

    // Assisted injections are constructed through the assisted factory; the
    // plain provider surface only exists for unassisted injection.
    let provider_impl = if assisted {
        quote! {}
    } else {
        quote! {
            impl poniard::Provider<#target> for #factory {
                fn get(&self) -> #target {
                    #factory::new_instance(#(#get_args)*)
                }
            }
        }
    };

    let erased = erased_create(binding, &factory, &create_params, &names);

    quote! {
        pub struct #factory {
            #(#fields)*
        }

        impl #factory {
            pub fn create(#(#create_params)*) -> ::std::rc::Rc<#factory> {
                ::std::rc::Rc::new(#factory { #(#names,)* })
            }

            pub fn new_instance(#(#instance_params)*) -> #target {
                <#target>::#ctor(#(#ctor_args)*)
            }
        }

        #provider_impl

        #erased
    }
}

/// Inaccessible provided types additionally get an erased creation surface so
/// requesting packages can hold a raw provider.
fn erased_create(
    binding: &Binding,
    factory: &Ident,
    create_params: &[TokenStream],
    names: &[Ident],
) -> TokenStream {
    let restricted = !matches!(binding.key.type_.visibility, Visibility::Public);
    if !restricted || matches!(binding.kind, BindingKind::AssistedInjection { .. }) {
        return quote! {};
    }
    quote! {
        impl #factory {
            pub fn create_erased(
                #(#create_params)*
            ) -> ::std::rc::Rc<dyn poniard::Provider<::std::boxed::Box<dyn ::std::any::Any>>>
            {
                let factory = #factory::create(#(#names,)*);
                ::std::rc::Rc::new(poniard::ClosureProvider::new(move || {
                    ::std::boxed::Box::new(factory.get()) as ::std::boxed::Box<dyn ::std::any::Any>
                }))
            }
        }
    }
}

fn provision_factory(
    artifact: &FactoryArtifact,
    current_crate: &str,
    production: bool,
    options: &CompilerOptions,
) -> TokenStream {
    let binding = &artifact.binding;
    let (module, method, is_static) = match &binding.kind {
        BindingKind::Provision {
            module,
            method,
            is_static,
        }
        | BindingKind::Production {
            module,
            method,
            is_static,
        } => (module, format_ident!("{}", method), *is_static),
        _ => unreachable!("provision factory for non-provision binding"),
    };
    let factory = format_ident!("{}", artifact.name);
    let module_type = module.local_syn_type(current_crate);
    let provided = binding.key.type_.local_syn_type(current_crate);
    let (mut fields, mut create_params, mut names) =
        capture_sections(&binding.dependencies, current_crate);
    if !is_static {
        fields.insert(0, quote! { module: ::std::rc::Rc<#module_type>, });
        create_params.insert(0, quote! { module: ::std::rc::Rc<#module_type>, });
        names.insert(0, format_ident!("module"));
    }

    let mut instance_params = Vec::new();
    let mut invocation_args = Vec::new();
    for (index, dependency) in binding.dependencies.iter().enumerate() {
        let name = format_ident!("dep_{}", index);
        let ty = dependency_param_type(dependency, current_crate);
        instance_params.push(quote! { #name: #ty, });
        invocation_args.push(quote! { #name, });
    }
    let invocation = if is_static {
        quote! { #module_type::#method(#(#invocation_args)*) }
    } else {
        quote! { module.#method(#(#invocation_args)*) }
    };
    let instance_signature = if is_static {
        quote! { pub fn new_instance(#(#instance_params)*) -> #provided }
    } else {
        quote! { pub fn new_instance(module: &#module_type, #(#instance_params)*) -> #provided }
    };

    let mut get_args: Vec<TokenStream> = Vec::new();
    if !is_static {
        get_args.push(quote! { &self.module, });
    }
    for dependency in &binding.dependencies {
        let value = dependency_value(dependency);
        get_args.push(quote! { #value, });
    }

    let framework_impl = if production {
        let token = if options.write_producer_name_in_token {
            let name = format!("{}#{}", module.readable(), method);
            quote! { pub const PRODUCER_TOKEN: &'static str = #name; }
        } else {
            quote! {}
        };
        quote! {
            impl #factory {
                #token
            }

            impl poniard::Producer<#provided> for #factory {
                fn produce(&self) -> poniard::ProducerFuture<'_, #provided> {
                    let value = #factory::new_instance(#(#get_args)*);
                    ::std::boxed::Box::pin(::std::future::ready(
                        poniard::Produced::successful(value),
                    ))
                }
            }
        }
    } else {
        quote! {
            impl poniard::Provider<#provided> for #factory {
                fn get(&self) -> #provided {
                    #factory::new_instance(#(#get_args)*)
                }
            }
        }
    };

    let erased = erased_create(binding, &factory, &create_params, &names);

    quote! {
        pub struct #factory {
            #(#fields)*
        }

        impl #factory {
            pub fn create(#(#create_params)*) -> ::std::rc::Rc<#factory> {
                ::std::rc::Rc::new(#factory { #(#names,)* })
            }

            #instance_signature {
                #invocation
            }
        }

        #framework_impl

        #erased
    }
}

fn assisted_factory_impl(
    artifact: &FactoryArtifact,
    current_crate: &str,
) -> Result<TokenStream, InternalError> {
    let binding = &artifact.binding;
    let (factory_type, method) = match &binding.kind {
        BindingKind::AssistedFactory {
            factory, method, ..
        } => (factory, format_ident!("{}", method)),
        _ => unreachable!("assisted factory impl for wrong binding kind"),
    };
    let target_binding = artifact.target.as_ref().ok_or_else(|| {
        InternalError::new(
            &binding.readable_name(),
            "assisted factory artifact is missing its construction target",
        )
    })?;
    let injectable = match &target_binding.kind {
        BindingKind::AssistedInjection { injectable } => injectable,
        _ => {
            return Err(InternalError::new(
                &binding.readable_name(),
                "assisted factory target is not an assisted injection",
            ))
        }
    };
    let impl_name = format_ident!("{}", artifact.name);
    let trait_path = factory_type.local_syn_type(current_crate);
    let target_type = injectable.type_data.local_syn_type(current_crate);
    let (fields, create_params, names) =
        capture_sections(&target_binding.dependencies, current_crate);

    let mut method_params = Vec::new();
    let mut new_instance_args = Vec::new();
    for assisted_param in &injectable.assisted {
        let name = format_ident!("{}", assisted_param.name);
        let ty = assisted_param.type_data.local_syn_type(current_crate);
        method_params.push(quote! { #name: #ty, });
        new_instance_args.push(quote! { #name, });
    }
    for dependency in &target_binding.dependencies {
        let value = dependency_value(dependency);
        new_instance_args.push(quote! { #value, });
    }
    let target_factory = factory_path(target_binding, current_crate).ok_or_else(|| {
        InternalError::new(
            &target_binding.readable_name(),
            "assisted injection has no generated factory",
        )
    })?;

    Ok(quote! {
        pub struct #impl_name {
            #(#fields)*
        }

        impl #impl_name {
            pub fn create(#(#create_params)*) -> ::std::rc::Rc<#impl_name> {
                ::std::rc::Rc::new(#impl_name { #(#names,)* })
            }
        }

        impl #trait_path for #impl_name {
            fn #method(&self, #(#method_params)*) -> #target_type {
                #target_factory::new_instance(#(#new_instance_args)*)
            }
        }
    })
}

fn members_injector(artifact: &FactoryArtifact, current_crate: &str) -> TokenStream {
    let binding = &artifact.binding;
    let (target, members) = match &binding.kind {
        BindingKind::MembersInjection { target, members } => (target, members),
        _ => unreachable!("members injector for wrong binding kind"),
    };
    let injector = format_ident!("{}", artifact.name);
    let target_type = target.local_syn_type(current_crate);
    let (fields, create_params, names) = capture_sections(members, current_crate);

    let assignments: Vec<TokenStream> = members
        .iter()
        .map(|member| {
            let value = dependency_value(member);
            // Front ends report the member name on the dependency decl.
            let field = format_ident!("{}", member.name);
            quote! { instance.#field = #value; }
        })
        .collect();

    quote! {
        pub struct #injector {
            #(#fields)*
        }

        impl #injector {
            pub fn create(#(#create_params)*) -> ::std::rc::Rc<#injector> {
                ::std::rc::Rc::new(#injector { #(#names,)* })
            }
        }

        impl poniard::MembersInjector<#target_type> for #injector {
            fn inject_members(&self, instance: &mut #target_type) {
                #(#assignments)*
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerOptions;
    use crate::testing::*;
    use poniard_common::key::RequestKind;

    fn injection_binding(dependencies: Vec<DependencyRequest>) -> Binding {
        let mut decl = injectable("Foo", vec![]);
        decl.dependencies = dependencies
            .iter()
            .map(|dependency| poniard_common::manifest::DependencyDecl {
                name: "dep".to_owned(),
                key: dependency.key.clone(),
                kind: dependency.kind,
                nullable: dependency.nullable,
            })
            .collect();
        Binding::from_injectable(&decl)
    }

    #[test]
    fn factory_names_follow_the_sibling_convention() {
        let binding = injection_binding(vec![]);
        assert_eq!(factory_name(&binding).unwrap(), "Foo_Factory");
        let provides = provides("provide_bar", key("Bar"), vec![]);
        let module = module("MyModule", vec![provides.clone()]);
        let provision = Binding::from_module_decl(&module, &provides, provides.key.clone());
        assert_eq!(
            factory_name(&provision).unwrap(),
            "MyModule_provide_bar_Factory"
        );
    }

    #[test]
    fn injection_factory_exposes_create_and_new_instance() {
        let binding = injection_binding(vec![DependencyRequest {
            name: "bar".to_owned(),
            key: key("Bar"),
            kind: RequestKind::Instance,
            nullable: false,
        }]);
        let artifact = artifact_for(&binding, None).unwrap();
        let file = generate(&artifact, "test_crate", &CompilerOptions::new()).unwrap();
        let source = file.source_string();
        assert!(source.contains("pub fn create"));
        assert!(source.contains("pub fn new_instance"));
        assert!(source.contains("Provider < crate :: Foo >"));
    }

    #[test]
    fn lazy_dependency_is_wrapped_at_the_get_site() {
        let binding = injection_binding(vec![DependencyRequest {
            name: "bar".to_owned(),
            key: key("Bar"),
            kind: RequestKind::Lazy,
            nullable: false,
        }]);
        let artifact = artifact_for(&binding, None).unwrap();
        let file = generate(&artifact, "test_crate", &CompilerOptions::new()).unwrap();
        assert!(file.source_string().contains("Lazy :: new"));
    }

    #[test]
    fn producer_token_follows_the_knob() {
        use poniard_common::manifest::{BindingDecl, BindingDeclKind};
        let mut produces = BindingDecl::new(BindingDeclKind::Produces);
        produces.name = "produce_foo".to_owned();
        produces.key = key("Foo");
        let module = module("MyModule", vec![produces.clone()]);
        let binding = Binding::from_module_decl(&module, &produces, produces.key.clone());
        let artifact = artifact_for(&binding, None).unwrap();

        let without = generate(&artifact, "test_crate", &CompilerOptions::new()).unwrap();
        assert!(!without.source_string().contains("PRODUCER_TOKEN"));

        let mut options = CompilerOptions::new();
        options.write_producer_name_in_token = true;
        let with = generate(&artifact, "test_crate", &options).unwrap();
        assert!(with.source_string().contains("PRODUCER_TOKEN"));
        assert!(with.source_string().contains("produce_foo"));
    }

    #[test]
    fn erased_create_exists_only_for_restricted_types() {
        use poniard_common::type_data::Visibility;
        let binding = injection_binding(vec![]);
        let artifact = artifact_for(&binding, None).unwrap();
        let public = generate(&artifact, "test_crate", &CompilerOptions::new()).unwrap();
        assert!(!public.source_string().contains("create_erased"));

        let mut decl = injectable("Hidden", vec![]);
        decl.type_data.visibility = Visibility::Restricted("test_crate::inner".to_owned());
        let restricted_binding = Binding::from_injectable(&decl);
        let artifact = artifact_for(&restricted_binding, None).unwrap();
        let restricted = generate(&artifact, "test_crate", &CompilerOptions::new()).unwrap();
        assert!(restricted.source_string().contains("create_erased"));
    }
}
