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

//! Component implementation builder: aggregates fields, ordered
//! initializations, entry-point methods and nested helper types, then seals
//! them into the generated source tree.

use indexmap::{IndexMap, IndexSet};
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use tracing::debug;

use crate::binding::{Binding, BindingKind, DependencyRequest};
use crate::driver::CompilationContext;
use crate::error::InternalError;
use crate::factories;
use crate::graph::{BindingGraph, RootRequest};
use crate::module_proxy;
use crate::representation::{self, Representation};
use crate::suppliers::{
    self, provider_field, static_factory, switching, CacheWrapper, SupplierStrategy,
};
use poniard_common::artifact::GeneratedFile;
use poniard_common::key::{Key, MapKey, RequestKind};
use poniard_common::manifest::ModuleDecl;
use poniard_common::type_data::TypeData;

/// Where an expression is being emitted, deciding how component state is
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    /// Inside a component method; state behind `self`.
    Method,
    /// Inside the initialize sequence; state is local `let` bindings.
    Init,
    /// Inside the switching provider; state behind an upgraded `component`.
    Dispatch,
}

impl Site {
    fn access(self, field: &Ident) -> TokenStream {
        match self {
            Site::Method => quote! { self.#field },
            Site::Init => quote! { #field },
            Site::Dispatch => quote! { component.#field },
        }
    }

    fn weak_self(self) -> TokenStream {
        match self {
            Site::Method => quote! { self.weak_self.clone() },
            Site::Init => quote! { weak_self.clone() },
            Site::Dispatch => quote! { component.weak_self.clone() },
        }
    }
}

/// Accumulated output for one component implementation. Sealed exactly once.
pub struct ComponentImplementation {
    pub name: Ident,
    fields: Vec<TokenStream>,
    ctor_params: Vec<TokenStream>,
    initializations: Vec<TokenStream>,
    struct_assignments: Vec<TokenStream>,
    methods: Vec<TokenStream>,
    trait_methods: Vec<TokenStream>,
    nested_types: Vec<TokenStream>,
    switch_arms: Vec<TokenStream>,
    next_switch_id: u32,
    needs_weak_self: bool,
}

impl ComponentImplementation {
    pub fn new(name: Ident) -> Self {
        ComponentImplementation {
            name,
            fields: Vec::new(),
            ctor_params: Vec::new(),
            initializations: Vec::new(),
            struct_assignments: Vec::new(),
            methods: Vec::new(),
            trait_methods: Vec::new(),
            nested_types: Vec::new(),
            switch_arms: Vec::new(),
            next_switch_id: 0,
            needs_weak_self: false,
        }
    }

    fn add_field(&mut self, tokens: TokenStream) {
        self.fields.push(tokens);
    }

    fn add_ctor_param(&mut self, tokens: TokenStream) {
        self.ctor_params.push(tokens);
    }

    fn add_initialization(&mut self, tokens: TokenStream) {
        self.initializations.push(tokens);
    }

    fn add_struct_assignment(&mut self, tokens: TokenStream) {
        self.struct_assignments.push(tokens);
    }

    fn add_trait_method(&mut self, tokens: TokenStream) {
        self.trait_methods.push(tokens);
    }

    fn take_switch_id(&mut self) -> u32 {
        let id = self.next_switch_id;
        self.next_switch_id += 1;
        id
    }

    /// Seals the accumulator into the component's source tree.
    fn seal(mut self, trait_path: TokenStream) -> TokenStream {
        let name = &self.name;
        if self.needs_weak_self {
            self.fields
                .insert(0, quote! { weak_self: ::std::rc::Weak<#name>, });
            self.struct_assignments
                .insert(0, quote! { weak_self: weak_self.clone(), });
        }
        let fields = &self.fields;
        let ctor_params = &self.ctor_params;
        let initializations = &self.initializations;
        let struct_assignments = &self.struct_assignments;
        let methods = &self.methods;
        let trait_methods = &self.trait_methods;
        let nested_types = &self.nested_types;

        let ctor = if self.needs_weak_self {
            quote! {
                pub fn new(#(#ctor_params)*) -> ::std::rc::Rc<Self> {
                    ::std::rc::Rc::new_cyclic(|weak_self| {
                        #(#initializations)*
                        #name { #(#struct_assignments)* }
                    })
                }
            }
        } else {
            quote! {
                pub fn new(#(#ctor_params)*) -> ::std::rc::Rc<Self> {
                    #(#initializations)*
                    ::std::rc::Rc::new(#name { #(#struct_assignments)* })
                }
            }
        };

        let dispatcher = if self.switch_arms.is_empty() {
            quote! {}
        } else {
            let dispatcher_ident = switching::dispatcher_ident(&name.to_string());
            switching::dispatcher_type(&dispatcher_ident, name, &self.switch_arms)
        };

        quote! {
            pub struct #name {
                #(#fields)*
            }

            impl #name {
                #ctor
                #(#methods)*
            }

            impl #trait_path for #name {
                #(#trait_methods)*
            }

            #dispatcher

            #(#nested_types)*
        }
    }
}

/// Emits the implementation for a validated component graph, including its
/// subcomponents, queuing factory and proxy artifacts on the context.
pub fn emit_component(
    ctx: &mut CompilationContext,
    graph: &BindingGraph,
) -> Result<GeneratedFile, InternalError> {
    debug!(component = %graph.component.type_data.readable(), "emitting component");
    let name = format_ident!("{}", graph.component.impl_name());
    let format = ctx.options.format_generated_source;
    let emitter = ComponentEmitter::new(ctx, graph, Vec::new(), None, name);
    let source = emitter.run()?;
    Ok(GeneratedFile {
        module_path: graph.component.declaring_module().to_owned(),
        name: graph.component.impl_name(),
        source,
        format,
    })
}

struct ComponentEmitter<'c, 'm> {
    ctx: &'c mut CompilationContext<'m>,
    graph: &'c BindingGraph,
    /// Enclosing graphs, outermost first.
    ancestors: Vec<&'c BindingGraph>,
    parent_impl: Option<Ident>,
    impl_: ComponentImplementation,
    installed_fields: IndexMap<String, Ident>,
    installing: IndexSet<String>,
    pending_delegates: IndexMap<String, Ident>,
    switch_ids: IndexMap<String, u32>,
    module_fields: IndexMap<String, Ident>,
    param_fields: IndexMap<String, Ident>,
}

impl<'c, 'm> ComponentEmitter<'c, 'm> {
    fn new(
        ctx: &'c mut CompilationContext<'m>,
        graph: &'c BindingGraph,
        ancestors: Vec<&'c BindingGraph>,
        parent_impl: Option<Ident>,
        name: Ident,
    ) -> Self {
        ComponentEmitter {
            ctx,
            graph,
            ancestors,
            parent_impl,
            impl_: ComponentImplementation::new(name),
            installed_fields: IndexMap::new(),
            installing: IndexSet::new(),
            pending_delegates: IndexMap::new(),
            switch_ids: IndexMap::new(),
            module_fields: IndexMap::new(),
            param_fields: IndexMap::new(),
        }
    }

    fn component_module(&self) -> String {
        self.graph.component.declaring_module().to_owned()
    }

    fn current_crate(&self) -> String {
        self.ctx.current_crate.clone()
    }

    fn fast_init(&self) -> bool {
        self.ctx.options.fast_init
    }

    fn run(mut self) -> Result<TokenStream, InternalError> {
        if let Some(parent) = self.parent_impl.clone() {
            self.impl_
                .add_field(quote! { parent: ::std::rc::Rc<#parent>, });
            self.impl_
                .add_ctor_param(quote! { parent: ::std::rc::Rc<#parent>, });
            self.impl_.add_struct_assignment(quote! { parent, });
        }
        self.install_modules();
        self.install_creator_params();
        self.install_child_requirements()?;

        let roots = self.graph.roots.clone();
        for root in &roots {
            let method = self.entry_point_method(root)?;
            self.impl_.add_trait_method(method);
        }

        let graph = self.graph;
        let mut subcomponent_tokens = Vec::new();
        for subgraph in &graph.subgraphs {
            subcomponent_tokens.push(self.emit_subcomponent(subgraph)?);
        }

        let trait_type = self
            .graph
            .component
            .type_data
            .local_syn_type(&self.current_crate());
        let sealed = self.impl_.seal(quote! { #trait_type });
        Ok(quote! {
            #sealed
            #(#subcomponent_tokens)*
        })
    }

    fn install_modules(&mut self) {
        let current_crate = self.current_crate();
        let component_module = self.component_module();
        let modules: Vec<ModuleDecl> = self
            .graph
            .component
            .modules
            .iter()
            .filter_map(|module_type| self.ctx.manifest.module(module_type).cloned())
            .collect();
        for module in modules {
            if !module.requires_instance() {
                continue;
            }
            let field = format_ident!("{}", to_snake(&module.type_data.simple_name()));
            let module_type = module.type_data.local_syn_type(&current_crate);
            let instantiation =
                module_proxy::instantiation(&module, &component_module, &current_crate);
            if module_proxy::needs_proxy(&module, &component_module) {
                self.ctx
                    .proxies
                    .entry(module_proxy::proxy_name(&module))
                    .or_insert_with(|| module.clone());
            }
            self.impl_
                .add_field(quote! { #field: ::std::rc::Rc<#module_type>, });
            self.impl_.add_initialization(
                quote! { let #field = ::std::rc::Rc::new(#instantiation); },
            );
            self.impl_
                .add_struct_assignment(quote! { #field: #field.clone(), });
            self.module_fields
                .insert(module.type_data.identifier_string(), field);
        }
    }

    fn install_creator_params(&mut self) {
        let current_crate = self.current_crate();
        let dependencies = self.graph.component.dependencies.clone();
        for dependency in &dependencies {
            let field = format_ident!("{}", to_snake(&dependency.type_data.simple_name()));
            let dependency_type = dependency.type_data.local_syn_type(&current_crate);
            self.impl_
                .add_field(quote! { #field: ::std::rc::Rc<#dependency_type>, });
            self.impl_
                .add_ctor_param(quote! { #field: ::std::rc::Rc<#dependency_type>, });
            self.impl_
                .add_struct_assignment(quote! { #field: #field.clone(), });
            self.param_fields.insert(
                Key::new(dependency.type_data.clone()).identifier_string(),
                field,
            );
        }
        let bound_instances = self.graph.component.bound_instances.clone();
        for bound in &bound_instances {
            let field = format_ident!("{}", bound.name);
            let bound_type = bound.key.type_.local_syn_type(&current_crate);
            self.impl_.add_field(quote! { #field: #bound_type, });
            self.impl_.add_ctor_param(quote! { #field: #bound_type, });
            self.impl_
                .add_struct_assignment(quote! { #field: #field.clone(), });
            self.param_fields
                .insert(bound.key.identifier_string(), field);
        }
    }

    /// Installs provider fields for every key a descendant inherits from this
    /// component, so subcomponent implementations have a field to reach.
    fn install_child_requirements(&mut self) -> Result<(), InternalError> {
        let mut required: IndexSet<Key> = IndexSet::new();
        collect_inherited(self.graph, &mut required);
        for key in required {
            if self.graph.resolved.contains_key(&key) {
                self.provider_field_expr(&key, Site::Method)?;
            }
        }
        Ok(())
    }

    fn emit_subcomponent(
        &mut self,
        subgraph: &'c BindingGraph,
    ) -> Result<TokenStream, InternalError> {
        let child_name = format_ident!(
            "{}",
            subcomponent_impl_name(&self.graph.component.impl_name(), subgraph)
        );
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.graph);
        let child = ComponentEmitter::new(
            &mut *self.ctx,
            subgraph,
            ancestors,
            Some(self.impl_.name.clone()),
            child_name,
        );
        child.run()
    }

    fn entry_point_method(&mut self, root: &RootRequest) -> Result<TokenStream, InternalError> {
        let name = format_ident!("{}", root.name);
        let current_crate = self.current_crate();
        let ty = root.key.type_.local_syn_type(&current_crate);
        Ok(match root.kind {
            RequestKind::Instance => {
                let value = self.instance_value(&root.key, Site::Method, &root.key.type_)?;
                quote! { fn #name(&self) -> #ty { #value } }
            }
            RequestKind::Provider => {
                let provider = self.framework_expr(&root.key, Site::Method)?;
                if self.is_accessible(&root.key) {
                    quote! {
                        fn #name(&self) -> ::std::rc::Rc<dyn poniard::Provider<#ty>> {
                            #provider
                        }
                    }
                } else {
                    quote! {
                        fn #name(
                            &self,
                        ) -> ::std::rc::Rc<dyn poniard::Provider<::std::boxed::Box<dyn ::std::any::Any>>>
                        {
                            #provider
                        }
                    }
                }
            }
            RequestKind::Lazy => {
                let provider = self.framework_expr(&root.key, Site::Method)?;
                quote! {
                    fn #name(&self) -> poniard::Lazy<#ty> {
                        poniard::Lazy::new(#provider)
                    }
                }
            }
            RequestKind::ProviderOfLazy => {
                let provider = self.framework_expr(&root.key, Site::Method)?;
                quote! {
                    fn #name(&self) -> ::std::rc::Rc<poniard::ProviderOfLazy<#ty>> {
                        poniard::ProviderOfLazy::create(#provider)
                    }
                }
            }
            RequestKind::MembersInjector => {
                let injector = self.members_injector_expr(&root.key, Site::Method)?;
                quote! {
                    fn #name(&self, instance: &mut #ty) {
                        #injector.inject_members(instance)
                    }
                }
            }
            RequestKind::Producer => {
                let producer = self.producer_expr(&root.key, Site::Method)?;
                quote! {
                    fn #name(&self) -> ::std::rc::Rc<dyn poniard::Producer<#ty>> {
                        #producer
                    }
                }
            }
            RequestKind::Produced | RequestKind::Future => {
                let producer = self.producer_expr(&root.key, Site::Method)?;
                quote! {
                    fn #name(&self) -> poniard::ProducerFuture<'_, #ty> {
                        #producer.produce()
                    }
                }
            }
        })
    }

    fn is_accessible(&self, key: &Key) -> bool {
        key.type_
            .accessible_from(self.graph.component.declaring_module())
    }

    fn binding(&self, key: &Key) -> Result<&'c Binding, InternalError> {
        self.graph.binding(key).ok_or_else(|| {
            InternalError::new(
                &key.readable(),
                "no binding resolved for a requested key during emission",
            )
        })
    }

    /// A value expression of (roughly) `needed`'s type for the binding of
    /// `key`. Erased providers are cast back only when `needed` is accessible
    /// from the component's module; otherwise the erased value flows on.
    fn instance_value(
        &mut self,
        key: &Key,
        site: Site,
        needed: &TypeData,
    ) -> Result<TokenStream, InternalError> {
        if !self.graph.resolved.contains_key(key) && self.graph.inherited.contains(key) {
            let (provider, erased) = self.inherited_provider(key, site)?;
            return Ok(self.cast_if_needed(quote! { #provider.get() }, erased, needed));
        }
        let binding = self.binding(key)?;
        let erased = !self.is_accessible(key);
        let representation = if erased {
            // Inaccessible types always go through an erased framework
            // instance; the direct path would have to name the type.
            Representation::FrameworkInstance
        } else {
            representation::select(self.graph, binding, RequestKind::Instance, self.fast_init())
        };
        match representation {
            Representation::DirectInstance => self.direct_expr(binding, site),
            Representation::FrameworkInstance => {
                let provider = self.framework_expr(key, site)?;
                Ok(self.cast_if_needed(quote! { #provider.get() }, erased, needed))
            }
        }
    }

    fn cast_if_needed(
        &self,
        value: TokenStream,
        erased: bool,
        needed: &TypeData,
    ) -> TokenStream {
        if !erased {
            return value;
        }
        if needed.accessible_from(self.graph.component.declaring_module()) {
            let needed_type = needed.local_syn_type(&self.ctx.current_crate);
            quote! { poniard::unchecked_cast::<#needed_type>(#value) }
        } else {
            // The receiver cannot name the type either; hand the erased value
            // through uncast.
            value
        }
    }

    /// Direct instance expression for a binding; only legal for kinds the
    /// representation selector can inline.
    fn direct_expr(&mut self, binding: &Binding, site: Site) -> Result<TokenStream, InternalError> {
        let current_crate = self.current_crate();
        match &binding.kind {
            BindingKind::Injection { .. }
            | BindingKind::Provision { .. }
            | BindingKind::Production { .. } => {
                self.queue_factory(binding, None)?;
                let factory = factories::factory_path(binding, &current_crate)
                    .ok_or_else(|| internal(binding, "binding has no factory path"))?;
                let mut args: Vec<TokenStream> = Vec::new();
                if let Some(module_type) = binding.requires_module_instance().cloned() {
                    let module_field = self.module_field(&module_type)?;
                    let access = site.access(&module_field);
                    args.push(quote! { &#access, });
                }
                let dependencies = binding.dependencies.clone();
                for dependency in &dependencies {
                    let value = self.dependency_arg(dependency, site)?;
                    args.push(quote! { #value, });
                }
                Ok(quote! { #factory::new_instance(#(#args)*) })
            }
            BindingKind::Delegate { source } => {
                let source = source.clone();
                let needed = binding.key.type_.clone();
                self.instance_value(&source, site, &needed)
            }
            BindingKind::MultiboundVec { contributions } => {
                let contributions = contributions.clone();
                let mut elements = Vec::new();
                for contribution in &contributions {
                    let needed = contribution.type_.clone();
                    elements.push(self.instance_value(contribution, site, &needed)?);
                }
                Ok(quote! { vec![#(#elements),*] })
            }
            BindingKind::MultiboundMap { contributions } => {
                let contributions = contributions.clone();
                let mut inserts = Vec::new();
                for (map_key, contribution) in &contributions {
                    let key_tokens = map_key_tokens(map_key, &current_crate);
                    let needed = contribution.type_.clone();
                    let value = self.instance_value(contribution, site, &needed)?;
                    inserts.push(quote! { result.insert(#key_tokens, #value); });
                }
                Ok(quote! {
                    {
                        let mut result = ::std::collections::HashMap::new();
                        #(#inserts)*
                        result
                    }
                })
            }
            BindingKind::Optional { underlying } => match underlying {
                Some(underlying) => {
                    let underlying = underlying.clone();
                    let needed = underlying.type_.clone();
                    let value = self.instance_value(&underlying, site, &needed)?;
                    Ok(quote! { ::std::option::Option::Some(#value) })
                }
                None => Ok(quote! { ::std::option::Option::None }),
            },
            BindingKind::Component { .. } => {
                self.impl_.needs_weak_self = true;
                let weak = site.weak_self();
                Ok(quote! { #weak.upgrade().expect("component dropped") })
            }
            BindingKind::ComponentDependency { type_ } => {
                let field = self.param_field(&Key::new(type_.clone()), binding)?;
                let access = site.access(&field);
                Ok(quote! { #access.clone() })
            }
            BindingKind::ComponentProvision { dependency, method }
            | BindingKind::ComponentProduction { dependency, method } => {
                let field = self.param_field(&Key::new(dependency.clone()), binding)?;
                let method = format_ident!("{}", method);
                let access = site.access(&field);
                Ok(quote! { #access.#method() })
            }
            BindingKind::BoundInstance { .. } => {
                let field = self.param_field(&binding.key, binding)?;
                let access = site.access(&field);
                Ok(quote! { #access.clone() })
            }
            BindingKind::SubcomponentCreator { subcomponent } => {
                let subgraph_name = self
                    .graph
                    .subgraphs
                    .iter()
                    .find(|subgraph| subgraph.component.type_data == *subcomponent)
                    .map(|subgraph| {
                        subcomponent_impl_name(&self.graph.component.impl_name(), subgraph)
                    })
                    .ok_or_else(|| internal(binding, "subcomponent graph not found"))?;
                let child = format_ident!("{}", subgraph_name);
                self.impl_.needs_weak_self = true;
                let weak = site.weak_self();
                Ok(quote! { #child::new(#weak.upgrade().expect("component dropped")) })
            }
            BindingKind::AssistedInjection { .. } => Err(internal(
                binding,
                "assisted injection requested as a direct instance outside its factory",
            )),
            BindingKind::AssistedFactory { .. }
            | BindingKind::MembersInjector { .. }
            | BindingKind::MembersInjection { .. } => Err(internal(
                binding,
                "framework-only binding asked for a direct instance expression",
            )),
        }
    }

    /// Argument expression for one dependency of an inlined construction.
    fn dependency_arg(
        &mut self,
        dependency: &DependencyRequest,
        site: Site,
    ) -> Result<TokenStream, InternalError> {
        match dependency.kind {
            RequestKind::Instance => {
                self.instance_value(&dependency.key, site, &dependency.key.type_)
            }
            RequestKind::Provider => self.framework_expr(&dependency.key, site),
            RequestKind::Lazy => {
                let provider = self.framework_expr(&dependency.key, site)?;
                Ok(quote! { poniard::Lazy::new(#provider) })
            }
            RequestKind::ProviderOfLazy => {
                let provider = self.framework_expr(&dependency.key, site)?;
                Ok(quote! { poniard::ProviderOfLazy::create(#provider) })
            }
            RequestKind::MembersInjector => self.members_injector_expr(&dependency.key, site),
            RequestKind::Producer => self.producer_expr(&dependency.key, site),
            RequestKind::Produced | RequestKind::Future => {
                let producer = self.producer_expr(&dependency.key, site)?;
                Ok(quote! { #producer.produce() })
            }
        }
    }

    /// Provider-shaped framework expression for a key.
    fn framework_expr(&mut self, key: &Key, site: Site) -> Result<TokenStream, InternalError> {
        if !self.graph.resolved.contains_key(key) {
            if self.graph.inherited.contains(key) {
                let (provider, _) = self.inherited_provider(key, site)?;
                return Ok(provider);
            }
            return Err(InternalError::new(
                &key.readable(),
                "framework expression requested for an unresolved key",
            ));
        }
        let binding = self.binding(key)?;
        // A delegate that does not cache is transparent: every request is
        // served straight from its target's framework instance.
        if let BindingKind::Delegate { source } = &binding.kind {
            if suppliers::cache_wrapper(self.graph, binding) == CacheWrapper::None {
                let source = source.clone();
                return self.framework_expr(&source, site);
            }
        }
        match suppliers::select_strategy(self.graph, binding, self.fast_init()) {
            SupplierStrategy::StaticFactory => {
                if !static_factory::is_empty_aggregate(binding) {
                    // An erased expression cannot be inlined at every use
                    // site, so inaccessible types keep a raw provider field.
                    if !self.is_accessible(key) {
                        return self.provider_field_expr(key, site);
                    }
                    self.queue_factory(binding, None)?;
                }
                static_factory::expression(binding, &self.current_crate())
            }
            SupplierStrategy::ProviderField => self.provider_field_expr(key, site),
            SupplierStrategy::SwitchingProvider => {
                let wrapper = suppliers::cache_wrapper(self.graph, binding);
                if wrapper == CacheWrapper::None {
                    let id = self.switch_id(key)?;
                    self.impl_.needs_weak_self = true;
                    let dispatcher =
                        switching::dispatcher_ident(&self.impl_.name.to_string());
                    Ok(switching::provider_expression(
                        &dispatcher,
                        site.weak_self(),
                        id,
                    ))
                } else {
                    // Memoization wrappers compose over the dispatcher and
                    // live in a provider field.
                    self.provider_field_expr(key, site)
                }
            }
        }
    }

    /// Assigns switching ids on first demand, in stable iteration order, and
    /// registers the dispatch arm.
    fn switch_id(&mut self, key: &Key) -> Result<u32, InternalError> {
        let id_key = key.identifier_string();
        if let Some(id) = self.switch_ids.get(&id_key) {
            return Ok(*id);
        }
        let id = self.impl_.take_switch_id();
        self.switch_ids.insert(id_key, id);
        let binding = self.binding(key)?;
        let arm_expr = match &binding.kind {
            // Framework-only kinds dispatch their framework object.
            BindingKind::AssistedFactory { .. } => {
                let cloned = binding.clone();
                self.assisted_factory_create(&cloned, Site::Dispatch)?
            }
            BindingKind::MembersInjection { .. } => {
                let key = key.clone();
                self.members_injection_create(&key, Site::Dispatch)?
            }
            _ => {
                let cloned = binding.clone();
                self.direct_expr(&cloned, Site::Dispatch)?
            }
        };
        self.impl_.switch_arms.push(switching::arm(id, arm_expr));
        Ok(id)
    }

    /// Installs (or reuses) the provider field for a key and returns its
    /// access expression. Legal provider cycles fall back to a two-phase
    /// delegate factory patched after the real provider exists.
    fn provider_field_expr(&mut self, key: &Key, site: Site) -> Result<TokenStream, InternalError> {
        let binding = self.binding(key)?.clone();
        let erased = !self.is_accessible(key);
        let dedup_key = if self.ctx.options.ignore_provision_key_wildcards
            && matches!(binding.kind, BindingKind::Provision { .. })
        {
            binding.key.type_.erased_string_path()
        } else {
            key.identifier_string()
        };
        if let Some(field) = self.installed_fields.get(&dedup_key) {
            let access = site.access(field);
            return Ok(quote! { #access.clone() });
        }
        if self.installing.contains(&dedup_key) {
            let field = provider_field::field_ident(key);
            let delegate = format_ident!("{}_delegate", field);
            if !self.pending_delegates.contains_key(&dedup_key) {
                self.impl_.add_initialization(quote! {
                    let #delegate = poniard::DelegateFactory::new();
                });
                self.pending_delegates
                    .insert(dedup_key.clone(), delegate.clone());
            }
            return Ok(quote! { #delegate.clone() });
        }
        self.installing.insert(dedup_key.clone());
        let underlying = self.underlying_provider(&binding, Site::Init)?;
        self.installing.shift_remove(&dedup_key);

        let wrapper = if binding.is_production() {
            CacheWrapper::None
        } else {
            suppliers::cache_wrapper(self.graph, &binding)
        };
        let init = suppliers::compose_wrapper(wrapper, underlying);
        let field = provider_field::field_ident(key);
        let field_type = if binding.is_production() {
            let provided = key.type_.local_syn_type(&self.ctx.current_crate);
            quote! { ::std::rc::Rc<dyn poniard::Producer<#provided>> }
        } else {
            provider_field::field_type(key, !erased, &self.ctx.current_crate)
        };
        self.impl_.add_field(quote! { #field: #field_type, });
        self.impl_
            .add_initialization(quote! { let #field: #field_type = #init; });
        if let Some(delegate) = self.pending_delegates.shift_remove(&dedup_key) {
            self.impl_
                .add_initialization(quote! { #delegate.set_delegate(#field.clone()); });
        }
        self.impl_
            .add_struct_assignment(quote! { #field: #field.clone(), });
        self.installed_fields.insert(dedup_key, field.clone());
        let access = site.access(&field);
        Ok(quote! { #access.clone() })
    }

    /// The unwrapped provider construction for a binding, emitted at the
    /// initialization site.
    fn underlying_provider(
        &mut self,
        binding: &Binding,
        site: Site,
    ) -> Result<TokenStream, InternalError> {
        let current_crate = self.current_crate();
        if self.fast_init() && suppliers::switching_eligible(binding) {
            let id = self.switch_id(&binding.key)?;
            self.impl_.needs_weak_self = true;
            let dispatcher = switching::dispatcher_ident(&self.impl_.name.to_string());
            return Ok(switching::provider_expression(
                &dispatcher,
                site.weak_self(),
                id,
            ));
        }
        match &binding.kind {
            BindingKind::Injection { .. }
            | BindingKind::Provision { .. }
            | BindingKind::Production { .. } => {
                self.queue_factory(binding, None)?;
                let factory = factories::factory_path(binding, &current_crate)
                    .ok_or_else(|| internal(binding, "binding has no factory path"))?;
                let create = if self.is_accessible(&binding.key) {
                    quote! { create }
                } else {
                    quote! { create_erased }
                };
                let mut args: Vec<TokenStream> = Vec::new();
                if let Some(module_type) = binding.requires_module_instance().cloned() {
                    let module_field = self.module_field(&module_type)?;
                    let access = site.access(&module_field);
                    args.push(quote! { #access.clone(), });
                }
                let dependencies = binding.dependencies.clone();
                for dependency in &dependencies {
                    let handle = self.dependency_handle(dependency, site)?;
                    args.push(quote! { #handle, });
                }
                Ok(quote! { #factory::#create(#(#args)*) })
            }
            BindingKind::Delegate { source } => {
                let source = source.clone();
                self.framework_expr(&source, site)
            }
            BindingKind::MultiboundVec { contributions } => {
                let contributions = contributions.clone();
                let mut adds = Vec::new();
                for contribution in &contributions {
                    let provider = self.framework_expr(contribution, site)?;
                    adds.push(quote! { .add_provider(#provider) });
                }
                Ok(quote! { poniard::VecFactory::builder()#(#adds)*.build() })
            }
            BindingKind::MultiboundMap { contributions } => {
                let contributions = contributions.clone();
                let mut puts = Vec::new();
                for (map_key, contribution) in &contributions {
                    let key_tokens = map_key_tokens(map_key, &current_crate);
                    let provider = self.framework_expr(contribution, site)?;
                    puts.push(quote! { .put(#key_tokens, #provider) });
                }
                Ok(quote! { poniard::MapFactory::builder()#(#puts)*.build() })
            }
            BindingKind::Optional { underlying } => match underlying {
                Some(underlying) => {
                    let underlying = underlying.clone();
                    let provider = self.framework_expr(&underlying, site)?;
                    Ok(quote! { poniard::PresentFactory::create(#provider) })
                }
                None => static_factory::expression(binding, &current_crate),
            },
            BindingKind::BoundInstance { .. } => {
                let field = self.param_field(&binding.key, binding)?;
                let access = site.access(&field);
                Ok(quote! { poniard::InstanceFactory::create(#access.clone()) })
            }
            BindingKind::ComponentDependency { type_ } => {
                let field = self.param_field(&Key::new(type_.clone()), binding)?;
                let access = site.access(&field);
                Ok(quote! { poniard::InstanceFactory::create(#access.clone()) })
            }
            BindingKind::ComponentProvision { dependency, method } => {
                let field = self.param_field(&Key::new(dependency.clone()), binding)?;
                let method = format_ident!("{}", method);
                let access = site.access(&field);
                Ok(quote! {
                    {
                        let dependency = #access.clone();
                        ::std::rc::Rc::new(poniard::ClosureProvider::new(move || {
                            dependency.#method()
                        }))
                    }
                })
            }
            BindingKind::ComponentProduction { dependency, method } => {
                let field = self.param_field(&Key::new(dependency.clone()), binding)?;
                let method = format_ident!("{}", method);
                let access = site.access(&field);
                Ok(quote! {
                    poniard::ProducerFromProvider::create({
                        let dependency = #access.clone();
                        ::std::rc::Rc::new(poniard::ClosureProvider::new(move || {
                            dependency.#method()
                        }))
                    })
                })
            }
            BindingKind::Component { .. } => {
                self.impl_.needs_weak_self = true;
                let weak = site.weak_self();
                Ok(quote! {
                    {
                        let component = #weak;
                        ::std::rc::Rc::new(poniard::ClosureProvider::new(move || {
                            component.upgrade().expect("component dropped")
                        }))
                    }
                })
            }
            BindingKind::SubcomponentCreator { .. } => {
                let creation = self.direct_expr_deferred(binding)?;
                self.impl_.needs_weak_self = true;
                let weak = site.weak_self();
                Ok(quote! {
                    {
                        let component = #weak;
                        ::std::rc::Rc::new(poniard::ClosureProvider::new(move || {
                            let component = component.upgrade().expect("component dropped");
                            #creation
                        }))
                    }
                })
            }
            BindingKind::AssistedFactory { .. } => self.assisted_factory_create(binding, site),
            BindingKind::MembersInjector { target } => {
                let key = Key::new(target.clone());
                self.members_injection_create(&key, site)
            }
            BindingKind::MembersInjection { .. } => {
                let key = binding.key.clone();
                self.members_injection_create(&key, site)
            }
            BindingKind::AssistedInjection { .. } => Err(internal(
                binding,
                "assisted injection has no standalone framework instance",
            )),
        }
    }

    /// Subcomponent creation inside a closure where `component` is already an
    /// upgraded `Rc`.
    fn direct_expr_deferred(&mut self, binding: &Binding) -> Result<TokenStream, InternalError> {
        match &binding.kind {
            BindingKind::SubcomponentCreator { subcomponent } => {
                let subgraph_name = self
                    .graph
                    .subgraphs
                    .iter()
                    .find(|subgraph| subgraph.component.type_data == *subcomponent)
                    .map(|subgraph| {
                        subcomponent_impl_name(&self.graph.component.impl_name(), subgraph)
                    })
                    .ok_or_else(|| internal(binding, "subcomponent graph not found"))?;
                let child = format_ident!("{}", subgraph_name);
                Ok(quote! { #child::new(component.clone()) })
            }
            _ => Err(internal(binding, "deferred expression for wrong kind")),
        }
    }

    /// `F_Impl::create(...)` enclosing captured providers for the target's
    /// non-assisted parameters.
    fn assisted_factory_create(
        &mut self,
        binding: &Binding,
        site: Site,
    ) -> Result<TokenStream, InternalError> {
        let target_key = match &binding.kind {
            BindingKind::AssistedFactory { target, .. } => target.clone(),
            _ => return Err(internal(binding, "not an assisted factory")),
        };
        let target = self.binding(&target_key)?.clone();
        self.queue_factory(&target, None)?;
        self.queue_factory(binding, Some(&target))?;
        let factory = factories::factory_path(binding, &self.current_crate())
            .ok_or_else(|| internal(binding, "assisted factory has no impl path"))?;
        let mut args = Vec::new();
        let dependencies = target.dependencies.clone();
        for dependency in &dependencies {
            let handle = self.dependency_handle(dependency, site)?;
            args.push(quote! { #handle, });
        }
        Ok(quote! { #factory::create(#(#args)*) })
    }

    /// `T_MembersInjector::create(...)` for the members-injection recipe of
    /// `key`.
    fn members_injection_create(
        &mut self,
        key: &Key,
        site: Site,
    ) -> Result<TokenStream, InternalError> {
        let binding = self
            .graph
            .members_injection(key)
            .or_else(|| self.graph.binding(key))
            .ok_or_else(|| {
                InternalError::new(&key.readable(), "no members-injection recipe resolved")
            })?
            .clone();
        self.queue_factory(&binding, None)?;
        let injector = factories::factory_path(&binding, &self.current_crate())
            .ok_or_else(|| internal(&binding, "members injector has no path"))?;
        let mut args = Vec::new();
        let members = binding.dependencies.clone();
        for member in &members {
            let handle = self.dependency_handle(member, site)?;
            args.push(quote! { #handle, });
        }
        Ok(quote! { #injector::create(#(#args)*) })
    }

    fn members_injector_expr(
        &mut self,
        key: &Key,
        site: Site,
    ) -> Result<TokenStream, InternalError> {
        self.members_injection_create(key, site)
    }

    /// Producer-shaped expression: production bindings supply their own
    /// producer; provision bindings are adapted.
    fn producer_expr(&mut self, key: &Key, site: Site) -> Result<TokenStream, InternalError> {
        let is_production = self
            .graph
            .binding(key)
            .map(Binding::is_production)
            .unwrap_or(false);
        if is_production {
            self.provider_field_expr(key, site)
        } else {
            let provider = self.framework_expr(key, site)?;
            Ok(quote! { poniard::ProducerFromProvider::create(#provider) })
        }
    }

    /// The provider/producer handle captured by a factory for one dependency.
    fn dependency_handle(
        &mut self,
        dependency: &DependencyRequest,
        site: Site,
    ) -> Result<TokenStream, InternalError> {
        match dependency.kind {
            RequestKind::Producer | RequestKind::Produced | RequestKind::Future => {
                self.producer_expr(&dependency.key, site)
            }
            RequestKind::MembersInjector => self.members_injector_expr(&dependency.key, site),
            _ => self.framework_expr(&dependency.key, site),
        }
    }

    fn module_field(&mut self, module_type: &TypeData) -> Result<Ident, InternalError> {
        self.module_fields
            .get(&module_type.identifier_string())
            .cloned()
            .ok_or_else(|| {
                InternalError::new(
                    &module_type.readable(),
                    "module instance requested but never installed",
                )
            })
    }

    fn param_field(&self, key: &Key, binding: &Binding) -> Result<Ident, InternalError> {
        self.param_fields
            .get(&key.identifier_string())
            .cloned()
            .ok_or_else(|| internal(binding, "creator-supplied instance not found"))
    }

    fn queue_factory(
        &mut self,
        binding: &Binding,
        target: Option<&Binding>,
    ) -> Result<(), InternalError> {
        if let Some(artifact) = factories::artifact_for(binding, target) {
            self.ctx
                .factories
                .entry(artifact.name.clone())
                .or_insert(artifact);
        }
        Ok(())
    }

    /// Framework handle for a key owned by an ancestor, reached through the
    /// parent chain. Returns the expression and whether it is erased.
    fn inherited_provider(
        &mut self,
        key: &Key,
        site: Site,
    ) -> Result<(TokenStream, bool), InternalError> {
        let mut depth = 0usize;
        let mut owner: Option<&BindingGraph> = None;
        for (position, ancestor) in self.ancestors.iter().rev().enumerate() {
            if ancestor.resolved.contains_key(key) {
                depth = position + 1;
                owner = Some(ancestor);
                break;
            }
        }
        let owner = owner.ok_or_else(|| {
            InternalError::new(
                &key.readable(),
                "inherited key has no owning ancestor at emission time",
            )
        })?;
        let erased = !key
            .type_
            .accessible_from(owner.component.declaring_module());
        let field = provider_field::field_ident(key);
        let parent = format_ident!("parent");
        let mut chain = site.access(&parent);
        for _ in 1..depth {
            chain = quote! { #chain.parent };
        }
        Ok((quote! { #chain.#field.clone() }, erased))
    }
}

fn internal(binding: &Binding, message: &str) -> InternalError {
    InternalError::new(&binding.readable_name(), message)
}

fn subcomponent_impl_name(parent_impl: &str, subgraph: &BindingGraph) -> String {
    format!(
        "{}_{}Impl",
        parent_impl,
        subgraph.component.type_data.simple_name()
    )
}

fn collect_inherited(graph: &BindingGraph, into: &mut IndexSet<Key>) {
    for subgraph in &graph.subgraphs {
        for key in &subgraph.inherited {
            into.insert(key.clone());
        }
        collect_inherited(subgraph, into);
    }
}

fn map_key_tokens(map_key: &MapKey, current_crate: &str) -> TokenStream {
    match map_key {
        MapKey::Str(value) => quote! { #value.to_owned() },
        MapKey::I32(value) => quote! { #value },
        MapKey::Enum(enum_type, variant) => {
            let enum_path = enum_type.local_syn_type(current_crate);
            let variant = format_ident!("{}", variant);
            quote! { #enum_path::#variant }
        }
    }
}

fn to_snake(name: &str) -> String {
    let mut snake = String::new();
    for (position, character) in name.chars().enumerate() {
        if character.is_uppercase() {
            if position != 0 {
                snake.push('_');
            }
            snake.extend(character.to_lowercase());
        } else {
            snake.push(character);
        }
    }
    snake
}
