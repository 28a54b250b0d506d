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

//! Framework-instance supplier strategies. Selection is a pure function over
//! (binding, graph, mode); the component emitter materializes the chosen
//! strategy's expression and side effects.

pub mod provider_field;
pub mod static_factory;
pub mod switching;

use proc_macro2::TokenStream;
use quote::quote;

use crate::binding::{Binding, BindingKind};
use crate::graph::BindingGraph;
use crate::representation::needs_caching;
use poniard_common::key::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierStrategy {
    /// Direct reference to a pre-generated static factory; no component
    /// field.
    StaticFactory,
    /// Component field holding the (possibly cache-wrapped) provider,
    /// initialized in the component's initialize sequence.
    ProviderField,
    /// Dispatch through the component's switching provider by integer id.
    SwitchingProvider,
}

/// Caching wrapper demanded by the binding's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrapper {
    None,
    /// Reusable: eventual single-instance, no publication guarantee.
    SingleCheck,
    /// Every other named scope: publication-safe single-instance.
    DoubleCheck,
}

pub fn cache_wrapper(graph: &BindingGraph, binding: &Binding) -> CacheWrapper {
    if !needs_caching(graph, binding) {
        return CacheWrapper::None;
    }
    match binding.scope {
        Some(Scope::Reusable) => CacheWrapper::SingleCheck,
        Some(Scope::Named(_)) => CacheWrapper::DoubleCheck,
        None => CacheWrapper::None,
    }
}

/// Wraps a provider expression in its memoizer. Composes over any underlying
/// supplier, including the switching provider.
pub fn compose_wrapper(wrapper: CacheWrapper, inner: TokenStream) -> TokenStream {
    match wrapper {
        CacheWrapper::None => inner,
        CacheWrapper::SingleCheck => quote! { poniard::SingleCheck::provider(#inner) },
        CacheWrapper::DoubleCheck => quote! { poniard::DoubleCheck::provider(#inner) },
    }
}

/// Whether the switching provider covers this binding in fast-init mode.
pub fn switching_eligible(binding: &Binding) -> bool {
    match binding.kind {
        BindingKind::Component { .. }
        | BindingKind::ComponentDependency { .. }
        | BindingKind::BoundInstance { .. }
        | BindingKind::Delegate { .. }
        | BindingKind::MembersInjector { .. }
        | BindingKind::AssistedInjection { .. } => false,
        BindingKind::MultiboundVec { .. }
        | BindingKind::MultiboundMap { .. }
        | BindingKind::Optional { .. } => !binding.dependencies.is_empty(),
        BindingKind::Injection { .. }
        | BindingKind::Provision { .. }
        | BindingKind::AssistedFactory { .. }
        | BindingKind::ComponentProvision { .. }
        | BindingKind::SubcomponentCreator { .. }
        | BindingKind::Production { .. }
        | BindingKind::ComponentProduction { .. }
        | BindingKind::MembersInjection { .. } => true,
    }
}

/// Whether a static factory reference can stand in for the framework
/// instance: the factory exists, captures nothing from the component, and no
/// caching is required.
pub fn static_factory_applicable(graph: &BindingGraph, binding: &Binding) -> bool {
    if static_factory::is_empty_aggregate(binding) {
        return true;
    }
    binding.has_static_factory()
        && binding.dependencies.is_empty()
        && binding.requires_module_instance().is_none()
        && !matches!(binding.kind, BindingKind::AssistedFactory { .. })
        && !needs_caching(graph, binding)
}

/// Strategy tie-breaks: switching > static > field under fast-init, field >
/// static otherwise.
pub fn select_strategy(
    graph: &BindingGraph,
    binding: &Binding,
    fast_init: bool,
) -> SupplierStrategy {
    if fast_init {
        if switching_eligible(binding) {
            return SupplierStrategy::SwitchingProvider;
        }
        if static_factory::is_empty_aggregate(binding) {
            return SupplierStrategy::StaticFactory;
        }
        return SupplierStrategy::ProviderField;
    }
    if static_factory_applicable(graph, binding) {
        SupplierStrategy::StaticFactory
    } else {
        SupplierStrategy::ProviderField
    }
}
