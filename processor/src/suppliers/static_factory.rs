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

use proc_macro2::TokenStream;
use quote::quote;

use crate::binding::{Binding, BindingKind};
use crate::error::InternalError;
use crate::factories;

/// Zero-contribution aggregates are served by shared singleton factories
/// instead of generated types.
pub fn is_empty_aggregate(binding: &Binding) -> bool {
    matches!(
        binding.kind,
        BindingKind::MultiboundVec { .. }
            | BindingKind::MultiboundMap { .. }
            | BindingKind::Optional { .. }
    ) && binding.dependencies.is_empty()
}

/// A direct reference to the pre-generated static factory (or a singleton
/// empty factory); inlined everywhere it is used, no component field.
pub fn expression(binding: &Binding, current_crate: &str) -> Result<TokenStream, InternalError> {
    match &binding.kind {
        BindingKind::MultiboundVec { .. } if binding.dependencies.is_empty() => {
            let element = element_type(binding, 0, current_crate)?;
            Ok(quote! { poniard::EmptyVecFactory::provider::<#element>() })
        }
        BindingKind::MultiboundMap { .. } if binding.dependencies.is_empty() => {
            let key_type = element_type(binding, 0, current_crate)?;
            let value_type = element_type(binding, 1, current_crate)?;
            Ok(quote! { poniard::EmptyMapFactory::provider::<#key_type, #value_type>() })
        }
        BindingKind::Optional { underlying: None } => {
            let inner = element_type(binding, 0, current_crate)?;
            Ok(quote! { poniard::AbsentFactory::provider::<#inner>() })
        }
        _ => {
            let path = factories::factory_path(binding, current_crate).ok_or_else(|| {
                InternalError::new(
                    &binding.readable_name(),
                    "static factory requested for a binding without one",
                )
            })?;
            Ok(quote! { #path::create() })
        }
    }
}

fn element_type(
    binding: &Binding,
    index: usize,
    current_crate: &str,
) -> Result<TokenStream, InternalError> {
    let arg = binding.key.type_.args.get(index).ok_or_else(|| {
        InternalError::new(
            &binding.readable_name(),
            "aggregate key is missing its type arguments",
        )
    })?;
    let ty = arg.local_syn_type(current_crate);
    Ok(quote! { #ty })
}
