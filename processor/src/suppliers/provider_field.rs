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

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use poniard_common::key::Key;

/// Name of the component field holding the provider for `key`. One field per
/// (key, representation category); every call site shares it.
pub fn field_ident(key: &Key) -> Ident {
    format_ident!("{}_provider", key.identifier_string())
}

/// Declared type of the provider field. Inaccessible provided types get an
/// erased provider; the cast back happens at sites whose type is accessible.
pub fn field_type(key: &Key, accessible: bool, current_crate: &str) -> TokenStream {
    if accessible {
        let provided = key.type_.local_syn_type(current_crate);
        quote! { ::std::rc::Rc<dyn poniard::Provider<#provided>> }
    } else {
        quote! { ::std::rc::Rc<dyn poniard::Provider<::std::boxed::Box<dyn ::std::any::Any>>> }
    }
}
