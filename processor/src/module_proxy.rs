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

//! Constructor proxies for modules whose nullary constructor is not visible
//! from the requesting component. The proxy is a pure function of module
//! visibility and requester module; no state is involved.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::config::CompilerOptions;
use crate::factories::path_tokens;
use poniard_common::artifact::GeneratedFile;
use poniard_common::manifest::ModuleDecl;
use poniard_common::type_data::Visibility;

pub fn proxy_name(module: &ModuleDecl) -> String {
    format!("{}_Proxy", module.type_data.joined_simple_names())
}

/// True when `requesting_module` cannot call the module's nullary constructor
/// directly and must route through the proxy.
pub fn needs_proxy(module: &ModuleDecl, requesting_module: &str) -> bool {
    match &module.constructor_visibility {
        Visibility::Public => false,
        Visibility::Restricted(root) => {
            !(requesting_module == root
                || requesting_module.starts_with(&format!("{}::", root)))
        }
    }
}

/// Expression instantiating the module from `requesting_module`, routed
/// through the proxy when the constructor is not visible.
pub fn instantiation(
    module: &ModuleDecl,
    requesting_module: &str,
    current_crate: &str,
) -> TokenStream {
    if needs_proxy(module, requesting_module) {
        let proxy = path_tokens(
            &module.type_data.declaring_module,
            &proxy_name(module),
            current_crate,
        );
        quote! { #proxy::new_instance() }
    } else {
        let module_type = module.type_data.local_syn_type(current_crate);
        quote! { <#module_type>::new() }
    }
}

/// The sibling proxy type, emitted next to the module where the constructor
/// is visible.
pub fn generate(
    module: &ModuleDecl,
    current_crate: &str,
    options: &CompilerOptions,
) -> GeneratedFile {
    let proxy = format_ident!("{}", proxy_name(module));
    let module_type = module.type_data.local_syn_type(current_crate);
    let source = quote! {
        pub struct #proxy;

        impl #proxy {
            pub fn new_instance() -> #module_type {
                <#module_type>::new()
            }
        }
    };
    GeneratedFile {
        module_path: module.type_data.declaring_module.clone(),
        name: proxy_name(module),
        source,
        format: options.format_generated_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn restricted_module() -> ModuleDecl {
        let mut module = module("inner::MyModule", vec![]);
        module.constructor_visibility =
            Visibility::Restricted("test_crate::inner".to_owned());
        module
    }

    #[test]
    fn public_constructor_needs_no_proxy() {
        let module = module("MyModule", vec![]);
        assert!(!needs_proxy(&module, "other_crate"));
        let tokens = instantiation(&module, "other_crate", "other_crate").to_string();
        assert!(!tokens.contains("Proxy"));
    }

    #[test]
    fn restricted_constructor_routes_through_proxy_outside_its_module() {
        let module = restricted_module();
        assert!(!needs_proxy(&module, "test_crate::inner"));
        assert!(!needs_proxy(&module, "test_crate::inner::deeper"));
        assert!(needs_proxy(&module, "test_crate"));
        assert!(needs_proxy(&module, "other_crate"));
        let tokens = instantiation(&module, "test_crate", "test_crate").to_string();
        assert!(tokens.contains("MyModule_Proxy :: new_instance"));
    }

    #[test]
    fn proxy_type_exposes_public_new_instance() {
        let module = restricted_module();
        let file = generate(&module, "test_crate", &CompilerOptions::new());
        assert_eq!(file.name, "inner_MyModule_Proxy");
        let source = file.source_string();
        assert!(source.contains("pub fn new_instance"));
    }
}
