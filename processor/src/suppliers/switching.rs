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

/// One dispatcher type per component implementation.
pub fn dispatcher_ident(impl_name: &str) -> Ident {
    format_ident!("{}_SwitchingProvider", impl_name)
}

/// A provider handle dispatching to the arm registered under `id`.
pub fn provider_expression(
    dispatcher: &Ident,
    component_expr: TokenStream,
    id: u32,
) -> TokenStream {
    quote! {
        ::std::rc::Rc::new(#dispatcher {
            component: #component_expr,
            id: #id,
        })
    }
}

/// The dispatcher type itself. Not inherently thread-safe; scoping wrappers
/// compose over it when caching is required.
pub fn dispatcher_type(
    dispatcher: &Ident,
    component: &Ident,
    arms: &[TokenStream],
) -> TokenStream {
    quote! {
        struct #dispatcher {
            component: ::std::rc::Weak<#component>,
            id: u32,
        }

        impl #dispatcher {
            fn dispatch(&self) -> ::std::boxed::Box<dyn ::std::any::Any> {
                let component = self.component.upgrade().expect("component dropped");
                match self.id {
                    #(#arms)*
                    _ => panic!("unexpected switching provider id: {}", self.id),
                }
            }
        }

        impl<T: 'static> poniard::Provider<T> for #dispatcher {
            fn get(&self) -> T {
                poniard::unchecked_cast::<T>(self.dispatch())
            }
        }
    }
}

/// One `match` arm returning the freshly built instance for a binding.
pub fn arm(id: u32, instance_expression: TokenStream) -> TokenStream {
    quote! {
        #id => ::std::boxed::Box::new(#instance_expression),
    }
}
