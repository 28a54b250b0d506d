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

use anyhow::{bail, Result};
use lazy_static::lazy_static;
use proc_macro2::Ident;
use quote::format_ident;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Eq, Hash)]
pub enum TypeRoot {
    UNSPECIFIED,
    GLOBAL,
    CRATE,
    PRIMITIVE,
}

impl Default for TypeRoot {
    fn default() -> Self {
        TypeRoot::UNSPECIFIED
    }
}

/// Where a type can be named from.
///
/// `Restricted` carries the outermost module path the type is visible in, so a
/// private type in `foo::bar` is `Restricted("foo::bar")` and a `pub(crate)`
/// type in crate `foo` is `Restricted("foo")`.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Eq, Hash)]
pub enum Visibility {
    Public,
    Restricted(String),
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

/// Canonical description of a source type, as reported by the front end.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Eq)]
pub struct TypeData {
    pub root: TypeRoot,
    pub path: String,
    pub field_crate: String,
    pub args: Vec<TypeData>,
    pub trait_object: bool,
    /// Module that declares the type, e.g. `my_crate::sub`.
    pub declaring_module: String,
    pub visibility: Visibility,
    pub identifier_suffix: String,
}

impl PartialEq for TypeData {
    fn eq(&self, other: &Self) -> bool {
        self.identifier_string().eq(&other.identifier_string())
    }
}

impl std::hash::Hash for TypeData {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identifier_string().hash(state)
    }
}

lazy_static! {
    static ref PRIMITIVES: HashSet<&'static str> = {
        let mut set = HashSet::new();
        set.extend([
            "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128",
            "usize", "f32", "f64", "bool", "char", "str",
        ]);
        set
    };
}

impl TypeData {
    pub fn new() -> Self {
        Default::default()
    }

    /// A type rooted at the global namespace, e.g. `std::string::String`.
    pub fn global(path: &str) -> Self {
        TypeData {
            root: TypeRoot::GLOBAL,
            path: path.to_owned(),
            ..Default::default()
        }
    }

    /// A type declared inside `crate_name`, with `path` relative to the crate root.
    pub fn crate_local(crate_name: &str, path: &str) -> Self {
        let declaring_module = match path.rfind("::") {
            Some(index) => format!("{}::{}", crate_name, &path[..index]),
            None => crate_name.to_owned(),
        };
        TypeData {
            root: TypeRoot::CRATE,
            path: path.to_owned(),
            field_crate: crate_name.to_owned(),
            declaring_module,
            ..Default::default()
        }
    }

    pub fn primitive(name: &str) -> Self {
        TypeData {
            root: TypeRoot::PRIMITIVE,
            path: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_arg(mut self, arg: TypeData) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn is_primitive_name(name: &str) -> bool {
        PRIMITIVES.contains(name)
    }

    /// Full path of the type in universal form.
    ///
    /// Modifiers like `dyn` are omitted.
    pub fn canonical_string_path(&self) -> String {
        match self.root {
            TypeRoot::GLOBAL => format!("::{}", self.path_with_args()),
            TypeRoot::CRATE => format!("::{}::{}", self.field_crate, self.path_with_args()),
            TypeRoot::PRIMITIVE => self.path.clone(),
            TypeRoot::UNSPECIFIED => panic!("canonical_string_path: root unspecified"),
        }
    }

    /// Path without type arguments, which is what visibility is checked
    /// against.
    pub fn erased_string_path(&self) -> String {
        match self.root {
            TypeRoot::GLOBAL => format!("::{}", self.path),
            TypeRoot::CRATE => format!("::{}::{}", self.field_crate, self.path),
            TypeRoot::PRIMITIVE => self.path.clone(),
            TypeRoot::UNSPECIFIED => panic!("erased_string_path: root unspecified"),
        }
    }

    /// Path as written from inside `current_crate` (`crate::` for local
    /// types). Arguments recurse with the same rendering, so a local type
    /// stays nameable inside framework and aggregate wrappers.
    pub fn local_string_path(&self, current_crate: &str) -> String {
        match self.root {
            TypeRoot::GLOBAL => format!("::{}", self.path_with_args_local(current_crate)),
            TypeRoot::CRATE if self.field_crate == current_crate => {
                format!("crate::{}", self.path_with_args_local(current_crate))
            }
            TypeRoot::CRATE => format!(
                "::{}::{}",
                self.field_crate,
                self.path_with_args_local(current_crate)
            ),
            TypeRoot::PRIMITIVE => self.path.clone(),
            TypeRoot::UNSPECIFIED => panic!("local_string_path: root unspecified"),
        }
    }

    fn path_with_args(&self) -> String {
        if self.args.is_empty() {
            return self.path.clone();
        }
        let args = self
            .args
            .iter()
            .map(TypeData::canonical_string_path)
            .collect::<Vec<String>>()
            .join(", ");
        format!("{}<{}>", self.path, args)
    }

    fn path_with_args_local(&self, current_crate: &str) -> String {
        if self.args.is_empty() {
            return self.path.clone();
        }
        let args = self
            .args
            .iter()
            .map(|arg| arg.local_string_path(current_crate))
            .collect::<Vec<String>>()
            .join(", ");
        format!("{}<{}>", self.path, args)
    }

    /// Human readable form for diagnostics.
    pub fn readable(&self) -> String {
        let prefix = if self.trait_object { "dyn " } else { "" };
        format!("{}{}", prefix, self.canonical_string_path())
    }

    /// Unique identifier token representing the type, usable as (part of) a
    /// generated member name.
    pub fn identifier_string(&self) -> String {
        format!(
            "{}{}",
            self.canonical_string_path()
                .replace("::", "ⵆ")
                .replace("<", "ᐸ")
                .replace(">", "ᐳ")
                .replace("-", "_")
                .replace(" ", "_")
                .replace("\'", "ᐠ")
                .replace("&", "ε")
                .replace(",", "ᒧ"),
            self.identifier_suffix
        )
    }

    pub fn identifier(&self) -> Ident {
        format_ident!("{}", self.identifier_string())
    }

    /// The last path segment, e.g. `Bar` for `foo::Bar`.
    pub fn simple_name(&self) -> String {
        self.path
            .rsplit("::")
            .next()
            .expect("empty type path")
            .to_owned()
    }

    /// Simple names of the whole nested path joined by `_`, e.g. `Outer_Inner`
    /// for `outer::Inner` declared under module `outer`.
    pub fn joined_simple_names(&self) -> String {
        self.path.replace("::", "_")
    }

    /// `syn` rendering of the type in universal form.
    pub fn syn_type(&self) -> syn::Type {
        let prefix = if self.trait_object { "dyn " } else { "" };
        syn::parse_str(&format!("{}{}", prefix, self.canonical_string_path()))
            .unwrap_or_else(|_| panic!("not a type: {}", self.canonical_string_path()))
    }

    /// `syn` rendering as written from inside `current_crate`.
    pub fn local_syn_type(&self, current_crate: &str) -> syn::Type {
        let prefix = if self.trait_object { "dyn " } else { "" };
        syn::parse_str(&format!("{}{}", prefix, self.local_string_path(current_crate)))
            .unwrap_or_else(|_| panic!("not a type: {}", self.local_string_path(current_crate)))
    }

    /// Whether the erasure of the type (its path, ignoring arguments) can be
    /// named from `module`.
    pub fn erasure_accessible_from(&self, module: &str) -> bool {
        match &self.visibility {
            Visibility::Public => true,
            Visibility::Restricted(root) => {
                module == root || module.starts_with(&format!("{}::", root))
            }
        }
    }

    /// Whether the full type, including every type argument, can be named from
    /// `module`.
    pub fn accessible_from(&self, module: &str) -> bool {
        self.erasure_accessible_from(module)
            && self.args.iter().all(|arg| arg.accessible_from(module))
    }

    /// Parses a universal path string like `foo::Bar<std::string::String>`
    /// into a `TypeData` rooted at the global namespace. Intended for manifest
    /// construction by front ends and tests.
    pub fn from_path_str(path: &str) -> Result<TypeData> {
        let ty: syn::Type = syn::parse_str(path)?;
        TypeData::from_syn_type(&ty)
    }

    fn from_syn_type(ty: &syn::Type) -> Result<TypeData> {
        match ty {
            syn::Type::Path(type_path) => {
                let mut result = TypeData::new();
                result.root = TypeRoot::GLOBAL;
                let mut segments = Vec::new();
                for segment in &type_path.path.segments {
                    segments.push(segment.ident.to_string());
                    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                        for arg in &args.args {
                            if let syn::GenericArgument::Type(arg_type) = arg {
                                result.args.push(TypeData::from_syn_type(arg_type)?);
                            }
                        }
                    }
                }
                if segments.len() == 1 && PRIMITIVES.contains(segments[0].as_str()) {
                    result.root = TypeRoot::PRIMITIVE;
                }
                result.path = segments.join("::");
                Ok(result)
            }
            syn::Type::TraitObject(trait_object) => {
                for bound in &trait_object.bounds {
                    if let syn::TypeParamBound::Trait(trait_bound) = bound {
                        let mut result = TypeData::from_syn_type(&syn::Type::Path(
                            syn::TypePath {
                                qself: None,
                                path: trait_bound.path.clone(),
                            },
                        ))?;
                        result.trait_object = true;
                        return Ok(result);
                    }
                }
                bail!("trait object without trait bound")
            }
            _ => bail!("unsupported type expression"),
        }
    }
}
