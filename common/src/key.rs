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

use crate::type_data::{TypeData, TypeRoot};
use proc_macro2::Ident;
use quote::format_ident;
use serde::{Deserialize, Serialize};

/// How a dependency is asked for at a usage site.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Clone, Copy)]
pub enum RequestKind {
    Instance,
    Provider,
    Lazy,
    ProviderOfLazy,
    MembersInjector,
    Producer,
    Produced,
    Future,
}

impl Default for RequestKind {
    fn default() -> Self {
        RequestKind::Instance
    }
}

impl RequestKind {
    /// Request kinds satisfied by a provider-like handle rather than a value.
    pub fn is_framework(&self) -> bool {
        matches!(
            self,
            RequestKind::Provider
                | RequestKind::Lazy
                | RequestKind::ProviderOfLazy
                | RequestKind::Producer
        )
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self,
            RequestKind::Producer | RequestKind::Produced | RequestKind::Future
        )
    }
}

/// Lifetime level at which a binding's value is cached.
///
/// `Reusable` only promises eventual single-instance semantics; every other
/// named scope demands publication-safe single-instance semantics.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Clone)]
pub enum Scope {
    Reusable,
    Named(TypeData),
}

impl Scope {
    pub fn is_reusable(&self) -> bool {
        matches!(self, Scope::Reusable)
    }

    fn rank(scope: &Option<Scope>) -> u8 {
        match scope {
            None => 0,
            Some(Scope::Reusable) => 1,
            Some(Scope::Named(_)) => 2,
        }
    }

    /// Whether `left` caches more strongly than `right`.
    pub fn strictly_stronger(left: &Option<Scope>, right: &Option<Scope>) -> bool {
        Scope::rank(left) > Scope::rank(right)
    }

    pub fn readable(scope: &Option<Scope>) -> String {
        match scope {
            None => "unscoped".to_owned(),
            Some(Scope::Reusable) => "reusable".to_owned(),
            Some(Scope::Named(type_)) => type_.readable(),
        }
    }
}

/// Value of a multibound map key declared on a contribution.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Clone)]
pub enum MapKey {
    Str(String),
    I32(i32),
    /// (enum type, variant name)
    Enum(TypeData, String),
}

impl MapKey {
    pub fn key_type(&self) -> TypeData {
        match self {
            MapKey::Str(_) => TypeData::global("std::string::String"),
            MapKey::I32(_) => TypeData::primitive("i32"),
            MapKey::Enum(type_, _) => type_.clone(),
        }
    }

    pub fn readable(&self) -> String {
        match self {
            MapKey::Str(value) => format!("\"{}\"", value),
            MapKey::I32(value) => value.to_string(),
            MapKey::Enum(type_, variant) => format!("{}::{}", type_.readable(), variant),
        }
    }
}

/// Distinguishes a multibinding contribution from the aggregated binding of
/// the same type.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Clone)]
pub enum MultibindingSlot {
    /// Declaration index of a set/vec contribution.
    Element(u32),
    /// Map contribution under the declared key.
    Entry(MapKey),
}

/// Canonical identity for a requested dependency.
///
/// Two keys are equal iff type (including arguments), qualifier (including
/// member values) and multibinding slot are all equal. Keys are the sole
/// identity used across the binding graph.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Clone, Default)]
pub struct Key {
    pub type_: TypeData,
    pub qualifier: Option<TypeData>,
    pub slot: Option<MultibindingSlot>,
}

impl Key {
    pub fn new(type_: TypeData) -> Self {
        Key {
            type_,
            qualifier: None,
            slot: None,
        }
    }

    pub fn qualified(type_: TypeData, qualifier: TypeData) -> Self {
        Key {
            type_,
            qualifier: Some(qualifier),
            slot: None,
        }
    }

    pub fn with_slot(mut self, slot: MultibindingSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn without_slot(&self) -> Key {
        Key {
            type_: self.type_.clone(),
            qualifier: self.qualifier.clone(),
            slot: None,
        }
    }

    /// The aggregated vec key for an element contribution of this key's type.
    pub fn multibound_vec(&self) -> Key {
        Key {
            type_: vec_of(&self.type_),
            qualifier: self.qualifier.clone(),
            slot: None,
        }
    }

    /// The aggregated map key for an entry contribution of this key's type.
    pub fn multibound_map(&self, map_key: &MapKey) -> Key {
        Key {
            type_: map_of(&map_key.key_type(), &self.type_),
            qualifier: self.qualifier.clone(),
            slot: None,
        }
    }

    pub fn readable(&self) -> String {
        let mut result = String::new();
        if let Some(ref qualifier) = self.qualifier {
            result.push_str(&format!("@{} ", qualifier.readable()));
        }
        result.push_str(&self.type_.readable());
        if let Some(ref slot) = self.slot {
            match slot {
                MultibindingSlot::Element(index) => {
                    result.push_str(&format!(" (element {})", index))
                }
                MultibindingSlot::Entry(map_key) => {
                    result.push_str(&format!(" (entry {})", map_key.readable()))
                }
            }
        }
        result
    }

    /// Identifier token usable as (part of) a generated member name. Stable
    /// for equal keys.
    pub fn identifier_string(&self) -> String {
        let mut result = String::new();
        if let Some(ref qualifier) = self.qualifier {
            result.push_str(&format!("ᑕ{}ᑐ_", qualifier.identifier_string()));
        }
        result.push_str(&self.type_.identifier_string());
        if let Some(ref slot) = self.slot {
            match slot {
                MultibindingSlot::Element(index) => result.push_str(&format!("_e{}", index)),
                MultibindingSlot::Entry(map_key) => {
                    let mut tag = map_key.readable();
                    tag.retain(|c| c.is_alphanumeric() || c == '_');
                    result.push_str(&format!("_k{}", tag));
                }
            }
        }
        result
    }

    pub fn identifier(&self) -> Ident {
        format_ident!("{}", self.identifier_string())
    }
}

pub fn vec_of(type_: &TypeData) -> TypeData {
    let mut vec_type = TypeData::new();
    vec_type.root = TypeRoot::GLOBAL;
    vec_type.path = "std::vec::Vec".to_owned();
    vec_type.args.push(type_.clone());
    vec_type
}

pub fn map_of(key_type: &TypeData, value_type: &TypeData) -> TypeData {
    let mut map_type = TypeData::new();
    map_type.root = TypeRoot::GLOBAL;
    map_type.path = "std::collections::HashMap".to_owned();
    map_type.args.push(key_type.clone());
    map_type.args.push(value_type.clone());
    map_type
}

pub fn option_of(type_: &TypeData) -> TypeData {
    let mut option_type = TypeData::new();
    option_type.root = TypeRoot::GLOBAL;
    option_type.path = "std::option::Option".to_owned();
    option_type.args.push(type_.clone());
    option_type
}

/// The `poniard::MembersInjector<T>` wrapper type for `T`.
pub fn members_injector_of(type_: &TypeData) -> TypeData {
    let mut injector_type = TypeData::new();
    injector_type.root = TypeRoot::GLOBAL;
    injector_type.path = "poniard::MembersInjector".to_owned();
    injector_type.args.push(type_.clone());
    injector_type
}

/// Unwraps one level of a framework wrapper type, e.g. the element type of a
/// vec-of-provider contribution.
pub fn unwrap_framework_type(type_: &TypeData) -> Option<&TypeData> {
    match type_.path.as_str() {
        "poniard::Provider" | "poniard::Lazy" | "poniard::Producer"
        | "poniard::MembersInjector" => type_.args.first(),
        _ => None,
    }
}
