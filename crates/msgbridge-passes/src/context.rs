//! Shared state of a transform run and per-type bookkeeping.

use std::collections::{BTreeMap, HashSet};

use msgbridge_model::{
    ClassPath, MarshalSite, MarshalStrategy, MarshalerLookup, MemberId, RuntimeNames, SubSignature,
    TypeDecl, TypeName, ValueType,
};

use crate::config::BridgeConfig;
use crate::selector::SelectorTable;

/// Read-only inputs shared by every type of a run.
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
    pub class_path: &'a ClassPath,
    pub marshalers: &'a dyn MarshalerLookup,
    pub config: &'a BridgeConfig,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        class_path: &'a ClassPath,
        marshalers: &'a dyn MarshalerLookup,
        config: &'a BridgeConfig,
    ) -> Self {
        TransformContext {
            class_path,
            marshalers,
            config,
        }
    }

    pub fn names(&self) -> &'a RuntimeNames {
        self.class_path.runtime()
    }

    pub fn find_marshaler(&self, site: &MarshalSite<'_>) -> Option<MarshalStrategy> {
        self.marshalers.find_marshaler(self.class_path, site)
    }

    /// Peer types of the foreign runtime.
    pub fn is_objc_object(&self, decl: &TypeDecl) -> bool {
        self.class_path.is_assignable(&decl.name, &self.names().object)
    }

    /// Extension (category) types: members take their receiver as the first parameter.
    pub fn is_extension(&self, decl: &TypeDecl) -> bool {
        self.class_path.is_assignable(&decl.name, &self.names().extensions)
    }

    /// Managed subclasses of a native object that the runtime must learn about.
    pub fn is_custom_class(&self, decl: &TypeDecl) -> bool {
        !decl.is_native_class()
            && !decl.is_protocol_proxy()
            && self.class_path.is_assignable(&decl.name, &self.names().native_object)
    }

    pub fn is_app_delegate(&self, decl: &TypeDecl) -> bool {
        self.class_path.is_assignable(&decl.name, &self.names().app_delegate)
    }

    pub fn is_native_object(&self, ty: &ValueType) -> bool {
        self.class_path.value_assignable(ty, &self.names().native_object)
    }

    pub fn is_event(&self, ty: &ValueType) -> bool {
        self.class_path.value_assignable(ty, &self.names().event)
    }

    pub fn is_ordered_collection(&self, ty: &ValueType) -> bool {
        self.class_path.value_assignable(ty, &self.names().ordered_collection)
    }

    pub fn is_selector(&self, ty: &ValueType) -> bool {
        self.class_path.value_assignable(ty, &self.names().selector)
    }

    pub fn is_string(&self, ty: &ValueType) -> bool {
        matches!(ty, ValueType::Object(name) if *name == self.names().string)
    }

    /// Receiver type of callbacks: protocol proxies are called through their protocol.
    pub fn receiver_type(&self, decl: &TypeDecl) -> ValueType {
        match decl.interfaces.first() {
            Some(protocol) if decl.is_protocol_proxy() => ValueType::Object(protocol.clone()),
            _ => ValueType::Object(decl.name.clone()),
        }
    }

    pub fn selector_type(&self) -> ValueType {
        ValueType::Object(self.names().selector.clone())
    }

    pub fn class_type(&self) -> ValueType {
        ValueType::Object(self.names().class.clone())
    }

    pub fn super_type(&self) -> ValueType {
        ValueType::Object(self.names().super_ref.clone())
    }

    pub fn require_type(&self, name: &TypeName) -> crate::errors::TransformResult<&'a TypeDecl> {
        self.class_path
            .get(name)
            .ok_or_else(|| crate::errors::TransformErrorKind::UnknownType(name.clone()).into())
    }
}

/// Selector namespace of a callback: class and instance methods may share a selector.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackSlot {
    pub selector: String,
    pub is_static: bool,
}

impl CallbackSlot {
    pub fn new(selector: &str, is_static: bool) -> Self {
        CallbackSlot {
            selector: selector.to_owned(),
            is_static,
        }
    }
}

/// The member a callback slot is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundCallback {
    pub member: MemberId,
    /// Signature of a callback that an overridable member may still take the slot from.
    /// `None` once an overridable member or a constructor owns the slot.
    pub replaceable: Option<SubSignature>,
}

/// Bookkeeping of one type's transform.
#[derive(Debug, Default)]
pub struct TypeState {
    pub selectors: SelectorTable,
    /// Selectors that already have a `$cb$` entry point, with the member behind it.
    pub callbacks: BTreeMap<CallbackSlot, BoundCallback>,
    /// Constructor signatures already given (or denied) a callback.
    pub initializers: HashSet<SubSignature>,
    /// Init selectors claimed by constructor callbacks.
    pub init_selectors: BTreeMap<String, MemberId>,
}
