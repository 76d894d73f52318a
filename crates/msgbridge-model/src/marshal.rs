//! Marshaler lookup, consumed by the bridge synthesizer and the generic dispatch optimizer.
//!
//! The marshaling subsystem itself lives elsewhere; the transform only needs to know which
//! strategy converts a given value site, and whether that strategy is one of the defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::class_path::ClassPath;
use crate::types::{TypeName, ValueAttrs, ValueType};

/// Position of a value in a native send `(receiver, selector, args...) -> ret`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SitePosition {
    Receiver,
    /// Index into the declared (non-receiver) arguments.
    Param(usize),
    Return,
}

#[derive(Clone, Copy, Debug)]
pub struct MarshalSite<'a> {
    pub position: SitePosition,
    pub ty: &'a ValueType,
    pub attrs: &'a ValueAttrs,
}

impl<'a> MarshalSite<'a> {
    pub fn new(position: SitePosition, ty: &'a ValueType, attrs: &'a ValueAttrs) -> Self {
        MarshalSite {
            position,
            ty,
            attrs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarshalStrategy {
    Primitive,
    /// Native objects through the default object marshaler.
    DefaultObject,
    /// Managed strings through the default string marshaler.
    DefaultString,
    /// Selectors, class descriptors, super references and protocol objects.
    Builtin,
    /// Structs, by value or by reference.
    Struct,
    Custom(String),
}

impl MarshalStrategy {
    pub fn is_default(&self) -> bool {
        matches!(
            self,
            MarshalStrategy::Primitive | MarshalStrategy::DefaultObject | MarshalStrategy::DefaultString
        )
    }
}

/// Pure query resolving the marshaling strategy of a value site.
pub trait MarshalerLookup {
    fn find_marshaler(&self, class_path: &ClassPath, site: &MarshalSite<'_>) -> Option<MarshalStrategy>;
}

/// Default strategies plus a table of marshalers registered per value type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultMarshalers {
    #[serde(default)]
    pub custom: BTreeMap<TypeName, String>,
}

impl DefaultMarshalers {
    pub fn with_custom(mut self, ty: impl Into<TypeName>, marshaler: impl Into<String>) -> Self {
        self.custom.insert(ty.into(), marshaler.into());
        self
    }
}

impl MarshalerLookup for DefaultMarshalers {
    fn find_marshaler(&self, class_path: &ClassPath, site: &MarshalSite<'_>) -> Option<MarshalStrategy> {
        if let Some(marshaler) = &site.attrs.marshaler {
            return Some(MarshalStrategy::Custom(marshaler.clone()));
        }
        if let Some(marshaler) = site.ty.type_name().and_then(|name| self.custom.get(name)) {
            return Some(MarshalStrategy::Custom(marshaler.clone()));
        }
        let names = class_path.runtime();
        match site.ty {
            ValueType::Void => None,
            ty if ty.is_primitive() => Some(MarshalStrategy::Primitive),
            ValueType::Struct(name) => class_path.contains(name).then_some(MarshalStrategy::Struct),
            ValueType::Object(name) if *name == names.string => Some(MarshalStrategy::DefaultString),
            ValueType::Object(name) if class_path.is_assignable(name, &names.native_object) => {
                Some(MarshalStrategy::DefaultObject)
            }
            ValueType::Object(name)
                if *name == names.selector
                    || *name == names.class
                    || *name == names.super_ref
                    || class_path.is_assignable(name, &names.object)
                    || class_path.get(name).is_some_and(|d| d.is_interface()) =>
            {
                Some(MarshalStrategy::Builtin)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(ty: ValueType, attrs: ValueAttrs) -> Option<MarshalStrategy> {
        let cp = ClassPath::default();
        DefaultMarshalers::default().find_marshaler(
            &cp,
            &MarshalSite::new(SitePosition::Param(0), &ty, &attrs),
        )
    }

    #[test]
    fn test_default_strategies() {
        assert_eq!(lookup(ValueType::Int, ValueAttrs::default()), Some(MarshalStrategy::Primitive));
        assert_eq!(
            lookup(ValueType::object("java.lang.String"), ValueAttrs::default()),
            Some(MarshalStrategy::DefaultString)
        );
        assert_eq!(
            lookup(ValueType::object("uikit.UIEvent"), ValueAttrs::default()),
            Some(MarshalStrategy::DefaultObject)
        );
        assert_eq!(
            lookup(ValueType::object("objc.Selector"), ValueAttrs::default()),
            Some(MarshalStrategy::Builtin)
        );
    }

    #[test]
    fn test_gap_for_unknown_types() {
        assert_eq!(lookup(ValueType::object("java.util.List"), ValueAttrs::default()), None);
        assert_eq!(lookup(ValueType::Array(Box::new(ValueType::Int)), ValueAttrs::default()), None);
        assert_eq!(lookup(ValueType::Struct("p.Missing".into()), ValueAttrs::default()), None);
    }

    #[test]
    fn test_explicit_marshaler_wins() {
        let attrs = ValueAttrs {
            marshaler: Some("p.ListMarshaler".into()),
            ..Default::default()
        };
        assert_eq!(
            lookup(ValueType::object("java.util.List"), attrs),
            Some(MarshalStrategy::Custom("p.ListMarshaler".into()))
        );
    }
}
