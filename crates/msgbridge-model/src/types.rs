//! Value types and per-site attributes of declared members.

use std::fmt;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Fully qualified, dot separated name of a managed type.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        TypeName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the package prefix.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit_once('.').map_or(&self.0, |(_, simple)| simple)
    }

    /// Package prefix, empty for the default package.
    pub fn package(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(package, _)| package)
    }

    /// Name usable as a native identifier (`a.b.C` -> `a_b_C`).
    pub fn mangled(&self) -> String {
        self.0.replace('.', "_")
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName(name.to_owned())
    }
}

/// Shape of a parameter, return value or field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Object(TypeName),
    /// Native struct passed by value or by reference, declared as a `struct` type.
    Struct(TypeName),
    Array(Box<ValueType>),
}

impl ValueType {
    pub fn object(name: impl Into<String>) -> Self {
        ValueType::Object(TypeName::new(name))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, ValueType::Void)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ValueType::Boolean
                | ValueType::Byte
                | ValueType::Short
                | ValueType::Char
                | ValueType::Int
                | ValueType::Long
                | ValueType::Float
                | ValueType::Double
        )
    }

    /// Values the managed collector can see (objects, arrays and struct wrappers).
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ValueType::Object(_) | ValueType::Struct(_) | ValueType::Array(_)
        )
    }

    pub fn type_name(&self) -> Option<&TypeName> {
        match self {
            ValueType::Object(name) | ValueType::Struct(name) => Some(name),
            _ => None,
        }
    }

    /// Language keyword for primitives and `void`.
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            ValueType::Void => "void",
            ValueType::Boolean => "boolean",
            ValueType::Byte => "byte",
            ValueType::Short => "short",
            ValueType::Char => "char",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Double => "double",
            _ => return None,
        })
    }

    /// Bytecode-style descriptor, used to key constructor signatures.
    pub fn descriptor(&self) -> String {
        match self {
            ValueType::Void => "V".into(),
            ValueType::Boolean => "Z".into(),
            ValueType::Byte => "B".into(),
            ValueType::Short => "S".into(),
            ValueType::Char => "C".into(),
            ValueType::Int => "I".into(),
            ValueType::Long => "J".into(),
            ValueType::Float => "F".into(),
            ValueType::Double => "D".into(),
            ValueType::Object(name) | ValueType::Struct(name) => {
                format!("L{};", name.as_str().replace('.', "/"))
            }
            ValueType::Array(element) => format!("[{}", element.descriptor()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Object(name) | ValueType::Struct(name) => write!(f, "{name}"),
            ValueType::Array(element) => write!(f, "{element}[]"),
            primitive => f.write_str(primitive.keyword().unwrap_or("?")),
        }
    }
}

/// Machine-sized native representation of a managed primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineSized {
    Float,
    SInt,
    UInt,
}

/// Marshaling attributes attached to a single value site.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueAttrs {
    /// A `long` carrying a raw native pointer.
    #[serde(default)]
    pub pointer: bool,
    #[serde(default)]
    pub machine_sized: Option<MachineSized>,
    /// A struct passed by value rather than by reference.
    #[serde(default)]
    pub by_val: bool,
    /// Explicit marshaler overriding the default strategy.
    #[serde(default)]
    pub marshaler: Option<String>,
}

impl ValueAttrs {
    pub fn pointer() -> Self {
        ValueAttrs {
            pointer: true,
            ..Default::default()
        }
    }
}

/// A declared parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub ty: ValueType,
    #[serde(default)]
    pub attrs: ValueAttrs,
}

impl Param {
    pub fn new(ty: ValueType) -> Self {
        Param {
            ty,
            attrs: ValueAttrs::default(),
        }
    }

    pub fn with_attrs(ty: ValueType, attrs: ValueAttrs) -> Self {
        Param { ty, attrs }
    }
}

impl From<ValueType> for Param {
    fn from(ty: ValueType) -> Self {
        Param::new(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_parts() {
        let name = TypeName::new("com.example.ui.MyView");
        assert_eq!(name.simple_name(), "MyView");
        assert_eq!(name.package(), "com.example.ui");
        assert_eq!(name.mangled(), "com_example_ui_MyView");

        let bare = TypeName::new("Bare");
        assert_eq!(bare.simple_name(), "Bare");
        assert_eq!(bare.package(), "");
    }

    #[test]
    fn test_descriptor() {
        assert_eq!(ValueType::Int.descriptor(), "I");
        assert_eq!(ValueType::object("java.lang.String").descriptor(), "Ljava/lang/String;");
        assert_eq!(
            ValueType::Array(Box::new(ValueType::Long)).descriptor(),
            "[J"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueType::Boolean.to_string(), "boolean");
        assert_eq!(ValueType::object("a.B").to_string(), "a.B");
        assert_eq!(ValueType::Array(Box::new(ValueType::Byte)).to_string(), "byte[]");
    }

    #[test]
    fn test_value_type_json() {
        let ty: ValueType = serde_json::from_str(r#"{"object":"a.B"}"#).unwrap();
        assert_eq!(ty, ValueType::object("a.B"));
        let ty: ValueType = serde_json::from_str(r#""long""#).unwrap();
        assert_eq!(ty, ValueType::Long);
    }
}
