//! Values flowing through interpreted bodies and the native side of the stub runtime.

use derive_more::Display;
use msgbridge_model::TypeName;

/// Identity of a managed object allocated by the interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("#{_0}")]
pub struct ObjectId(pub u64);

#[derive(Clone, Debug, PartialEq, Display)]
pub enum Value {
    #[display("null")]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    #[display("{_0:?}")]
    Str(String),
    Object(ObjectId),
    /// Receiver of an ancestor-aware send.
    #[display("super {_0}")]
    Super(ObjectId),
    #[display("@selector({_0})")]
    Selector(String),
    /// Class constant.
    #[display("class {_0}")]
    Class(TypeName),
    /// The runtime's descriptor of a class.
    #[display("descriptor {_0}")]
    Descriptor(TypeName),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }
}

/// Receiver of a native send as recorded in the call log.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum NativeReceiver {
    #[display("handle {_0:#x}")]
    Instance(u64),
    #[display("class {_0}")]
    Class(TypeName),
}

/// One message delivered to the native side.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeCall {
    /// Runtime class of the receiver.
    pub class: TypeName,
    pub selector: String,
    pub receiver: NativeReceiver,
    pub args: Vec<Value>,
    pub via_super: bool,
}

/// A strong-reference bookkeeping call made by a strong-ref setter.
#[derive(Clone, Debug, PartialEq)]
pub struct StrongRefUpdate {
    pub owner: Value,
    pub before: Value,
    pub after: Value,
    pub extension: bool,
}
