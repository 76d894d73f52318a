//! Error types for the stub runtime

use derive_more::Display;
use msgbridge_model::TypeName;
use msgbridge_object::EmitError;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Display, Debug)]
#[display("{kind}")]
pub struct RuntimeError {
    kind: Box<RuntimeErrorKind>,
}

impl From<RuntimeErrorKind> for RuntimeError {
    fn from(kind: RuntimeErrorKind) -> Self {
        RuntimeError {
            kind: Box::new(kind),
        }
    }
}

impl From<EmitError> for RuntimeError {
    fn from(error: EmitError) -> Self {
        RuntimeErrorKind::Descriptor(error).into()
    }
}

impl RuntimeError {
    pub fn kind(&self) -> &RuntimeErrorKind {
        &self.kind
    }

    pub(crate) fn type_mismatch(expected: &str, found: &crate::Value) -> Self {
        RuntimeErrorKind::TypeMismatch {
            expected: expected.to_owned(),
            found: found.to_string(),
        }
        .into()
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            RuntimeErrorKind::Descriptor(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Display, Debug)]
pub enum RuntimeErrorKind {
    /// A synthesized body threw the configured linkage error.
    #[display("{class}: {message}")]
    Linkage { class: TypeName, message: String },

    #[display("{class}: {message}")]
    Thrown { class: TypeName, message: String },

    #[display("No method {method} in {owner} or its superclasses")]
    NoSuchMethod { owner: TypeName, method: String },

    #[display("Method {_0} has no body and no native implementation")]
    NoImplementation(String),

    #[display("-[{class} {selector}]: unrecognized selector sent to instance")]
    UnrecognizedSelector { class: TypeName, selector: String },

    #[display("Object {_0} has no native handle")]
    NoHandle(String),

    #[display("Unknown descriptor symbol {_0}")]
    UnknownSymbol(String),

    #[display("Cannot cast {value} to {ty}")]
    ClassCast { value: String, ty: String },

    #[display("Null receiver calling {_0}")]
    NullReceiver(String),

    #[display("Expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[display("Invalid operand {_0}")]
    BadOperand(String),

    #[display("Unknown type: {_0}")]
    UnknownType(TypeName),

    #[display("Descriptor publication failed: {_0}")]
    Descriptor(EmitError),
}
