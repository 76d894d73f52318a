//! Error types for descriptor emission

use derive_more::Display;

pub type EmitResult<T> = Result<T, EmitError>;

#[derive(Display, Debug)]
#[display("{kind}")]
pub struct EmitError {
    kind: Box<EmitErrorKind>,
}

impl From<EmitErrorKind> for EmitError {
    fn from(kind: EmitErrorKind) -> Self {
        EmitError {
            kind: Box::new(kind),
        }
    }
}

impl From<object::write::Error> for EmitError {
    fn from(error: object::write::Error) -> Self {
        EmitErrorKind::Object(error).into()
    }
}

impl EmitError {
    pub fn kind(&self) -> &EmitErrorKind {
        &self.kind
    }
}

impl std::error::Error for EmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            EmitErrorKind::Object(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Display, Debug)]
pub enum EmitErrorKind {
    /// Internal error: a descriptor copy between buffers of different sizes.
    #[display("Descriptor layout {layout} expects {expected} bytes, found {found}")]
    LayoutMismatch {
        layout: &'static str,
        expected: usize,
        found: usize,
    },

    #[display("Unsupported target for descriptor emission: {_0}")]
    UnsupportedTarget(String),

    #[display("Object generation failed: {_0}")]
    Object(object::write::Error),
}
