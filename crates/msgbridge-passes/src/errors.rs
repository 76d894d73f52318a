//! Error types for the member transform

use derive_more::Display;
use msgbridge_core::CompilationPhase;
use msgbridge_model::{InteropRole, MemberId, TypeName, ValueType};

pub type TransformResult<T> = Result<T, TransformError>;

#[derive(Display, Debug)]
#[display("{kind}")]
pub struct TransformError {
    kind: Box<TransformErrorKind>,
}

impl From<TransformErrorKind> for TransformError {
    fn from(kind: TransformErrorKind) -> Self {
        TransformError {
            kind: Box::new(kind),
        }
    }
}

impl std::error::Error for TransformError {}

impl TransformError {
    pub fn kind(&self) -> &TransformErrorKind {
        &self.kind
    }

    pub(crate) fn signature(member: &MemberId, reason: impl Into<String>) -> Self {
        TransformErrorKind::SignatureViolation {
            member: member.to_string(),
            reason: reason.into(),
        }
        .into()
    }

    pub(crate) fn marshaling_gap(member: &MemberId, site: impl Into<String>, ty: &ValueType) -> Self {
        TransformErrorKind::MarshalingGap {
            member: member.to_string(),
            site: site.into(),
            ty: ty.to_string(),
        }
        .into()
    }

    /// Stage the error was raised in.
    pub fn phase(&self) -> CompilationPhase {
        match &*self.kind {
            TransformErrorKind::SignatureViolation { .. } => CompilationPhase::Classification,
            TransformErrorKind::InvalidOutlet { .. } => CompilationPhase::OutletAdaptation,
            TransformErrorKind::SelectorCollision { .. }
            | TransformErrorKind::UnresolvableConvention { .. } => CompilationPhase::SelectorResolution,
            TransformErrorKind::MarshalingGap { .. }
            | TransformErrorKind::MissingStrongRefGetter { .. } => CompilationPhase::BridgeSynthesis,
            TransformErrorKind::AbiEncodingFailure { .. }
            | TransformErrorKind::ConstructorCollision { .. } => CompilationPhase::CallbackSynthesis,
            TransformErrorKind::UnknownType(_) => CompilationPhase::Registration,
        }
    }

    /// Offending member or type, as named in the message.
    pub fn location(&self) -> String {
        match &*self.kind {
            TransformErrorKind::SignatureViolation { member, .. }
            | TransformErrorKind::UnresolvableConvention { member, .. }
            | TransformErrorKind::MarshalingGap { member, .. }
            | TransformErrorKind::AbiEncodingFailure { member, .. }
            | TransformErrorKind::MissingStrongRefGetter { member } => member.clone(),
            TransformErrorKind::SelectorCollision { second, .. } => second.clone(),
            TransformErrorKind::InvalidOutlet { field, .. } => field.clone(),
            TransformErrorKind::ConstructorCollision { owner, .. } => owner.to_string(),
            TransformErrorKind::UnknownType(name) => name.to_string(),
        }
    }
}

#[derive(Display, Debug, Clone, PartialEq, Eq)]
pub enum TransformErrorKind {
    #[display("Unsupported signature for {member}: {reason}")]
    SignatureViolation { member: String, reason: String },

    #[display(
        "Found multiple overridable methods with the selector '{selector}' in {owner}: {first} and {second}"
    )]
    SelectorCollision {
        owner: TypeName,
        selector: String,
        first: String,
        second: String,
    },

    #[display(
        "Invalid {role} method name {member}: methods without an explicit selector must follow the bean property naming convention"
    )]
    UnresolvableConvention { member: String, role: InteropRole },

    #[display("Cannot bridge {member}: no marshaler for {site} of type {ty}")]
    MarshalingGap {
        member: String,
        site: String,
        ty: String,
    },

    #[display("Failed to determine method type encoding for {member}: {reason}")]
    AbiEncodingFailure { member: String, reason: String },

    #[display("Invalid outlet field {field}: {reason}")]
    InvalidOutlet { field: String, reason: String },

    #[display(
        "Failed to determine the getter corresponding to the strong ref setter {member}: the getter must name the property explicitly or follow the bean getter naming convention"
    )]
    MissingStrongRefGetter { member: String },

    #[display(
        "Constructors {first} and {second} of {owner} both map to the init selector '{selector}'"
    )]
    ConstructorCollision {
        owner: TypeName,
        selector: String,
        first: String,
        second: String,
    },

    #[display("Unknown type: {_0}")]
    UnknownType(TypeName),
}
