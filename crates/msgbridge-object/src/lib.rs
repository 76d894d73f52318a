//! Descriptor layouts and object emission for published custom classes.

pub mod emit;
pub mod errors;
pub mod layout;

pub use emit::{emit_descriptors, framework_preload_blob, FRAMEWORK_PRELOAD_SYMBOL};
pub use errors::{EmitError, EmitErrorKind, EmitResult};
pub use layout::{DescriptorLayout, CLASS_DESCRIPTOR_V1};
