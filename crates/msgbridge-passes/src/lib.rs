//! Member transformation passes.
//!
//! [`transform_type`] rewrites one peer or extension type of a [`ClassPath`](msgbridge_model::ClassPath):
//! native interop members become outbound message sends, custom-class members gain inbound
//! callbacks, constructors become reachable through init selectors, and the static initializer
//! registers everything with the runtime.

pub mod bridge;
pub mod callback;
pub mod classify;
pub mod config;
pub mod constructor;
pub mod context;
pub mod encoding;
pub mod errors;
pub mod generic_dispatch;
pub mod outlet;
pub mod registration;
pub mod selector;
pub mod transform;

pub use classify::{classify_method, Accessor, Classified};
pub use config::BridgeConfig;
pub use context::{TransformContext, TypeState};
pub use encoding::encode_method;
pub use errors::{TransformError, TransformErrorKind, TransformResult};
pub use generic_dispatch::INSTANCE_SUFFIX;
pub use selector::{mangle, selector_field_name, SelectorTable};
pub use transform::{transform_type, TransformedType};
