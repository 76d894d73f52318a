//! A stub of the foreign object runtime that executes transformed class paths.
//!
//! Native classes are described by [`NativeImp`] tables registered per selector. Managed objects
//! are created and run by a small interpreter over the body IR, so outbound sends, inbound
//! callbacks, constructors and descriptor publication can be observed through the call log,
//! the peer table and the exported symbols.

mod interp;

pub mod errors;
pub mod runtime;
pub mod value;

pub use errors::{RuntimeError, RuntimeErrorKind, RuntimeResult};
pub use runtime::{NativeImp, Runtime};
pub use value::{NativeCall, NativeReceiver, ObjectId, StrongRefUpdate, Value};
