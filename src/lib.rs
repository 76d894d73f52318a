pub mod database;
pub mod loader;
pub mod pipeline;

pub use database::{BridgeDatabaseImpl, ClassPathSource};
pub use loader::{LoadError, Project, load_project, parse_project};
pub use pipeline::{TransformOutput, TransformReport, emit_object, transform_class_path, transform_with_diagnostics};
