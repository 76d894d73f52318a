//! Transform pipeline for a class path.
//!
//! ```text
//! ClassPathSource
//!     │
//!     ▼
//! transform_class_path ─► TransformOutput (transformed types, descriptor exports, selectors)
//!     │
//!     └─► [--emit-object] ─► emit_descriptors ─► relocatable object with descriptor storage
//! ```
//!
//! Types are transformed one at a time in name order. A type whose transform fails keeps its
//! original declaration; the failure is reported as a [`Diagnostic`] through the salsa
//! accumulator and the remaining types are still transformed.

use std::collections::BTreeMap;

use msgbridge_core::{CompilationPhase, Diagnostic, DiagnosticSeverity, TargetInfo};
use msgbridge_model::{ClassPath, DescriptorExport, TypeName};
use msgbridge_object::{CLASS_DESCRIPTOR_V1, emit_descriptors};
use msgbridge_passes::{TransformContext, transform_type};
use salsa::Accumulator;
use tracing::{debug, warn};

use crate::database::ClassPathSource;

/// Result of transforming a whole class path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformOutput {
    /// The input class path with every transformed type replaced.
    pub class_path: ClassPath,
    /// Descriptor symbols requested by custom classes, in type order.
    pub exports: Vec<DescriptorExport>,
    /// Selectors registered by each transformed type.
    pub selectors: BTreeMap<TypeName, Vec<String>>,
    /// Types that failed to transform.
    pub failed: Vec<TypeName>,
}

impl TransformOutput {
    pub fn transformed(&self) -> impl Iterator<Item = &TypeName> {
        self.selectors.keys()
    }
}

#[salsa::tracked(returns(ref))]
pub fn transform_class_path(db: &dyn salsa::Database, source: ClassPathSource) -> TransformOutput {
    let input = source.class_path(db);
    let config = source.config(db);
    let ctx = TransformContext::new(input, source.marshalers(db), &config);

    let mut output = TransformOutput {
        class_path: input.clone(),
        exports: Vec::new(),
        selectors: BTreeMap::new(),
        failed: Vec::new(),
    };
    for name in input.type_names() {
        match transform_type(&ctx, name) {
            Ok(Some(transformed)) => {
                output.exports.extend(transformed.export);
                output.selectors.insert(name.clone(), transformed.selectors);
                output.class_path.insert(transformed.decl);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%name, "{err}");
                Diagnostic {
                    message: err.to_string(),
                    location: err.location(),
                    severity: DiagnosticSeverity::Error,
                    phase: err.phase(),
                }
                .accumulate(db);
                output.failed.push(name.clone());
            }
        }
    }
    debug!(
        transformed = output.selectors.len(),
        failed = output.failed.len(),
        exports = output.exports.len(),
        "transformed class path"
    );
    output
}

pub struct TransformReport<'db> {
    pub output: &'db TransformOutput,
    /// Diagnostics collected during the transform.
    pub diagnostics: Vec<Diagnostic>,
}

impl TransformReport<'_> {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

pub fn transform_with_diagnostics<'db>(db: &'db dyn salsa::Database, source: ClassPathSource) -> TransformReport<'db> {
    let output = transform_class_path(db, source);
    let diagnostics = transform_class_path::accumulated::<Diagnostic>(db, source)
        .into_iter()
        .cloned()
        .collect();
    TransformReport {
        output,
        diagnostics,
    }
}

/// Object file defining the descriptor storage of every export.
pub fn emit_object(output: &TransformOutput, target: &TargetInfo, framework: bool) -> Result<Vec<u8>, Diagnostic> {
    emit_descriptors(target, &CLASS_DESCRIPTOR_V1, &output.exports, framework)
        .map_err(|err| Diagnostic::error(err.to_string(), target.triple.to_string(), CompilationPhase::Emission))
}
