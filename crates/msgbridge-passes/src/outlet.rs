//! Outlet field adapter: turns outlet-style fields into annotated setters.
//!
//! ```text
//! @IBOutlet UILabel title;
//!     =>
//! @IBOutlet(selector = "setTitle:")
//! private final void $field$set_title(UILabel) {
//!     this.title = @p0
//!     return
//! }
//! ```

use msgbridge_model::{
    Annotation, BodyBuilder, FieldRef, InteropAnnotation, InteropRole, MethodDecl, Modifiers, Operand,
    Param, Stmt, TypeDecl, ValueAttrs, ValueType, Visibility,
};
use tracing::debug;

use crate::context::TransformContext;
use crate::errors::{TransformErrorKind, TransformResult};
use crate::selector::capitalize;

/// Add a setter for every outlet-style field of `decl`.
pub fn adapt_outlets(ctx: &TransformContext<'_>, decl: &mut TypeDecl) -> TransformResult<()> {
    let mut setters = Vec::new();
    for field in &decl.fields {
        let annotation = match outlet_annotation(&field.annotations) {
            Some(annotation) => annotation,
            None => continue,
        };
        let field_id = decl.field_id(field);
        if annotation.role == InteropRole::IBOutletCollection && !ctx.is_ordered_collection(&field.ty) {
            return Err(TransformErrorKind::SignatureViolation {
                member: field_id,
                reason: format!(
                    "{} fields must be of type {}",
                    annotation.role,
                    ctx.names().ordered_collection
                ),
            }
            .into());
        }
        if field.modifiers.is_static {
            return Err(invalid(field_id, "outlet fields must not be static"));
        }
        if field.modifiers.is_final {
            return Err(invalid(field_id, "outlet fields must not be final"));
        }

        let property = annotation.explicit_name().unwrap_or(field.name.as_str());
        let selector = format!("set{}:", capitalize(property));
        debug!(field = %field_id, %selector, "synthesizing outlet setter");

        let attrs = ValueAttrs {
            by_val: matches!(field.ty, ValueType::Struct(_)),
            ..Default::default()
        };
        let mut b = BodyBuilder::new();
        b.push(Stmt::SetField {
            target: Some(Operand::This),
            field: FieldRef {
                owner: decl.name.clone(),
                name: field.name.clone(),
                ty: field.ty.clone(),
                is_static: false,
            },
            value: Operand::Param(0),
        });
        b.ret(None);

        let role_annotation = InteropAnnotation {
            selector: Some(selector),
            ..annotation.clone()
        };
        setters.push(
            MethodDecl::new(
                format!("$field$set_{}", field.name),
                vec![Param::with_attrs(field.ty.clone(), attrs)],
                ValueType::Void,
                Modifiers {
                    visibility: Visibility::Private,
                    is_final: true,
                    ..Default::default()
                },
            )
            .with_annotation(Annotation::Interop(role_annotation))
            .with_body(b.finish()),
        );
    }
    decl.methods.extend(setters);
    Ok(())
}

/// Collection outlets take precedence over plain outlets and inspectables.
fn outlet_annotation(annotations: &[Annotation]) -> Option<&InteropAnnotation> {
    let interop = || {
        annotations.iter().filter_map(|a| match a {
            Annotation::Interop(interop) => Some(interop),
            _ => None,
        })
    };
    [
        InteropRole::IBOutletCollection,
        InteropRole::IBOutlet,
        InteropRole::IBInspectable,
    ]
    .into_iter()
    .find_map(|role| interop().find(|a| a.role == role))
}

fn invalid(field: String, reason: &str) -> crate::errors::TransformError {
    TransformErrorKind::InvalidOutlet {
        field,
        reason: reason.to_owned(),
    }
    .into()
}
