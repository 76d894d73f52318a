//! Callback synthesis: inbound `$cb$<sel>` entry points called by the foreign runtime.
//!
//! The runtime has already dispatched on the selector, so the generated body calls the concrete
//! member directly:
//!
//! ```text
//! private static void $cb$draw(app.MyView, objc.Selector) {
//!     special @p0 app.MyView::draw()
//!     return
//! }
//! ```

use std::collections::HashSet;

use msgbridge_model::{
    Annotation, BodyBuilder, Expr, InvokeKind, MethodDecl, MethodRef, Modifiers, Operand, Param,
    TypeDecl, TypeName, ValueType, Visibility,
};
use tracing::debug;

use crate::context::{BoundCallback, CallbackSlot, TransformContext, TypeState};
use crate::encoding::encode_method;
use crate::errors::{TransformErrorKind, TransformResult};
use crate::selector::{is_overridable, mangle};

/// Name of the callback bound to `selector`.
pub fn callback_name(selector: &str) -> String {
    format!("$cb${}", mangle(selector))
}

/// Whether `sub` (declared in `sub_owner`) overrides `sup` (declared in `sup_owner`).
/// Signatures are assumed equal.
fn overrides(sub_owner: &TypeName, sup_owner: &TypeName, sup: &MethodDecl) -> bool {
    if sup.modifiers.is_private() || sup.modifiers.is_static {
        return false;
    }
    match sup.modifiers.visibility {
        Visibility::Package => sub_owner.package() == sup_owner.package(),
        _ => true,
    }
}

/// Ancestor members `method` overrides, nearest superclass first, then the interface DAG.
///
/// A superclass match ends the search. Interface matches are all returned since only some of
/// them may carry an interop role.
pub fn find_overridden_methods<'a>(
    ctx: &TransformContext<'a>,
    decl: &TypeDecl,
    method: &MethodDecl,
) -> Vec<(&'a TypeDecl, &'a MethodDecl)> {
    let root = &ctx.names().object;
    let params = method.param_types();
    for ancestor in ctx.class_path.superclasses(&decl.name) {
        if &ancestor.name == root {
            break;
        }
        if let Some(m) = ancestor.find_method(&method.name, &params, &method.ret) {
            if overrides(&decl.name, &ancestor.name, m) && !m.is_not_implemented() {
                return vec![(ancestor, m)];
            }
        }
    }

    let mut candidates = Vec::new();
    let mut visited = HashSet::new();
    if let Some(start) = ctx.class_path.get(&decl.name) {
        collect_interface_methods(ctx, start, method, &params, &mut visited, &mut candidates);
    }
    candidates
}

fn collect_interface_methods<'a>(
    ctx: &TransformContext<'a>,
    ty: &'a TypeDecl,
    method: &MethodDecl,
    params: &[ValueType],
    visited: &mut HashSet<TypeName>,
    out: &mut Vec<(&'a TypeDecl, &'a MethodDecl)>,
) {
    if !visited.insert(ty.name.clone()) {
        return;
    }
    if ty.is_interface() {
        if let Some(m) = ty.find_method(&method.name, params, &method.ret) {
            out.push((ty, m));
        }
    }
    for interface in &ty.interfaces {
        if let Some(next) = ctx.class_path.get(interface) {
            collect_interface_methods(ctx, next, method, params, visited, out);
        }
    }
    if !ty.is_interface() {
        let parent = ty
            .superclass
            .as_ref()
            .filter(|s| **s != ctx.names().object)
            .and_then(|s| ctx.class_path.get(s));
        if let Some(parent) = parent {
            collect_interface_methods(ctx, parent, method, params, visited, out);
        }
    }
}

/// Add `$cb$<selector>` forwarding to `method`, using `annotated`'s annotations and value attributes.
pub fn create_callback(
    ctx: &TransformContext<'_>,
    state: &mut TypeState,
    decl: &mut TypeDecl,
    method: &MethodDecl,
    annotated: &MethodDecl,
    selector: &str,
) -> TransformResult<()> {
    let id = decl.method_id(method);
    let is_static = method.modifiers.is_static;
    let overridable = is_overridable(decl, method);
    let slot = CallbackSlot::new(selector, is_static);
    if let Some(bound) = state.callbacks.get(&slot) {
        match (&bound.replaceable, overridable) {
            (_, false) => {
                debug!(member = %id, %selector, bound = %bound.member, "selector already has a callback");
                return Ok(());
            }
            (None, true) => {
                return Err(TransformErrorKind::SelectorCollision {
                    owner: decl.name.clone(),
                    selector: selector.to_owned(),
                    first: bound.member.to_string(),
                    second: id.to_string(),
                }
                .into());
            }
            (Some(replaced), true) => {
                debug!(member = %id, %selector, replaced = %bound.member, "overridable member takes the callback");
                decl.methods
                    .retain(|m| !(m.has_annotation(&Annotation::Callback) && m.sub_signature() == *replaced));
            }
        }
    }

    let receiver_type = ctx.receiver_type(decl);
    let receiver = if is_static {
        ctx.class_type()
    } else {
        receiver_type.clone()
    };
    let mut params = vec![Param::new(receiver), Param::new(ctx.selector_type())];
    for (index, param) in method.params.iter().enumerate() {
        let attrs = annotated
            .params
            .get(index)
            .map_or_else(|| param.attrs.clone(), |p| p.attrs.clone());
        params.push(Param::with_attrs(param.ty.clone(), attrs));
    }

    let mut callback = MethodDecl::new(
        callback_name(selector),
        params,
        method.ret.clone(),
        Modifiers::private_static(),
    );
    callback.ret_attrs = annotated.ret_attrs.clone();
    callback.annotations = copied_annotations(annotated);
    callback.annotations.push(Annotation::Callback);
    callback.annotations.push(Annotation::BindSelector(selector.to_owned()));

    if annotated.type_encoding().is_none() && (ctx.is_custom_class(decl) || decl.is_protocol_proxy()) {
        let encoding = encode_method(ctx.class_path, ctx.config.pointer_width, &callback).map_err(
            |reason| TransformErrorKind::AbiEncodingFailure {
                member: id.to_string(),
                reason,
            },
        )?;
        callback.annotations.push(Annotation::TypeEncoding(encoding));
    }

    let interface_receiver = !is_static
        && receiver_type
            .type_name()
            .and_then(|name| ctx.class_path.get(name))
            .is_some_and(TypeDecl::is_interface);
    let owner = match (&receiver_type, interface_receiver) {
        (ValueType::Object(interface), true) => interface.clone(),
        _ => decl.name.clone(),
    };
    let target = MethodRef::new(owner, method.name.clone(), method.param_types(), method.ret.clone());
    let args: Vec<_> = (0..method.params.len()).map(|i| Operand::Param(i + 2)).collect();
    let call = if is_static {
        Expr::invoke_static(target, args)
    } else if interface_receiver {
        Expr::invoke(InvokeKind::Interface, target, Operand::Param(0), args)
    } else {
        Expr::invoke(InvokeKind::Special, target, Operand::Param(0), args)
    };

    let mut b = BodyBuilder::new();
    if method.ret.is_void() {
        b.eval(call);
        b.ret(None);
    } else {
        let ret = b.local("ret", method.ret.clone());
        b.assign(ret, call);
        b.ret(Some(ret.into()));
    }
    callback.body = Some(b.finish());

    debug!(member = %id, callback = %callback.name, "synthesized callback");
    state.callbacks.insert(
        slot,
        BoundCallback {
            member: id,
            replaceable: (!overridable).then(|| callback.sub_signature()),
        },
    );
    decl.methods.push(callback);
    Ok(())
}

/// Declared annotations carried over to synthesized trampolines.
pub(crate) fn copied_annotations(from: &MethodDecl) -> Vec<Annotation> {
    from.annotations
        .iter()
        .filter(|a| {
            matches!(
                a,
                Annotation::Interop(_) | Annotation::TypeEncoding(_) | Annotation::Marshaler(_)
            )
        })
        .cloned()
        .collect()
}
