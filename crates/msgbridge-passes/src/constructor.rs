//! Constructor callbacks: let native code instantiate managed peers through an init selector.
//!
//! Every callback follows the same shape. A peer already linked to the handle short-circuits,
//! otherwise the managed object is allocated, linked, constructed and retained:
//!
//! ```text
//! $self = @p0
//! $peer = runtime.get_peer_object($self)
//! $this = (app.MyView) $peer
//! if $this == null {
//!     $this = new app.MyView
//!     runtime.set_handle($this, $self)
//!     special $this app.MyView::<init>(@p2)
//!     runtime.after_marshaled($this, 0)
//!     runtime.retain_from_callback($self)
//!     $self = runtime.get_handle($this)
//! }
//! return $self
//! ```

use msgbridge_model::{
    Annotation, BodyBuilder, Condition, Const, Expr, InteropAnnotation, InteropRole, InvokeKind,
    LocalId, MemberId, MethodDecl, MethodRef, Modifiers, Operand, Param, RuntimeCall, Stmt, TypeDecl,
    TypeName, ValueAttrs, ValueType, CONSTRUCTOR,
};
use tracing::{debug, warn};

use crate::callback::{callback_name, copied_annotations};
use crate::context::{BoundCallback, CallbackSlot, TransformContext, TypeState};
use crate::errors::{TransformErrorKind, TransformResult};

/// Give a declared constructor a callback when it, or the ancestor constructor it mirrors,
/// names an init selector.
pub fn transform_constructor(
    ctx: &TransformContext<'_>,
    state: &mut TypeState,
    decl: &mut TypeDecl,
    ctor: &MethodDecl,
) -> TransformResult<()> {
    state.initializers.insert(ctor.sub_signature());
    let annotation = method_annotation(ctor).or_else(|| inherited_annotation(ctx, &decl.name, ctor));
    let Some(selector) = init_selector(decl, ctor, annotation.as_ref()) else {
        return Ok(());
    };

    let id = decl.method_id(ctor);
    claim_init_selector(state, decl, &selector, id)?;

    let mut callback = init_callback(ctx, ctor, &selector);
    let mut b = BodyBuilder::new();
    let (handle, this) = peer_lookup(&mut b, decl);
    let create = b.block(|b| {
        allocate(b, decl, handle, this);
        b.eval(Expr::invoke(
            InvokeKind::Special,
            MethodRef::new(decl.name.clone(), CONSTRUCTOR, ctor.param_types(), ValueType::Void),
            Operand::Local(this),
            forwarded_args(ctor),
        ));
        post_init(b, handle, this);
    });
    finish_lookup(&mut b, this, handle, create);
    callback.body = Some(b.finish());

    debug!(owner = %decl.name, %selector, "synthesized constructor callback");
    decl.methods.push(callback);
    Ok(())
}

/// Give every annotated ancestor constructor not mirrored by a declared one a callback.
///
/// With a default constructor and a matching `init` method the callback constructs the peer
/// through them; otherwise it raises a linkage error when called.
pub fn transform_parent_constructors(
    ctx: &TransformContext<'_>,
    state: &mut TypeState,
    decl: &mut TypeDecl,
) -> TransformResult<()> {
    let root = &ctx.names().object;
    let has_default = decl.find_method(CONSTRUCTOR, &[], &ValueType::Void).is_some();

    for ancestor in ctx.class_path.superclasses(&decl.name) {
        if &ancestor.name == root {
            break;
        }
        for ctor in ancestor.constructors() {
            if !state.initializers.insert(ctor.sub_signature()) {
                continue;
            }
            let annotation =
                method_annotation(ctor).or_else(|| inherited_annotation(ctx, &ancestor.name, ctor));
            let Some(selector) = init_selector(ancestor, ctor, annotation.as_ref()) else {
                continue;
            };
            claim_init_selector(state, decl, &selector, ancestor.method_id(ctor))?;

            let init = ctx
                .class_path
                .find_method_in_hierarchy(&decl.name, "init", &ctor.param_types(), &ValueType::Long);
            let callback = match init {
                Some((owner, init)) if has_default => {
                    let init = MethodRef::new(owner.name.clone(), init.name.clone(), init.param_types(), ValueType::Long);
                    parent_callback(ctx, decl, ctor, &selector, init)
                }
                _ => unsupported_callback(ctx, decl, ctor, &selector),
            };
            decl.methods.push(callback);
        }
    }
    Ok(())
}

fn method_annotation(ctor: &MethodDecl) -> Option<InteropAnnotation> {
    ctor.interop()
        .into_iter()
        .find(|a| a.role == InteropRole::Method)
        .cloned()
}

/// `@Method` of the nearest same-signature constructor above `start`.
fn inherited_annotation(
    ctx: &TransformContext<'_>,
    start: &TypeName,
    ctor: &MethodDecl,
) -> Option<InteropAnnotation> {
    let root = &ctx.names().object;
    let params = ctor.param_types();
    ctx.class_path
        .superclasses(start)
        .take_while(|ancestor| &ancestor.name != root)
        .filter_map(|ancestor| ancestor.find_method(CONSTRUCTOR, &params, &ctor.ret))
        .find_map(method_annotation)
}

fn init_selector(
    owner: &TypeDecl,
    ctor: &MethodDecl,
    annotation: Option<&InteropAnnotation>,
) -> Option<String> {
    let annotation = annotation?;
    match annotation.explicit_selector() {
        Some(selector) => Some(selector.to_owned()),
        None => {
            warn!(member = %owner.method_id(ctor), "constructor @Method without a selector is ignored");
            None
        }
    }
}

/// One constructor signature per init selector. Only a callback of a non-overridable member may
/// give way to it.
fn claim_init_selector(
    state: &mut TypeState,
    decl: &mut TypeDecl,
    selector: &str,
    id: MemberId,
) -> TransformResult<()> {
    if let Some(first) = state.init_selectors.get(selector) {
        return Err(TransformErrorKind::ConstructorCollision {
            owner: decl.name.clone(),
            selector: selector.to_owned(),
            first: first.to_string(),
            second: id.to_string(),
        }
        .into());
    }
    let slot = CallbackSlot::new(selector, false);
    if let Some(BoundCallback {
        replaceable: Some(replaced),
        ..
    }) = state.callbacks.get(&slot)
    {
        decl.methods
            .retain(|m| !(m.has_annotation(&Annotation::Callback) && m.sub_signature() == *replaced));
    } else if let Some(bound) = state.callbacks.get(&slot) {
        return Err(TransformErrorKind::SelectorCollision {
            owner: decl.name.clone(),
            selector: selector.to_owned(),
            first: bound.member.to_string(),
            second: id.to_string(),
        }
        .into());
    }
    state.init_selectors.insert(selector.to_owned(), id.clone());
    state.callbacks.insert(
        slot,
        BoundCallback {
            member: id,
            replaceable: None,
        },
    );
    Ok(())
}

/// `long $cb$<sel>(long, Selector, ctor params...)` without a body.
fn init_callback(ctx: &TransformContext<'_>, ctor: &MethodDecl, selector: &str) -> MethodDecl {
    let mut params = vec![
        Param::with_attrs(ValueType::Long, ValueAttrs::pointer()),
        Param::new(ctx.selector_type()),
    ];
    params.extend(ctor.params.iter().cloned());
    let mut callback = MethodDecl::new(callback_name(selector), params, ValueType::Long, Modifiers::private_static());
    callback.ret_attrs = ValueAttrs::pointer();
    callback.annotations = copied_annotations(ctor);
    callback.annotations.push(Annotation::Callback);
    callback.annotations.push(Annotation::BindSelector(selector.to_owned()));
    callback
}

fn forwarded_args(ctor: &MethodDecl) -> Vec<Operand> {
    (0..ctor.params.len()).map(|i| Operand::Param(i + 2)).collect()
}

/// `$self`, `$peer` and `$this`: the handle and the peer already linked to it, if any.
fn peer_lookup(b: &mut BodyBuilder, decl: &TypeDecl) -> (LocalId, LocalId) {
    let this_ty = ValueType::Object(decl.name.clone());
    let handle = b.local("self", ValueType::Long);
    let peer = b.local("peer", this_ty.clone());
    let this = b.local("this", this_ty.clone());
    b.assign(handle, Expr::Use(Operand::Param(0)));
    b.assign(peer, Expr::runtime(RuntimeCall::GetPeerObject, vec![Operand::Local(handle)]));
    b.assign(
        this,
        Expr::Cast {
            value: Operand::Local(peer),
            ty: this_ty,
        },
    );
    (handle, this)
}

fn finish_lookup(b: &mut BodyBuilder, this: LocalId, handle: LocalId, missing: Vec<Stmt>) {
    b.push(Stmt::If {
        cond: Condition::IsNull(Operand::Local(this)),
        then_branch: missing,
        else_branch: Vec::new(),
    });
    b.ret(Some(Operand::Local(handle)));
}

fn allocate(b: &mut BodyBuilder, decl: &TypeDecl, handle: LocalId, this: LocalId) {
    b.assign(this, Expr::New(decl.name.clone()));
    b.eval(Expr::runtime(
        RuntimeCall::SetHandle,
        vec![Operand::Local(this), Operand::Local(handle)],
    ));
}

fn post_init(b: &mut BodyBuilder, handle: LocalId, this: LocalId) {
    b.eval(Expr::runtime(
        RuntimeCall::AfterMarshaled,
        vec![Operand::Local(this), Operand::Const(Const::Int(0))],
    ));
    b.eval(Expr::runtime(RuntimeCall::RetainFromCallback, vec![Operand::Local(handle)]));
    b.assign(handle, Expr::runtime(RuntimeCall::GetHandle, vec![Operand::Local(this)]));
}

fn parent_callback(
    ctx: &TransformContext<'_>,
    decl: &TypeDecl,
    ctor: &MethodDecl,
    selector: &str,
    init: MethodRef,
) -> MethodDecl {
    let mut callback = init_callback(ctx, ctor, selector);
    let skip_init = ctx.is_native_object(&ValueType::Object(decl.name.clone()));
    let mut b = BodyBuilder::new();
    let (handle, this) = peer_lookup(&mut b, decl);
    let create = b.block(|b| {
        allocate(b, decl, handle, this);
        if skip_init {
            b.eval(Expr::runtime(RuntimeCall::ForceSkipInit, vec![Operand::Local(this)]));
        }
        b.eval(Expr::invoke(
            InvokeKind::Special,
            MethodRef::new(decl.name.clone(), CONSTRUCTOR, Vec::new(), ValueType::Void),
            Operand::Local(this),
            Vec::new(),
        ));
        b.assign(
            handle,
            Expr::invoke(InvokeKind::Special, init, Operand::Local(this), forwarded_args(ctor)),
        );
        b.eval(Expr::runtime(
            RuntimeCall::InitObject,
            vec![Operand::Local(this), Operand::Local(handle)],
        ));
        post_init(b, handle, this);
    });
    finish_lookup(&mut b, this, handle, create);
    callback.body = Some(b.finish());
    debug!(owner = %decl.name, %selector, "synthesized inherited constructor callback");
    callback
}

/// Callback for an inherited constructor the type cannot honour.
fn unsupported_callback(
    ctx: &TransformContext<'_>,
    decl: &TypeDecl,
    ctor: &MethodDecl,
    selector: &str,
) -> MethodDecl {
    let mut callback = init_callback(ctx, ctor, selector);
    let mut b = BodyBuilder::new();
    let (handle, this) = peer_lookup(&mut b, decl);
    let message = format!(
        "native code called -{selector} which could not be mapped to a constructor in {}. Expected a default constructor or a {} constructor.",
        decl.name,
        ctor.sub_signature()
    );
    let fail = vec![Stmt::Throw {
        class: ctx.names().linkage_error.clone(),
        message,
    }];
    finish_lookup(&mut b, this, handle, fail);
    callback.body = Some(b.finish());
    warn!(owner = %decl.name, %selector, "inherited constructor cannot be mapped, deferring failure to run time");
    callback
}
