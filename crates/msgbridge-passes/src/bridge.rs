//! Bridge synthesis: replace native interop members with an outbound message send.
//!
//! For an instance member of a non-final type the send is a two-state dispatch on the
//! receiver's custom-class flag:
//!
//! ```text
//! public void setTitle(java.lang.String) {
//!     $sel = app.View.$sel$setTitle$
//!     $customClass = runtime.is_custom_class(this)
//!     dispatch $customClass {
//!         standard:
//!             static app.View::$m$setTitle$(this, $sel, @p0)
//!         ancestor:
//!             $super = runtime.get_super(this)
//!             static app.View::$m$super$setTitle$($super, $sel, @p0)
//!     }
//!     return
//! }
//! ```
//!
//! When a shared `_instance` trampoline applies, the trampoline performs that test itself and the
//! body is a single send.

use msgbridge_model::{
    Annotation, BodyBuilder, Expr, FieldRef, InteropAnnotation, InteropRole, InvokeKind, LocalId,
    MarshalSite, MemberId, MethodDecl, MethodRef, Modifiers, Operand, Param, RuntimeCall,
    SitePosition, Stmt, TypeDecl, ValueAttrs, ValueType,
};
use tracing::debug;

use crate::callback::copied_annotations;
use crate::context::TransformContext;
use crate::errors::{TransformError, TransformErrorKind, TransformResult};
use crate::generic_dispatch::{instance_variant, msg_send_replacement, msg_send_super_replacement};
use crate::selector::{getter_property, mangle, selector_field_name, setter_property};

/// Name of the static field holding the class descriptor.
pub const CLASS_FIELD: &str = "$class";

/// A native member to bridge.
pub struct BridgeRequest<'r> {
    /// Index of the member in the type's method list.
    pub index: usize,
    pub annotation: &'r InteropAnnotation,
    pub selector: &'r str,
    pub strong_ref_setter: bool,
    pub extension: bool,
}

/// Give the native member at `request.index` a body performing the send.
pub fn create_bridge(
    ctx: &TransformContext<'_>,
    decl: &mut TypeDecl,
    request: BridgeRequest<'_>,
) -> TransformResult<()> {
    let BridgeRequest {
        index,
        annotation,
        selector,
        strong_ref_setter,
        extension,
    } = request;
    let method = decl.methods[index].clone();
    let id = decl.method_id(&method);
    let is_static = method.modifiers.is_static;

    let send = msg_send_method(ctx, decl, &method, selector, extension);
    check_marshalers(ctx, &id, &send)?;

    let generic = if ctx.config.generic_dispatch {
        msg_send_replacement(ctx, &send)
    } else {
        None
    };
    let mut synthesized = Vec::new();
    let mut using_instance_trampoline = false;
    let send_ref = match generic {
        Some(shared) if !is_static => {
            using_instance_trampoline = true;
            instance_variant(shared)
        }
        Some(shared) => shared,
        None => {
            let send_ref = method_ref(decl, &send);
            synthesized.push(send);
            send_ref
        }
    };

    let needs_dispatch = !using_instance_trampoline && !extension && !is_static && !decl.is_final();
    let super_ref = if needs_dispatch {
        let super_send = msg_send_super_method(ctx, &method, selector);
        let shared = if ctx.config.generic_dispatch {
            msg_send_super_replacement(ctx, &super_send)
        } else {
            None
        };
        Some(match shared {
            Some(shared) => shared,
            None => {
                let super_ref = method_ref(decl, &super_send);
                synthesized.push(super_send);
                super_ref
            }
        })
    } else {
        None
    };

    let getter = if strong_ref_setter {
        let value = &method.params[usize::from(extension)].ty;
        if value.is_reference() {
            Some(find_strong_ref_getter(decl, &method, annotation, extension)?)
        } else {
            None
        }
    } else {
        None
    };

    let mut b = BodyBuilder::new();
    let (receiver, first_arg) = if extension {
        (Operand::Param(0), 1)
    } else if is_static {
        let class = b.local("objCClass", ctx.class_type());
        b.assign(
            class,
            Expr::GetField {
                target: None,
                field: class_field(ctx, decl),
            },
        );
        (Operand::Local(class), 0)
    } else {
        (Operand::This, 0)
    };
    let args: Vec<Operand> = (first_arg..method.params.len()).map(Operand::Param).collect();

    let before = getter.as_ref().map(|getter| {
        let value_ty = method.params[first_arg].ty.clone();
        let before = b.local("before", value_ty);
        let getter_ref = method_ref(decl, getter);
        let read = if extension {
            Expr::invoke_static(getter_ref, vec![receiver.clone()])
        } else if is_static {
            Expr::invoke_static(getter_ref, vec![])
        } else {
            Expr::invoke(InvokeKind::Virtual, getter_ref, Operand::This, vec![])
        };
        b.assign(before, read);
        before
    });

    let sel = b.local("sel", ctx.selector_type());
    b.assign(
        sel,
        Expr::GetField {
            target: None,
            field: FieldRef {
                owner: decl.name.clone(),
                name: selector_field_name(selector),
                ty: ctx.selector_type(),
                is_static: true,
            },
        },
    );

    let ret = (!method.ret.is_void()).then(|| b.local("ret", send_ref.ret.clone()));
    let send_args = |head: Operand| {
        let mut all = vec![head, Operand::Local(sel)];
        all.extend(args.iter().cloned());
        all
    };

    match &super_ref {
        Some(super_ref) => {
            let custom_class = b.local("customClass", ValueType::Boolean);
            b.assign(custom_class, Expr::runtime(RuntimeCall::IsCustomClass, vec![Operand::This]));
            let standard = b.block(|b| {
                b.assign_or_eval(ret, Expr::invoke_static(send_ref.clone(), send_args(receiver.clone())));
            });
            let ancestor = b.block(|b| {
                let zuper = b.local("super", ctx.super_type());
                b.assign(zuper, Expr::runtime(RuntimeCall::GetSuper, vec![Operand::This]));
                b.assign_or_eval(
                    ret,
                    Expr::invoke_static(super_ref.clone(), send_args(Operand::Local(zuper))),
                );
            });
            b.push(Stmt::Dispatch {
                custom_class: Operand::Local(custom_class),
                standard,
                ancestor,
            });
        }
        None => {
            b.assign_or_eval(ret, Expr::invoke_static(send_ref.clone(), send_args(receiver.clone())));
        }
    }

    if let Some(before) = before {
        let after = Operand::Param(first_arg);
        let update = if extension {
            Expr::runtime(
                RuntimeCall::UpdateStrongRefExtension,
                vec![receiver.clone(), Operand::Local(before), after],
            )
        } else {
            Expr::runtime(
                RuntimeCall::UpdateStrongRef,
                vec![receiver.clone(), Operand::Local(before), after],
            )
        };
        b.eval(update);
    }

    let ret = ret.map(|ret| cast_return(&mut b, ret, &send_ref.ret, &method.ret));
    b.ret(ret);

    let body = b.finish();
    let target = &mut decl.methods[index];
    target.modifiers.is_native = false;
    target.body = Some(body);
    debug!(
        member = %id,
        send = %send_ref.name,
        dispatch = super_ref.is_some(),
        "synthesized bridge"
    );
    // Members sharing a selector and calling shape share one send.
    for send in synthesized {
        if decl.find_method(&send.name, &send.param_types(), &send.ret).is_none() {
            decl.methods.push(send);
        }
    }
    Ok(())
}

/// Shared trampolines return generic objects; cast back to the declared type.
fn cast_return(b: &mut BodyBuilder, ret: LocalId, sent: &ValueType, declared: &ValueType) -> Operand {
    if sent == declared {
        return Operand::Local(ret);
    }
    let cast = b.local("castRet", declared.clone());
    b.assign(
        cast,
        Expr::Cast {
            value: Operand::Local(ret),
            ty: declared.clone(),
        },
    );
    Operand::Local(cast)
}

pub(crate) fn class_field(ctx: &TransformContext<'_>, decl: &TypeDecl) -> FieldRef {
    FieldRef {
        owner: decl.name.clone(),
        name: CLASS_FIELD.to_owned(),
        ty: ctx.class_type(),
        is_static: true,
    }
}

fn method_ref(decl: &TypeDecl, method: &MethodDecl) -> MethodRef {
    MethodRef::new(decl.name.clone(), method.name.clone(), method.param_types(), method.ret.clone())
}

/// `$m$<sel>(receiver, selector, args...)`: the dedicated native send.
fn msg_send_method(
    ctx: &TransformContext<'_>,
    decl: &TypeDecl,
    method: &MethodDecl,
    selector: &str,
    extension: bool,
) -> MethodDecl {
    let receiver_attrs = ValueAttrs {
        marshaler: method.receiver_marshaler().map(str::to_owned),
        ..Default::default()
    };
    let (receiver, rest) = if extension {
        (method.params[0].clone(), &method.params[1..])
    } else if method.modifiers.is_static {
        (Param::new(ctx.class_type()), &method.params[..])
    } else {
        (
            Param::with_attrs(ValueType::Object(decl.name.clone()), receiver_attrs),
            &method.params[..],
        )
    };
    let mut params = vec![receiver, Param::new(ctx.selector_type())];
    params.extend(rest.iter().cloned());
    native_send(format!("$m${}", mangle(selector)), params, method, selector)
}

/// `$m$super$<sel>(super, selector, args...)`: the dedicated ancestor send.
fn msg_send_super_method(ctx: &TransformContext<'_>, method: &MethodDecl, selector: &str) -> MethodDecl {
    let mut params = vec![Param::new(ctx.super_type()), Param::new(ctx.selector_type())];
    params.extend(method.params.iter().cloned());
    native_send(format!("$m$super${}", mangle(selector)), params, method, selector)
}

fn native_send(name: String, params: Vec<Param>, method: &MethodDecl, selector: &str) -> MethodDecl {
    let mut send = MethodDecl::new(
        name,
        params,
        method.ret.clone(),
        Modifiers {
            is_native: true,
            ..Modifiers::private_static()
        },
    );
    send.ret_attrs = method.ret_attrs.clone();
    send.annotations = copied_annotations(method);
    send.annotations.push(Annotation::Bridge);
    send.annotations.push(Annotation::BindSelector(selector.to_owned()));
    send
}

/// Every value crossing the boundary needs a marshaler.
fn check_marshalers(ctx: &TransformContext<'_>, id: &MemberId, send: &MethodDecl) -> TransformResult<()> {
    let mut sites = Vec::with_capacity(send.params.len());
    for (index, param) in send.params.iter().enumerate() {
        match index {
            0 => sites.push((SitePosition::Receiver, "the receiver".to_owned(), &param.ty, &param.attrs)),
            1 => {}
            n => sites.push((SitePosition::Param(n - 2), format!("parameter {}", n - 2), &param.ty, &param.attrs)),
        }
    }
    if !send.ret.is_void() {
        sites.push((SitePosition::Return, "the return value".to_owned(), &send.ret, &send.ret_attrs));
    }
    for (position, site, ty, attrs) in sites {
        if ctx.find_marshaler(&MarshalSite::new(position, ty, attrs)).is_none() {
            return Err(TransformError::marshaling_gap(id, site, ty));
        }
    }
    Ok(())
}

/// The `get`-named getter paired with a strong-ref setter by property name.
fn find_strong_ref_getter(
    decl: &TypeDecl,
    setter: &MethodDecl,
    annotation: &InteropAnnotation,
    extension: bool,
) -> TransformResult<MethodDecl> {
    let id = decl.method_id(setter);
    let property = match annotation.explicit_name() {
        Some(name) => name.to_owned(),
        None => setter_property(&setter.name).ok_or_else(|| TransformErrorKind::UnresolvableConvention {
            member: id.to_string(),
            role: annotation.role,
        })?,
    };
    let receiver = usize::from(extension);
    let value = &setter.params[receiver].ty;
    decl.methods
        .iter()
        .filter(|m| !m.same_signature(setter))
        .filter(|m| !m.has_annotation(&Annotation::Bridge) && !m.has_annotation(&Annotation::Callback))
        .filter(|m| m.modifiers.is_static == setter.modifiers.is_static)
        .filter(|m| m.params.len() == receiver && &m.ret == value)
        .find(|m| {
            m.interop().iter().any(|a| {
                a.role == InteropRole::Property
                    && a.explicit_name()
                        .map(str::to_owned)
                        .or_else(|| getter_property(&m.name, false))
                        .is_some_and(|name| name == property)
            })
        })
        .cloned()
        .ok_or_else(|| TransformErrorKind::MissingStrongRefGetter { member: id.to_string() }.into())
}
