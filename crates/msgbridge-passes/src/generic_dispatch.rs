//! Generic dispatch: route common send shapes through shared trampolines.
//!
//! A dedicated send `$m$<sel>(receiver, selector, args...)` is replaced when its shape is one of:
//!
//! ```text
//! (object, selector) -> void | primitive | object | string   =>  <kind>_objc_msgSend
//! (object, selector, primitive | object | string) -> void    =>  objc_msgSend_<kind>
//! ```
//!
//! with the receiver and any object or string value using the default marshalers. Super sends
//! `(super, selector, ...)` map onto the `objc_msgSendSuper` family the same way. Instance members
//! use the `_instance` variant, which performs the custom-class test itself.

use msgbridge_model::{
    MachineSized, MarshalSite, MarshalStrategy, MethodDecl, MethodRef, SitePosition, ValueAttrs,
    ValueType,
};
use tracing::trace;

use crate::context::TransformContext;

/// Suffix of the trampolines that perform the ancestor-aware test internally.
pub const INSTANCE_SUFFIX: &str = "_instance";

/// Shared replacement for a dedicated `$m$` send, if its shape qualifies.
pub fn msg_send_replacement(ctx: &TransformContext<'_>, send: &MethodDecl) -> Option<MethodRef> {
    let receiver = send.params.first()?;
    if !ctx.is_native_object(&receiver.ty) || !default_receiver(ctx, send) {
        return None;
    }
    replacement(ctx, send, "objc_msgSend", ValueType::Object(ctx.names().native_object.clone()))
}

/// Shared replacement for a dedicated `$m$super$` send.
pub fn msg_send_super_replacement(ctx: &TransformContext<'_>, send: &MethodDecl) -> Option<MethodRef> {
    let receiver = send.params.first()?;
    if receiver.ty != ctx.super_type() || send.receiver_marshaler().is_some() {
        return None;
    }
    replacement(ctx, send, "objc_msgSendSuper", receiver.ty.clone())
}

/// `_instance` flavour of a shared trampoline.
pub fn instance_variant(mut method: MethodRef) -> MethodRef {
    method.name.push_str(INSTANCE_SUFFIX);
    method
}

fn replacement(
    ctx: &TransformContext<'_>,
    send: &MethodDecl,
    family: &str,
    receiver: ValueType,
) -> Option<MethodRef> {
    let selector = send.params.get(1)?;
    if !ctx.is_selector(&selector.ty) {
        return None;
    }
    let native_object = ValueType::Object(ctx.names().native_object.clone());
    let owner = ctx.names().trampolines.clone();
    let params = vec![receiver, selector.ty.clone()];

    let found = match &send.params[2..] {
        [] => {
            let (kind, ret) = value_kind(ctx, &send.ret, &send.ret_attrs, SitePosition::Return, &native_object)?;
            MethodRef::new(owner, format!("{kind}_{family}"), params, ret)
        }
        [arg] if send.ret.is_void() => {
            if arg.attrs.marshaler.is_some() {
                return None;
            }
            let (kind, ty) = value_kind(ctx, &arg.ty, &arg.attrs, SitePosition::Param(0), &native_object)?;
            let mut params = params;
            params.push(ty);
            MethodRef::new(owner, format!("{family}_{kind}"), params, ValueType::Void)
        }
        _ => return None,
    };
    trace!(send = %send.name, trampoline = %found.name, "generic dispatch");
    Some(found)
}

/// Kind suffix and trampoline-side type of a value, when the shape is supported.
fn value_kind(
    ctx: &TransformContext<'_>,
    ty: &ValueType,
    attrs: &ValueAttrs,
    position: SitePosition,
    native_object: &ValueType,
) -> Option<(String, ValueType)> {
    if ty.is_void() || ty.is_primitive() {
        return Some((primitive_kind(ty, attrs), ty.clone()));
    }
    let strategy = ctx.find_marshaler(&MarshalSite::new(position, ty, attrs))?;
    match strategy {
        MarshalStrategy::DefaultObject if ctx.is_native_object(ty) => {
            Some(("object".to_owned(), native_object.clone()))
        }
        MarshalStrategy::DefaultString if ctx.is_string(ty) => Some(("string".to_owned(), ty.clone())),
        _ => None,
    }
}

/// Primitive kind: the keyword, refined by pointer and machine-sized attributes.
pub fn primitive_kind(ty: &ValueType, attrs: &ValueAttrs) -> String {
    match (ty, attrs.machine_sized) {
        (ValueType::Long, _) if attrs.pointer => "ptr".to_owned(),
        (ValueType::Float | ValueType::Double, Some(MachineSized::Float)) => format!("m{ty}"),
        (ValueType::Long, Some(MachineSized::SInt)) => "msint".to_owned(),
        (ValueType::Long, Some(MachineSized::UInt)) => "muint".to_owned(),
        _ => ty.to_string(),
    }
}

fn default_receiver(ctx: &TransformContext<'_>, send: &MethodDecl) -> bool {
    if send.receiver_marshaler().is_some() {
        return false;
    }
    let receiver = &send.params[0];
    ctx.find_marshaler(&MarshalSite::new(SitePosition::Receiver, &receiver.ty, &receiver.attrs))
        == Some(MarshalStrategy::DefaultObject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgbridge_model::{ClassPath, DefaultMarshalers, Modifiers, Param};

    use crate::config::BridgeConfig;

    fn send(params: Vec<Param>, ret: ValueType) -> MethodDecl {
        let mut all = vec![
            Param::new(ValueType::object("uikit.UIEvent")),
            Param::new(ValueType::object("objc.Selector")),
        ];
        all.extend(params);
        MethodDecl::new("$m$x", all, ret, Modifiers::private_static())
    }

    fn with_ctx<R>(f: impl FnOnce(&TransformContext<'_>) -> R) -> R {
        let cp = ClassPath::default();
        let marshalers = DefaultMarshalers::default().with_custom("foundation.NSArray", "p.ArrayMarshaler");
        let config = BridgeConfig::default();
        f(&TransformContext::new(&cp, &marshalers, &config))
    }

    fn name_of(method: &MethodDecl) -> Option<String> {
        with_ctx(|ctx| msg_send_replacement(ctx, method).map(|m| m.name))
    }

    #[test]
    fn test_zero_arg_shapes() {
        assert_eq!(name_of(&send(vec![], ValueType::Void)).as_deref(), Some("void_objc_msgSend"));
        assert_eq!(name_of(&send(vec![], ValueType::Int)).as_deref(), Some("int_objc_msgSend"));
        assert_eq!(
            name_of(&send(vec![], ValueType::object("uikit.UIEvent"))).as_deref(),
            Some("object_objc_msgSend")
        );
        assert_eq!(
            name_of(&send(vec![], ValueType::object("java.lang.String"))).as_deref(),
            Some("string_objc_msgSend")
        );
    }

    #[test]
    fn test_one_arg_shapes() {
        let ptr = Param::with_attrs(ValueType::Long, ValueAttrs::pointer());
        assert_eq!(name_of(&send(vec![ptr], ValueType::Void)).as_deref(), Some("objc_msgSend_ptr"));

        let mfloat = Param::with_attrs(
            ValueType::Double,
            ValueAttrs {
                machine_sized: Some(MachineSized::Float),
                ..Default::default()
            },
        );
        assert_eq!(name_of(&send(vec![mfloat], ValueType::Void)).as_deref(), Some("objc_msgSend_mdouble"));

        let object = Param::new(ValueType::object("uikit.UIEvent"));
        let replaced = with_ctx(|ctx| msg_send_replacement(ctx, &send(vec![object], ValueType::Void)));
        let replaced = replaced.unwrap();
        assert_eq!(replaced.name, "objc_msgSend_object");
        assert_eq!(replaced.params[2], ValueType::object("foundation.NSObject"));
    }

    #[test]
    fn test_ineligible_shapes() {
        // Non-void with an argument.
        assert_eq!(name_of(&send(vec![ValueType::Int.into()], ValueType::Int)), None);
        // Two arguments.
        assert_eq!(name_of(&send(vec![ValueType::Int.into(), ValueType::Int.into()], ValueType::Void)), None);
        // Custom marshaled return.
        assert_eq!(name_of(&send(vec![], ValueType::object("foundation.NSArray"))), None);
        // Receiver marshaler override.
        let overridden = send(vec![], ValueType::Void).with_annotation(msgbridge_model::Annotation::Marshaler(
            "p.Custom".into(),
        ));
        assert_eq!(name_of(&overridden), None);
    }

    #[test]
    fn test_super_family() {
        let mut method = send(vec![ValueType::Boolean.into()], ValueType::Void);
        method.params[0] = Param::new(ValueType::object("objc.ObjCSuper"));
        let name = with_ctx(|ctx| msg_send_super_replacement(ctx, &method).map(|m| m.name));
        assert_eq!(name.as_deref(), Some("objc_msgSendSuper_boolean"));
        assert_eq!(
            instance_variant(MethodRef::new("objc.$M".into(), "void_objc_msgSend", vec![], ValueType::Void)).name,
            "void_objc_msgSend_instance"
        );
    }
}
