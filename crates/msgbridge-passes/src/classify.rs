//! Member classification: recognize the interop role of a method and validate its shape.

use msgbridge_model::{InteropAnnotation, InteropRole, MethodDecl, TypeDecl};
use tracing::trace;

use crate::context::TransformContext;
use crate::errors::{TransformError, TransformResult};

/// How a classified member is reached from native code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Accessor {
    Method,
    Getter,
    Setter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classified {
    pub annotation: InteropAnnotation,
    pub accessor: Accessor,
}

impl Classified {
    pub fn role(&self) -> InteropRole {
        self.annotation.role
    }
}

/// Recognize the single interop role of `method`, or `None` for plain members.
pub fn classify_method(
    ctx: &TransformContext<'_>,
    decl: &TypeDecl,
    method: &MethodDecl,
    extension: bool,
) -> TransformResult<Option<Classified>> {
    let id = decl.method_id(method);
    let annotation = match method.interop().as_slice() {
        [] => return Ok(None),
        [annotation] => (*annotation).clone(),
        many => {
            let roles: Vec<_> = many.iter().map(|a| a.role.to_string()).collect();
            return Err(TransformError::signature(
                &id,
                format!("interop roles are mutually exclusive, found {}", roles.join(", ")),
            ));
        }
    };
    let role = annotation.role;
    let modifiers = &method.modifiers;

    let accessor = match role {
        InteropRole::Method => {
            if extension && !(modifiers.is_static && modifiers.is_native) {
                return Err(TransformError::signature(
                    &id,
                    "@Method methods in extension types must be static and native",
                ));
            }
            Accessor::Method
        }
        InteropRole::IBAction => {
            if modifiers.is_static || modifiers.is_native {
                return Err(TransformError::signature(
                    &id,
                    "@IBAction methods must not be static or native",
                ));
            }
            let sender_ok = method
                .params
                .first()
                .is_none_or(|p| ctx.is_native_object(&p.ty));
            let event_ok = method.params.get(1).is_none_or(|p| ctx.is_event(&p.ty));
            if !method.ret.is_void() || method.params.len() > 2 || !sender_ok || !event_ok {
                return Err(TransformError::signature(
                    &id,
                    "@IBAction methods must return void and take no arguments, a sender, or a sender and an event",
                ));
            }
            Accessor::Method
        }
        InteropRole::Property => {
            if extension && !(modifiers.is_static && modifiers.is_native) {
                return Err(TransformError::signature(
                    &id,
                    "@Property methods in extension types must be static and native",
                ));
            }
            property_accessor(&id, role, method, extension)?
        }
        InteropRole::IBOutlet | InteropRole::IBInspectable => {
            if modifiers.is_static {
                return Err(TransformError::signature(&id, format!("{role} methods must not be static")));
            }
            property_accessor(&id, role, method, extension)?
        }
        InteropRole::IBOutletCollection => {
            if modifiers.is_static {
                return Err(TransformError::signature(&id, format!("{role} methods must not be static")));
            }
            let getter_bad = !method.ret.is_void() && !ctx.is_ordered_collection(&method.ret);
            let setter_bad = method.ret.is_void()
                && method.params.len() == 1
                && !ctx.is_ordered_collection(&method.params[0].ty);
            if getter_bad || setter_bad {
                return Err(TransformError::signature(
                    &id,
                    format!(
                        "{role} getters must return {0} and setters must take one {0}",
                        ctx.names().ordered_collection
                    ),
                ));
            }
            property_accessor(&id, role, method, extension)?
        }
    };

    trace!(member = %id, ?role, ?accessor, "classified");
    Ok(Some(Classified {
        annotation,
        accessor,
    }))
}

/// Getters take no value argument and return one; setters take one and return void.
fn property_accessor(
    id: &msgbridge_model::MemberId,
    role: InteropRole,
    method: &MethodDecl,
    extension: bool,
) -> TransformResult<Accessor> {
    let receiver = usize::from(extension);
    let is_getter = !method.ret.is_void();
    let expected = if is_getter { receiver } else { receiver + 1 };
    if method.params.len() != expected {
        let reason = if extension {
            format!(
                "{role} getters in extension types take 1 argument (the receiver) and return a value; setters take 2 arguments and return void"
            )
        } else {
            format!("{role} getters take 0 arguments and return a value; setters take 1 argument and return void")
        };
        return Err(TransformError::signature(id, reason));
    }
    Ok(if is_getter {
        Accessor::Getter
    } else {
        Accessor::Setter
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgbridge_model::{
        Annotation, ClassPath, DefaultMarshalers, Modifiers, TypeKind, ValueType,
    };

    use crate::config::BridgeConfig;
    use crate::errors::TransformErrorKind;

    fn method(name: &str, params: Vec<ValueType>, ret: ValueType, role: InteropRole) -> MethodDecl {
        MethodDecl::new(
            name,
            params.into_iter().map(Into::into).collect(),
            ret,
            Modifiers::default(),
        )
        .with_annotation(Annotation::Interop(InteropAnnotation::new(role)))
    }

    fn classify(m: &MethodDecl) -> TransformResult<Option<Classified>> {
        let cp = ClassPath::default();
        let marshalers = DefaultMarshalers::default();
        let config = BridgeConfig::default();
        let ctx = TransformContext::new(&cp, &marshalers, &config);
        let decl = TypeDecl::new("app.Controller", TypeKind::Class);
        classify_method(&ctx, &decl, m, false)
    }

    fn is_signature_violation(result: TransformResult<Option<Classified>>) -> bool {
        matches!(
            result.map_err(|e| e.kind().clone()),
            Err(TransformErrorKind::SignatureViolation { .. })
        )
    }

    #[test]
    fn test_property_accessors() {
        let getter = method("getName", vec![], ValueType::object("java.lang.String"), InteropRole::Property);
        let setter = method(
            "setName",
            vec![ValueType::object("java.lang.String")],
            ValueType::Void,
            InteropRole::Property,
        );
        assert_eq!(classify(&getter).unwrap().unwrap().accessor, Accessor::Getter);
        assert_eq!(classify(&setter).unwrap().unwrap().accessor, Accessor::Setter);

        let bad = method("setName", vec![], ValueType::Void, InteropRole::Property);
        assert!(is_signature_violation(classify(&bad)));
    }

    #[test]
    fn test_ib_action_shapes() {
        let sender = ValueType::object("foundation.NSObject");
        let event = ValueType::object("uikit.UIEvent");
        let ok = method("clicked", vec![sender.clone(), event], ValueType::Void, InteropRole::IBAction);
        assert!(classify(&ok).unwrap().is_some());

        let bad_event = method(
            "clicked",
            vec![sender.clone(), ValueType::Int],
            ValueType::Void,
            InteropRole::IBAction,
        );
        assert!(is_signature_violation(classify(&bad_event)));

        let returns = method("clicked", vec![], ValueType::Int, InteropRole::IBAction);
        assert!(is_signature_violation(classify(&returns)));
    }

    #[test]
    fn test_outlet_collection_requires_collection() {
        let getter = method(
            "getViews",
            vec![],
            ValueType::object("foundation.NSArray"),
            InteropRole::IBOutletCollection,
        );
        assert!(classify(&getter).unwrap().is_some());

        let wrong = method(
            "getViews",
            vec![],
            ValueType::object("java.lang.String"),
            InteropRole::IBOutletCollection,
        );
        assert!(is_signature_violation(classify(&wrong)));
    }

    #[test]
    fn test_roles_are_exclusive() {
        let both = method("getName", vec![], ValueType::Int, InteropRole::Property)
            .with_annotation(Annotation::Interop(InteropAnnotation::new(InteropRole::Method)));
        assert!(is_signature_violation(classify(&both)));
    }

    #[test]
    fn test_plain_members_are_skipped() {
        let plain = MethodDecl::new("layout", vec![], ValueType::Void, Modifiers::default());
        assert_eq!(classify(&plain).unwrap(), None);
    }
}
