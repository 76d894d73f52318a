//! Per-type driver of the member transform.

use msgbridge_model::{DescriptorExport, InteropRole, MethodDecl, TypeDecl, TypeName};
use tracing::{debug, trace};

use crate::bridge::{create_bridge, BridgeRequest};
use crate::callback::{create_callback, find_overridden_methods};
use crate::classify::{classify_method, Accessor};
use crate::constructor::{transform_constructor, transform_parent_constructors};
use crate::context::{TransformContext, TypeState};
use crate::errors::TransformResult;
use crate::outlet::adapt_outlets;
use crate::registration::{add_bind_call, add_class_field, register_selectors};
use crate::selector::{is_overridable, method_selector, property_selector, resolve};

/// A type after the transform, with what it asks of later stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformedType {
    pub decl: TypeDecl,
    /// Descriptor symbol to emit, for published custom classes.
    pub export: Option<DescriptorExport>,
    /// Selectors registered by the static initializer, sorted.
    pub selectors: Vec<String>,
}

/// Transform one type of the class path.
///
/// Returns `None` for types the transform leaves alone: interfaces, the two runtime roots, and
/// anything that is neither a peer type nor an extension.
pub fn transform_type(ctx: &TransformContext<'_>, name: &TypeName) -> TransformResult<Option<TransformedType>> {
    let original = ctx.require_type(name)?;
    let names = ctx.names();
    if original.is_interface() || *name == names.object || *name == names.extensions {
        return Ok(None);
    }
    let extension = ctx.is_extension(original);
    if !extension && !ctx.is_objc_object(original) {
        trace!(%name, "not a peer type");
        return Ok(None);
    }

    let custom_class = original.has_custom_class_annotation();
    let app_delegate = !custom_class && ctx.is_app_delegate(original);
    let mut decl = original.clone();
    let mut state = TypeState::default();

    if custom_class {
        adapt_outlets(ctx, &mut decl)?;
    }

    let methods: Vec<MethodDecl> = decl.methods.clone();
    for (index, method) in methods.iter().enumerate() {
        if method.is_static_initializer() {
            continue;
        }
        if method.is_constructor() {
            if custom_class || app_delegate {
                transform_constructor(ctx, &mut state, &mut decl, method)?;
            }
            continue;
        }
        transform_method(ctx, &mut state, &mut decl, index, method, extension)?;
    }

    if custom_class || app_delegate {
        transform_parent_constructors(ctx, &mut state, &mut decl)?;
    }

    add_bind_call(&mut decl);
    let export = if extension {
        None
    } else {
        add_class_field(ctx, &mut decl, custom_class)
    };
    let selectors: Vec<String> = state.selectors.registered().map(str::to_owned).collect();
    register_selectors(ctx, &mut decl, selectors.iter().map(String::as_str));

    debug!(
        %name,
        custom_class,
        extension,
        selectors = selectors.len(),
        added = decl.methods.len() - methods.len(),
        "transformed type"
    );
    Ok(Some(TransformedType {
        decl,
        export,
        selectors,
    }))
}

fn transform_method(
    ctx: &TransformContext<'_>,
    state: &mut TypeState,
    decl: &mut TypeDecl,
    index: usize,
    method: &MethodDecl,
    extension: bool,
) -> TransformResult<()> {
    let Some(classified) = classify_method(ctx, decl, method, extension)? else {
        return override_callback(ctx, state, decl, method);
    };
    let is_getter = classified.accessor == Accessor::Getter;
    let selector = resolve(&classified.annotation, decl, method, is_getter, extension)?;

    if is_overridable(decl, method) {
        state.selectors.claim(&selector, decl.method_id(method))?;
    }
    if !extension && ctx.is_custom_class(decl) {
        create_callback(ctx, state, decl, method, method, &selector)?;
    }
    if method.modifiers.is_native {
        state.selectors.register(&selector);
        let strong_ref_setter = classified.accessor == Accessor::Setter && classified.annotation.strong_ref;
        create_bridge(
            ctx,
            decl,
            BridgeRequest {
                index,
                annotation: &classified.annotation,
                selector: &selector,
                strong_ref_setter,
                extension,
            },
        )?;
    }
    Ok(())
}

/// Callback for a plain custom-class member overriding an annotated ancestor member.
fn override_callback(
    ctx: &TransformContext<'_>,
    state: &mut TypeState,
    decl: &mut TypeDecl,
    method: &MethodDecl,
) -> TransformResult<()> {
    let modifiers = &method.modifiers;
    if modifiers.is_static
        || modifiers.is_native
        || modifiers.is_abstract
        || modifiers.is_private()
        || method.is_not_implemented()
        || !ctx.is_custom_class(decl)
    {
        return Ok(());
    }
    for (owner, overridden) in find_overridden_methods(ctx, decl, method) {
        let Some(annotation) = overridden
            .interop()
            .into_iter()
            .find(|a| matches!(a.role, InteropRole::Method | InteropRole::Property))
            .cloned()
        else {
            continue;
        };
        let selector = if annotation.role == InteropRole::Property {
            property_selector(&annotation, &owner.method_id(overridden), overridden, !method.ret.is_void())?
        } else {
            method_selector(&annotation, overridden, false)
        };
        trace!(member = %decl.method_id(method), %selector, overrides = %owner.name, "override callback");
        return create_callback(ctx, state, decl, method, overridden, &selector);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use msgbridge_model::printer::print_method;
    use msgbridge_model::{
        Annotation, Body, ClassAnnotation, ClassPath, DefaultMarshalers, Expr, InteropAnnotation,
        Modifiers, Stmt, TypeKind, ValueType, Visibility, CONSTRUCTOR, STATIC_INITIALIZER,
    };

    use crate::config::BridgeConfig;
    use crate::errors::TransformErrorKind;

    fn native() -> Modifiers {
        Modifiers {
            is_native: true,
            ..Default::default()
        }
    }

    fn property(name: &str, params: Vec<ValueType>, ret: ValueType) -> MethodDecl {
        MethodDecl::new(name, params.into_iter().map(Into::into).collect(), ret, native())
            .with_annotation(Annotation::Interop(InteropAnnotation::new(InteropRole::Property)))
    }

    fn string() -> ValueType {
        ValueType::object("java.lang.String")
    }

    fn native_view(is_final: bool) -> TypeDecl {
        let mut view = TypeDecl::new("app.View", TypeKind::Class);
        view.superclass = Some("foundation.NSObject".into());
        view.annotations.push(ClassAnnotation::NativeClass);
        view.modifiers.is_final = is_final;
        view.methods.push(property("getTitleColor", vec![], string()));
        view.methods.push(property("getTitle", vec![], string()));
        let mut setter = property("setTitle", vec![string()], ValueType::Void);
        setter.annotations = vec![Annotation::Interop(InteropAnnotation {
            strong_ref: true,
            ..InteropAnnotation::new(InteropRole::Property)
        })];
        view.methods.push(setter);
        view
    }

    fn run(cp: &ClassPath, name: &str, generic_dispatch: bool) -> TransformResult<Option<TransformedType>> {
        let marshalers = DefaultMarshalers::default();
        let config = BridgeConfig::default().with_generic_dispatch(generic_dispatch);
        let ctx = TransformContext::new(cp, &marshalers, &config);
        transform_type(&ctx, &name.into())
    }

    fn method<'d>(decl: &'d TypeDecl, name: &str) -> &'d MethodDecl {
        decl.methods.iter().find(|m| m.name == name).unwrap()
    }

    #[test]
    fn test_two_state_dispatch_bridge() {
        let mut cp = ClassPath::default();
        let mut view = native_view(false);
        view.methods.truncate(1);
        view.methods.push(MethodDecl::new("draw", vec![], ValueType::Void, native()).with_annotation(
            Annotation::Interop(InteropAnnotation::new(InteropRole::Method)),
        ));
        cp.insert(view);

        let transformed = run(&cp, "app.View", false).unwrap().unwrap();
        assert_snapshot!(print_method(method(&transformed.decl, "draw")), @r"
        @Method
        public void draw() {
            $sel = app.View.$sel$draw
            $customClass = runtime.is_custom_class(this)
            dispatch $customClass {
                standard:
                    static app.View::$m$draw(this, $sel)
                ancestor:
                    $super = runtime.get_super(this)
                    static app.View::$m$super$draw($super, $sel)
            }
            return
        }
        ");
        assert_eq!(transformed.selectors, vec!["draw", "titleColor"]);
        assert!(transformed.export.is_none());
        assert!(transformed.decl.has_field("$sel$draw"));
    }

    #[test]
    fn test_generic_dispatch_uses_instance_trampoline() {
        let mut cp = ClassPath::default();
        let mut view = native_view(false);
        view.methods.truncate(1);
        view.methods.push(MethodDecl::new("draw", vec![], ValueType::Void, native()).with_annotation(
            Annotation::Interop(InteropAnnotation::new(InteropRole::Method)),
        ));
        cp.insert(view);

        let transformed = run(&cp, "app.View", true).unwrap().unwrap();
        assert_snapshot!(print_method(method(&transformed.decl, "draw")), @r"
        @Method
        public void draw() {
            $sel = app.View.$sel$draw
            static objc.$M::void_objc_msgSend_instance(this, $sel)
            return
        }
        ");
        assert!(!transformed.decl.methods.iter().any(|m| m.name.starts_with("$m$")));
    }

    #[test]
    fn test_declared_static_initializer_without_body_gets_registration() {
        let mut cp = ClassPath::default();
        let mut view = native_view(false);
        view.methods.truncate(1);
        view.methods.push(MethodDecl::new(
            STATIC_INITIALIZER,
            vec![],
            ValueType::Void,
            Modifiers {
                is_static: true,
                ..Default::default()
            },
        ));
        view.methods.push(MethodDecl::new("draw", vec![], ValueType::Void, native()).with_annotation(
            Annotation::Interop(InteropAnnotation::new(InteropRole::Method)),
        ));
        cp.insert(view);

        let transformed = run(&cp, "app.View", false).unwrap().unwrap();
        let clinits = transformed.decl.methods.iter().filter(|m| m.name == STATIC_INITIALIZER).count();
        assert_eq!(clinits, 1);
        assert_snapshot!(print_method(method(&transformed.decl, STATIC_INITIALIZER)), @r#"
        public static void <clinit>() {
            runtime.bind(class app.View)
            $objCClass = runtime.class_by_type(class app.View)
            app.View.$class = $objCClass
            $sel = runtime.register_selector("draw")
            app.View.$sel$draw = $sel
            $sel = runtime.register_selector("titleColor")
            app.View.$sel$titleColor = $sel
            return
        }
        "#);
        assert!(transformed.decl.has_field("$class"));
        assert!(transformed.decl.has_field("$sel$draw"));
    }

    #[test]
    fn test_strong_ref_setter_reads_matching_getter() {
        let mut cp = ClassPath::default();
        cp.insert(native_view(true));

        let transformed = run(&cp, "app.View", false).unwrap().unwrap();
        assert_snapshot!(print_method(method(&transformed.decl, "setTitle")), @r#"
        @Property(strongRef = true)
        public void setTitle(java.lang.String) {
            $before = virtual this app.View::getTitle()
            $sel = app.View.$sel$setTitle$
            static app.View::$m$setTitle$(this, $sel, @p0)
            runtime.update_strong_ref(this, $before, @p0)
            return
        }
        "#);
        assert_eq!(transformed.selectors, vec!["setTitle:", "title", "titleColor"]);
    }

    #[test]
    fn test_strong_ref_setter_without_getter() {
        let mut cp = ClassPath::default();
        let mut view = native_view(true);
        view.methods.remove(1);
        cp.insert(view);

        let err = run(&cp, "app.View", false).unwrap_err();
        assert!(matches!(err.kind(), TransformErrorKind::MissingStrongRefGetter { .. }));
    }

    #[test]
    fn test_strong_ref_setter_ignores_is_getter() {
        let mut cp = ClassPath::default();
        let mut view = native_view(true);
        view.methods.insert(0, property("isTitle", vec![], string()));
        cp.insert(view.clone());

        let transformed = run(&cp, "app.View", false).unwrap().unwrap();
        let setter = method(&transformed.decl, "setTitle");
        let Some(Stmt::Assign { value, .. }) = setter.body.as_ref().unwrap().stmts.first() else {
            panic!("setter does not read the previous value first");
        };
        let Expr::Invoke { method: getter, .. } = value else {
            panic!("unexpected read {value:?}");
        };
        assert_eq!(getter.name, "getTitle");

        view.methods.retain(|m| m.name != "getTitle");
        let mut cp = ClassPath::default();
        cp.insert(view);
        let err = run(&cp, "app.View", false).unwrap_err();
        assert!(matches!(err.kind(), TransformErrorKind::MissingStrongRefGetter { .. }));
    }

    #[test]
    fn test_overridable_selector_collision() {
        let mut cp = ClassPath::default();
        let mut view = TypeDecl::new("app.View", TypeKind::Class);
        view.superclass = Some("foundation.NSObject".into());
        view.annotations.push(ClassAnnotation::NativeClass);
        for name in ["draw", "redraw"] {
            view.methods.push(MethodDecl::new(name, vec![], ValueType::Void, native()).with_annotation(
                Annotation::Interop(InteropAnnotation::new(InteropRole::Method).with_selector("draw")),
            ));
        }
        cp.insert(view);

        let err = run(&cp, "app.View", true).unwrap_err();
        let TransformErrorKind::SelectorCollision { first, second, .. } = err.kind() else {
            panic!("unexpected error: {err}");
        };
        assert!(first.contains("draw()"));
        assert!(second.contains("redraw()"));
    }

    fn do_thing(name: &str, modifiers: Modifiers) -> MethodDecl {
        MethodDecl::new(name, vec![], ValueType::Void, modifiers).with_annotation(Annotation::Interop(
            InteropAnnotation::new(InteropRole::Method).with_selector("doThing"),
        ))
    }

    /// Partners of a public `doThing` that never take part in selector claims.
    fn non_overridable(base: Modifiers) -> Vec<(&'static str, Modifiers)> {
        vec![
            (
                "doThingStatic",
                Modifiers {
                    is_static: true,
                    ..base
                },
            ),
            (
                "doThingFinal",
                Modifiers {
                    is_final: true,
                    ..base
                },
            ),
            (
                "doThingPrivate",
                Modifiers {
                    visibility: Visibility::Private,
                    ..base
                },
            ),
        ]
    }

    /// Names of the methods a body invokes.
    fn invoked(body: &Body) -> Vec<String> {
        let mut names = Vec::new();
        body.walk(&mut |stmt| {
            if let Stmt::Eval(Expr::Invoke { method, .. })
            | Stmt::Assign {
                value: Expr::Invoke { method, .. },
                ..
            } = stmt
            {
                names.push(method.name.clone());
            }
        });
        names
    }

    #[test]
    fn test_non_overridable_members_share_selector_on_native_class() {
        for (name, modifiers) in non_overridable(native()) {
            let mut cp = ClassPath::default();
            let mut view = TypeDecl::new("app.View", TypeKind::Class);
            view.superclass = Some("foundation.NSObject".into());
            view.annotations.push(ClassAnnotation::NativeClass);
            view.methods.push(do_thing("doThing", native()));
            view.methods.push(do_thing(name, modifiers));
            cp.insert(view);

            let transformed = run(&cp, "app.View", false)
                .unwrap_or_else(|err| panic!("{name}: {err}"))
                .unwrap();
            assert_eq!(transformed.selectors, vec!["doThing"], "{name}");
            assert!(method(&transformed.decl, name).body.is_some(), "{name}");
            let instance_sends = transformed
                .decl
                .methods
                .iter()
                .filter(|m| m.name == "$m$doThing" && m.params[0].ty == ValueType::object("app.View"))
                .count();
            assert_eq!(instance_sends, 1, "{name}");
        }
    }

    #[test]
    fn test_non_overridable_members_share_selector_on_custom_class() {
        for (name, modifiers) in non_overridable(Modifiers::default()) {
            for partner_first in [false, true] {
                let mut cp = ClassPath::default();
                let mut mine = TypeDecl::new("app.Mine", TypeKind::Class);
                mine.superclass = Some("foundation.NSObject".into());
                mine.annotations.push(ClassAnnotation::CustomClass { name: None });
                let public = do_thing("doThing", Modifiers::default());
                let partner = do_thing(name, modifiers);
                if partner_first {
                    mine.methods.extend([partner, public]);
                } else {
                    mine.methods.extend([public, partner]);
                }
                cp.insert(mine);

                let transformed = run(&cp, "app.Mine", true)
                    .unwrap_or_else(|err| panic!("{name}: {err}"))
                    .unwrap();
                let callbacks: Vec<_> = transformed
                    .decl
                    .methods
                    .iter()
                    .filter(|m| m.has_annotation(&Annotation::Callback))
                    .collect();
                let instance: Vec<_> = callbacks
                    .iter()
                    .filter(|m| m.params[0].ty == ValueType::object("app.Mine"))
                    .collect();
                assert_eq!(instance.len(), 1, "{name}");
                assert_eq!(instance[0].bound_selector(), Some("doThing"));
                assert_eq!(invoked(instance[0].body.as_ref().unwrap()), vec!["doThing"], "{name}");

                if modifiers.is_static {
                    let class_callback = callbacks
                        .iter()
                        .find(|m| m.params[0].ty == ValueType::object("objc.ObjCClass"))
                        .unwrap();
                    assert_eq!(class_callback.bound_selector(), Some("doThing"));
                    assert_eq!(invoked(class_callback.body.as_ref().unwrap()), vec!["doThingStatic"]);
                } else {
                    assert_eq!(callbacks.len(), 1, "{name}");
                }
            }
        }
    }

    #[test]
    fn test_overridable_custom_class_callbacks_collide() {
        let mut cp = ClassPath::default();
        let mut mine = TypeDecl::new("app.Mine", TypeKind::Class);
        mine.superclass = Some("foundation.NSObject".into());
        mine.annotations.push(ClassAnnotation::CustomClass { name: None });
        mine.methods.push(do_thing("doThing", Modifiers::default()));
        mine.methods.push(do_thing("doOtherThing", Modifiers::default()));
        cp.insert(mine);

        let err = run(&cp, "app.Mine", true).unwrap_err();
        assert!(matches!(err.kind(), TransformErrorKind::SelectorCollision { .. }));
    }

    #[test]
    fn test_custom_class_overrides_and_publication() {
        let mut cp = ClassPath::default();
        cp.insert(native_view(false));
        let mut mine = TypeDecl::new("app.MyView", TypeKind::Class);
        mine.superclass = Some("app.View".into());
        mine.annotations.push(ClassAnnotation::CustomClass { name: Some("MyView".into()) });
        mine.methods.push(MethodDecl::new(CONSTRUCTOR, vec![], ValueType::Void, Modifiers::default()));
        mine.methods.push(MethodDecl::new("getTitle", vec![], string(), Modifiers::default()));
        let mut hidden = MethodDecl::new("getTitleColor", vec![], string(), Modifiers::default());
        hidden.annotations.push(Annotation::NotImplemented);
        mine.methods.push(hidden);
        cp.insert(mine);

        let transformed = run(&cp, "app.MyView", true).unwrap().unwrap();
        let decl = &transformed.decl;
        let callback = method(decl, "$cb$title");
        assert_eq!(callback.bound_selector(), Some("title"));
        assert!(!decl.methods.iter().any(|m| m.name == "$cb$titleColor"));
        assert_eq!(
            transformed.export.as_ref().map(|e| e.symbol.as_str()),
            Some("OBJC_CLASS_$_MyView")
        );
        assert!(transformed.selectors.is_empty());
        assert!(decl.has_field("$class"));
    }

    #[test]
    fn test_extension_member() {
        let mut cp = ClassPath::default();
        cp.insert(native_view(true));
        let mut ext = TypeDecl::new("app.ViewExtensions", TypeKind::Class);
        ext.superclass = Some("objc.ObjCExtensions".into());
        ext.methods.push(
            MethodDecl::new(
                "flash",
                vec![ValueType::object("app.View").into()],
                ValueType::Void,
                Modifiers {
                    is_static: true,
                    ..native()
                },
            )
            .with_annotation(Annotation::Interop(InteropAnnotation::new(InteropRole::Method))),
        );
        cp.insert(ext);

        let transformed = run(&cp, "app.ViewExtensions", true).unwrap().unwrap();
        assert_snapshot!(print_method(method(&transformed.decl, "flash")), @r"
        @Method
        public static void flash(app.View) {
            $sel = app.ViewExtensions.$sel$flash
            static objc.$M::void_objc_msgSend(@p0, $sel)
            return
        }
        ");
        assert!(!transformed.decl.has_field("$class"));
    }

    #[test]
    fn test_ignored_types() {
        let mut cp = ClassPath::default();
        cp.insert(TypeDecl::new("app.Plain", TypeKind::Class));
        let mut protocol = TypeDecl::new("app.Protocol", TypeKind::Interface);
        protocol.interfaces.push("objc.ObjCObject".into());
        cp.insert(protocol);

        assert!(run(&cp, "app.Plain", true).unwrap().is_none());
        assert!(run(&cp, "app.Protocol", true).unwrap().is_none());
        assert!(run(&cp, "objc.ObjCObject", true).unwrap().is_none());
        let err = run(&cp, "app.Missing", true).unwrap_err();
        assert!(matches!(err.kind(), TransformErrorKind::UnknownType(_)));
    }
}
