use msgbridge_core::PointerWidth;
use msgbridge_model::{
    Annotation, BodyBuilder, ClassAnnotation, ClassPath, Const, DefaultMarshalers, DescriptorExport,
    Expr, FieldRef, InteropAnnotation, InteropRole, InvokeKind, MethodDecl, MethodRef, Modifiers,
    Operand, Stmt, TypeDecl, TypeKind, TypeName, ValueType, CONSTRUCTOR,
};
use msgbridge_object::CLASS_DESCRIPTOR_V1;
use msgbridge_passes::{transform_type, BridgeConfig, TransformContext};
use msgbridge_runtime::{NativeImp, NativeReceiver, Runtime, RuntimeErrorKind, Value};
use target_lexicon::Endianness;

fn native() -> Modifiers {
    Modifiers {
        is_native: true,
        ..Default::default()
    }
}

fn interop(role: InteropRole) -> Annotation {
    Annotation::Interop(InteropAnnotation::new(role))
}

fn string() -> ValueType {
    ValueType::object("java.lang.String")
}

fn view_type() -> TypeName {
    TypeName::new("app.View")
}

fn my_view_type() -> TypeName {
    TypeName::new("app.MyView")
}

/// `app.View` (native) and `app.MyView` (custom, overriding `draw` and calling up).
fn class_path() -> ClassPath {
    let mut cp = ClassPath::default();

    let mut view = TypeDecl::new("app.View", TypeKind::Class);
    view.superclass = Some("foundation.NSObject".into());
    view.annotations.push(ClassAnnotation::NativeClass);
    view.methods.push(
        MethodDecl::new("getTitle", vec![], string(), native()).with_annotation(interop(InteropRole::Property)),
    );
    view.methods.push(
        MethodDecl::new("setTitle", vec![string().into()], ValueType::Void, native()).with_annotation(
            Annotation::Interop(InteropAnnotation {
                strong_ref: true,
                ..InteropAnnotation::new(InteropRole::Property)
            }),
        ),
    );
    view.methods.push(
        MethodDecl::new("draw", vec![], ValueType::Void, native()).with_annotation(interop(InteropRole::Method)),
    );
    view.methods.push(
        MethodDecl::new(
            "flush",
            vec![],
            ValueType::Void,
            Modifiers {
                is_static: true,
                ..native()
            },
        )
        .with_annotation(interop(InteropRole::Method)),
    );
    view.methods.push(
        MethodDecl::new(CONSTRUCTOR, vec![ValueType::Double.into()], ValueType::Void, Modifiers::default())
            .with_annotation(Annotation::Interop(
                InteropAnnotation::new(InteropRole::Method).with_selector("initWithFrame:"),
            )),
    );
    view.methods.push(MethodDecl::new(
        "init",
        vec![ValueType::Double.into()],
        ValueType::Long,
        Modifiers::default(),
    ));
    cp.insert(view);

    let mut mine = TypeDecl::new("app.MyView", TypeKind::Class);
    mine.superclass = Some("app.View".into());
    mine.annotations.push(ClassAnnotation::CustomClass {
        name: Some("MyView".into()),
    });
    mine.methods.push(MethodDecl::new(
        CONSTRUCTOR,
        vec![],
        ValueType::Void,
        Modifiers::default(),
    ));
    let mut b = BodyBuilder::new();
    b.push(Stmt::SetField {
        target: Some(Operand::This),
        field: FieldRef {
            owner: my_view_type(),
            name: "drawn".into(),
            ty: ValueType::Boolean,
            is_static: false,
        },
        value: Operand::Const(Const::Bool(true)),
    });
    b.eval(Expr::invoke(
        InvokeKind::Special,
        MethodRef::new(view_type(), "draw", vec![], ValueType::Void),
        Operand::This,
        vec![],
    ));
    b.ret(None);
    mine.methods
        .push(MethodDecl::new("draw", vec![], ValueType::Void, Modifiers::default()).with_body(b.finish()));
    cp.insert(mine);

    // No default constructor, so inherited init selectors cannot be honoured.
    let mut panel = TypeDecl::new("app.Panel", TypeKind::Class);
    panel.superclass = Some("app.View".into());
    panel.annotations.push(ClassAnnotation::CustomClass { name: None });
    panel.methods.push(MethodDecl::new(
        CONSTRUCTOR,
        vec![ValueType::Int.into()],
        ValueType::Void,
        Modifiers::default(),
    ));
    cp.insert(panel);
    cp
}

fn transform(cp: &ClassPath, generic_dispatch: bool) -> (ClassPath, Vec<DescriptorExport>) {
    let marshalers = DefaultMarshalers::default();
    let config = BridgeConfig::default().with_generic_dispatch(generic_dispatch);
    let ctx = TransformContext::new(cp, &marshalers, &config);
    let mut out = cp.clone();
    let mut exports = Vec::new();
    for name in cp.type_names() {
        if let Some(transformed) = transform_type(&ctx, name).unwrap() {
            exports.extend(transformed.export);
            out.insert(transformed.decl);
        }
    }
    (out, exports)
}

fn runtime(generic_dispatch: bool) -> Runtime {
    let (cp, exports) = transform(&class_path(), generic_dispatch);
    let runtime = Runtime::new(cp);
    runtime.declare_exports(&exports);
    let view = view_type();
    runtime.register_native(view.clone(), "title", NativeImp::Property("title".into()));
    runtime.register_native(view.clone(), "setTitle:", NativeImp::Property("title".into()));
    runtime.register_native(view.clone(), "draw", NativeImp::Returns(Value::Null));
    runtime.register_native(view.clone(), "flush", NativeImp::Returns(Value::Null));
    runtime.register_native(view.clone(), "layoutSubviews", NativeImp::Callback("draw".into()));
    runtime.register_native(view, "init", NativeImp::ReturnsHandle);
    runtime
}

fn exercise(runtime: &Runtime, class: &TypeName) -> Value {
    let id = runtime.instantiate(class, vec![]).unwrap();
    runtime.call(id, "setTitle", vec![Value::Str("hello".into())]).unwrap();
    runtime.call(id, "draw", vec![]).unwrap();
    runtime.call(id, "getTitle", vec![]).unwrap()
}

#[test]
fn test_generic_and_specialized_sends_are_equivalent() {
    for class in [view_type(), my_view_type()] {
        let generic = runtime(true);
        let specialized = runtime(false);

        assert_eq!(exercise(&generic, &class), Value::Str("hello".into()));
        assert_eq!(exercise(&specialized, &class), Value::Str("hello".into()));
        let calls = generic.take_calls();
        assert!(!calls.is_empty());
        assert_eq!(calls, specialized.take_calls(), "{class}");
        assert_eq!(generic.strong_refs(), specialized.strong_refs());
    }
}

#[test]
fn test_custom_instances_send_through_super() {
    let runtime = runtime(true);
    let plain = runtime.instantiate(&view_type(), vec![]).unwrap();
    runtime.call(plain, "getTitle", vec![]).unwrap();
    let custom = runtime.instantiate(&my_view_type(), vec![]).unwrap();
    runtime.call(custom, "getTitle", vec![]).unwrap();

    let calls = runtime.take_calls();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].via_super);
    assert_eq!(calls[0].class, view_type());
    assert!(calls[1].via_super);
    assert_eq!(calls[1].class, my_view_type());
    assert_eq!(calls[1].selector, "title");
}

#[test]
fn test_native_code_reaches_managed_override() {
    let runtime = runtime(false);
    let custom = runtime.instantiate(&my_view_type(), vec![]).unwrap();
    runtime.send_message(custom, "layoutSubviews", vec![]).unwrap();

    assert_eq!(runtime.field(custom, "drawn"), Some(Value::Bool(true)));
    let selectors: Vec<_> = runtime
        .take_calls()
        .into_iter()
        .map(|call| (call.selector, call.via_super))
        .collect();
    // layoutSubviews -> draw (callback) -> super draw (native)
    assert_eq!(
        selectors,
        vec![
            ("layoutSubviews".to_owned(), false),
            ("draw".to_owned(), false),
            ("draw".to_owned(), true),
        ]
    );
}

#[test]
fn test_static_member_sends_to_class() {
    let runtime = runtime(true);
    runtime.call_static(&view_type(), "flush", vec![]).unwrap();
    let calls = runtime.take_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].receiver, NativeReceiver::Class(view_type()));
}

#[test]
fn test_strong_ref_setter_reports_previous_value() {
    let runtime = runtime(true);
    let id = runtime.instantiate(&view_type(), vec![]).unwrap();
    runtime.call(id, "setTitle", vec![Value::Str("a".into())]).unwrap();
    runtime.call(id, "setTitle", vec![Value::Str("b".into())]).unwrap();

    let updates = runtime.strong_refs();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].owner, Value::Object(id));
    assert_eq!(updates[0].before, Value::Null);
    assert_eq!(updates[1].before, Value::Str("a".into()));
    assert_eq!(updates[1].after, Value::Str("b".into()));
    assert!(!updates[1].extension);
}

#[test]
fn test_inherited_init_selector_is_idempotent() {
    let runtime = runtime(true);
    let handle = runtime.alloc_native();
    let first = runtime
        .init_from_native(&my_view_type(), handle, "initWithFrame:", vec![Value::Double(1.0)])
        .unwrap();
    assert_eq!(first, handle);
    let peer = runtime.peer(handle).unwrap();
    assert_eq!(runtime.class_of(peer).unwrap(), my_view_type());
    assert!(runtime.is_retained(handle));
    let objects = runtime.object_count();

    let second = runtime
        .init_from_native(&my_view_type(), handle, "initWithFrame:", vec![Value::Double(1.0)])
        .unwrap();
    assert_eq!(second, handle);
    assert_eq!(runtime.peer(handle), Some(peer));
    assert_eq!(runtime.object_count(), objects);
}

#[test]
fn test_unmappable_init_selector_fails_at_run_time() {
    let runtime = runtime(true);
    let handle = runtime.alloc_native();
    let err = runtime
        .init_from_native(&"app.Panel".into(), handle, "initWithFrame:", vec![Value::Double(1.0)])
        .unwrap_err();
    match err.kind() {
        RuntimeErrorKind::Linkage { class, message } => {
            assert_eq!(class.as_str(), "java.lang.NoSuchMethodError");
            assert!(message.starts_with("native code called -initWithFrame: which could not be mapped"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runtime.peer(handle), None);
}

#[test]
fn test_descriptor_published_on_initialization() {
    let runtime = runtime(true);
    let symbol = "OBJC_CLASS_$_MyView";
    assert_eq!(runtime.export(symbol), Some(vec![0; 40]));

    runtime.ensure_initialized(&my_view_type()).unwrap();
    let handle = runtime.descriptor_handle(&my_view_type()).unwrap();
    let words = CLASS_DESCRIPTOR_V1
        .decode(&runtime.export(symbol).unwrap(), PointerWidth::U64, Endianness::Little)
        .unwrap();
    assert_eq!(words[0], handle);
    assert_eq!(Some(words[1]), runtime.descriptor_handle(&view_type()));
    assert_eq!(runtime.alias(handle), Some(my_view_type()));
    assert_eq!(
        runtime.static_field(&my_view_type(), "$class"),
        Some(Value::Descriptor(my_view_type()))
    );
    assert!(runtime.selectors().contains(&"setTitle:".to_owned()));
}

#[test]
fn test_publication_needs_declared_storage() {
    let (cp, _) = transform(&class_path(), true);
    let runtime = Runtime::new(cp);
    let err = runtime.ensure_initialized(&my_view_type()).unwrap_err();
    assert!(matches!(err.kind(), RuntimeErrorKind::UnknownSymbol(symbol) if symbol == "OBJC_CLASS_$_MyView"));
}

#[test]
fn test_class_and_instance_callbacks_share_a_selector() {
    let do_thing = |name: &str, modifiers: Modifiers, field: &str| {
        let mut b = BodyBuilder::new();
        b.push(Stmt::SetField {
            target: None,
            field: FieldRef {
                owner: "app.Mine".into(),
                name: field.into(),
                ty: ValueType::Boolean,
                is_static: true,
            },
            value: Operand::Const(Const::Bool(true)),
        });
        b.ret(None);
        MethodDecl::new(name, vec![], ValueType::Void, modifiers)
            .with_annotation(Annotation::Interop(
                InteropAnnotation::new(InteropRole::Method).with_selector("doThing"),
            ))
            .with_body(b.finish())
    };
    let mut cp = ClassPath::default();
    let mut mine = TypeDecl::new("app.Mine", TypeKind::Class);
    mine.superclass = Some("foundation.NSObject".into());
    mine.annotations.push(ClassAnnotation::CustomClass { name: None });
    mine.methods.push(do_thing(
        "doThingStatic",
        Modifiers {
            is_static: true,
            ..Default::default()
        },
        "classDone",
    ));
    mine.methods.push(do_thing("doThing", Modifiers::default(), "instanceDone"));
    cp.insert(mine);

    let (cp, exports) = transform(&cp, true);
    let runtime = Runtime::new(cp);
    runtime.declare_exports(&exports);
    let class = TypeName::new("app.Mine");
    let id = runtime.instantiate(&class, vec![]).unwrap();
    runtime.send_message(id, "doThing", vec![]).unwrap();

    assert_eq!(runtime.static_field(&class, "instanceDone"), Some(Value::Bool(true)));
    assert_eq!(runtime.static_field(&class, "classDone"), None);
    let instance = runtime.bound_callback(&class, "doThing", false).unwrap();
    let class_callback = runtime.bound_callback(&class, "doThing", true).unwrap();
    assert_eq!(instance.params[0], ValueType::object("app.Mine"));
    assert_eq!(class_callback.params[0], ValueType::object("objc.ObjCClass"));
}
