//! End-to-end tests: project file on disk, through the database, to an object file and the stub runtime.

use std::path::{Path, PathBuf};

use msgbridge::{BridgeDatabaseImpl, emit_object, transform_with_diagnostics};
use msgbridge_core::TargetInfo;
use msgbridge_model::TypeName;
use msgbridge_passes::BridgeConfig;
use msgbridge_runtime::{NativeImp, Runtime, Value};

fn demo_project() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/view.json")
}

fn write_project(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("project.json");
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_demo_project_transforms_cleanly() {
    let db = BridgeDatabaseImpl::default();
    let source = db.input(demo_project(), BridgeConfig::default()).unwrap();
    let report = transform_with_diagnostics(&db, source);

    assert!(!report.has_errors(), "{:?}", report.diagnostics);
    let output = report.output;
    assert_eq!(output.exports.len(), 1);
    assert_eq!(output.exports[0].symbol, "OBJC_CLASS_$_MyView");

    let selectors = &output.selectors[&TypeName::new("app.View")];
    for selector in ["title", "setTitle:", "draw"] {
        assert!(selectors.iter().any(|s| s == selector), "{selector} missing from {selectors:?}");
    }
    let view = output.class_path.get(&TypeName::new("app.View")).unwrap();
    assert!(view.has_field("$class"));
}

#[test]
fn test_input_is_cached_per_path_and_config() {
    let db = BridgeDatabaseImpl::default();
    let first = db.input(demo_project(), BridgeConfig::default()).unwrap();
    let again = db.input(demo_project(), BridgeConfig::default()).unwrap();
    assert_eq!(first, again);

    let specialized = db
        .input(demo_project(), BridgeConfig::default().with_generic_dispatch(false))
        .unwrap();
    assert_ne!(first, specialized);
}

#[test]
fn test_load_errors_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let db = BridgeDatabaseImpl::default();

    let missing = db.input(dir.path().join("absent.json"), BridgeConfig::default());
    assert!(missing.is_err());

    let path = write_project(dir.path(), r#"{ "types": 3 }"#);
    let err = db.input(path, BridgeConfig::default()).unwrap_err();
    assert!(err.to_string().contains("invalid project file"), "{err}");
}

#[test]
fn test_object_file_written_for_exports() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_project(
        dir.path(),
        r#"{
            "types": [
                { "name": "app.Base", "superclass": "foundation.NSObject", "annotations": ["native_class"] },
                { "name": "app.First", "superclass": "app.Base", "annotations": [{ "custom_class": {} }] },
                { "name": "app.Second", "superclass": "app.Base", "annotations": [{ "custom_class": { "name": "Second" } }] }
            ]
        }"#,
    );
    let target = TargetInfo::parse("aarch64-apple-darwin").unwrap();
    let db = BridgeDatabaseImpl::default();
    let source = db.input(path, BridgeConfig::for_target(&target)).unwrap();
    let report = transform_with_diagnostics(&db, source);
    assert!(!report.has_errors());

    let symbols: Vec<_> = report.output.exports.iter().map(|e| e.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["OBJC_CLASS_$_j_app_First", "OBJC_CLASS_$_Second"]);

    let bytes = emit_object(report.output, &target, true).unwrap();
    let out = dir.path().join("descriptors.o");
    std::fs::write(&out, &bytes).unwrap();
    assert!(std::fs::metadata(&out).unwrap().len() > 0);
    // Mach-O 64-bit magic
    assert_eq!(&bytes[..4], &[0xcf, 0xfa, 0xed, 0xfe]);
}

#[test]
fn test_unsupported_target_is_a_diagnostic() {
    let db = BridgeDatabaseImpl::default();
    let source = db.input(demo_project(), BridgeConfig::default()).unwrap();
    let report = transform_with_diagnostics(&db, source);
    let target = TargetInfo::parse("wasm32-unknown-unknown").unwrap();

    let diagnostic = emit_object(report.output, &target, false).unwrap_err();
    assert!(diagnostic.is_error());
    assert_eq!(diagnostic.location, "wasm32-unknown-unknown");
}

#[test]
fn test_transformed_demo_runs_on_stub_runtime() {
    let db = BridgeDatabaseImpl::default();
    let source = db.input(demo_project(), BridgeConfig::default()).unwrap();
    let report = transform_with_diagnostics(&db, source);
    let output = report.output;

    let runtime = Runtime::new(output.class_path.clone());
    runtime.declare_exports(&output.exports);
    let view = TypeName::new("app.View");
    runtime.register_native(view.clone(), "title", NativeImp::Property("title".into()));
    runtime.register_native(view.clone(), "setTitle:", NativeImp::Property("title".into()));
    runtime.register_native(view, "draw", NativeImp::Returns(Value::Null));

    let mine = runtime.instantiate(&TypeName::new("app.MyView"), vec![]).unwrap();
    runtime.call(mine, "setTitle", vec![Value::Str("demo".into())]).unwrap();
    assert_eq!(runtime.call(mine, "getTitle", vec![]).unwrap(), Value::Str("demo".into()));

    let calls = runtime.take_calls();
    assert!(calls.iter().all(|call| call.via_super));
    assert_eq!(runtime.strong_refs().len(), 1);
    assert!(runtime.export("OBJC_CLASS_$_MyView").unwrap().iter().any(|b| *b != 0));
}
