use std::fs;
use std::sync::Arc;

use pklrt::resolve::ModuleSource;
use pklrt::runtime::{EvalError, StackFrame, Value};
use pklrt::session::EvaluatorBuilder;
use pklrt::stdlib::{BootstrapRegistry, ModuleId};

fn fresh_session() -> EvaluatorBuilder {
    EvaluatorBuilder::preconfigured()
        .set_bootstrap_registry(Arc::new(BootstrapRegistry::new()))
}

#[test]
fn evaluates_literals_and_objects() {
    let evaluator = fresh_session().build();
    let value = evaluator
        .evaluate(&ModuleSource::text(
            "name = \"app\"\nport = 8080\nserver { host = \"localhost\" }",
        ))
        .expect("evaluate");

    assert_eq!(value.member("name"), Some(&Value::String("app".into())));
    assert_eq!(value.member("port"), Some(&Value::Int(8080)));
    let server = value.member("server").expect("server");
    assert_eq!(
        server.member("host"),
        Some(&Value::String("localhost".into()))
    );
}

#[test]
fn amending_the_settings_module_inherits_and_overrides() {
    let evaluator = fresh_session().build();
    let value = evaluator
        .evaluate(&ModuleSource::text(
            "amends \"pkl:settings\"\neditor = Sublime",
        ))
        .expect("evaluate");

    let editor = value.member("editor").expect("editor");
    assert_eq!(
        editor.member("urlScheme").and_then(Value::as_str),
        Some("subl://open?url=%{url}&line=%{line}&column=%{column}")
    );
    // Inherited members survive the overlay.
    assert!(value.member("System").is_some());
    assert!(matches!(value.member("Editor"), Some(Value::Class(_))));
}

#[test]
fn imports_resolve_relative_to_the_importing_module() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("common.pkl"), "greeting = \"hello\"").expect("write");
    let main = dir.path().join("main.pkl");
    fs::write(&main, "import \"file:common.pkl\"\nmessage = common.greeting").expect("write");

    let evaluator = fresh_session().build();
    let value = evaluator.evaluate(&ModuleSource::path(&main)).expect("evaluate");
    assert_eq!(
        value.member("message"),
        Some(&Value::String("hello".into()))
    );
}

#[test]
fn import_aliases_rename_the_binding() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("common.pkl"), "greeting = \"hi\"").expect("write");
    let main = dir.path().join("main.pkl");
    fs::write(&main, "import \"file:common.pkl\" as shared\nmessage = shared.greeting")
        .expect("write");

    let evaluator = fresh_session().build();
    let value = evaluator.evaluate(&ModuleSource::path(&main)).expect("evaluate");
    assert_eq!(value.member("message"), Some(&Value::String("hi".into())));
}

#[test]
fn cyclic_imports_are_detected() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.pkl"), "import \"file:b.pkl\"\nx = 1").expect("write");
    fs::write(dir.path().join("b.pkl"), "import \"file:a.pkl\"\ny = 2").expect("write");

    let evaluator = fresh_session().build();
    let error = evaluator
        .evaluate(&ModuleSource::path(dir.path().join("a.pkl")))
        .unwrap_err();

    assert!(
        matches!(error, EvalError::CyclicImport { .. }),
        "expected cycle, found {error:?}"
    );
}

#[test]
fn unknown_names_carry_a_transformed_stack_frame() {
    let evaluator = fresh_session()
        .set_stack_frame_transformer(Arc::new(|frame: StackFrame| StackFrame {
            line: frame.line + 100,
            ..frame
        }))
        .build();

    let error = evaluator
        .evaluate(&ModuleSource::text("x = 1\ny = missing"))
        .unwrap_err();
    match error {
        EvalError::UnknownName { name, frame } => {
            assert_eq!(name, "missing");
            assert_eq!(frame.line, 102);
        }
        other => panic!("expected unknown name, found {other:?}"),
    }
}

#[test]
fn output_shape_check_requires_the_expected_amends_target() {
    let evaluator = fresh_session().build();

    let ok = evaluator.evaluate_output_as(
        &ModuleSource::text("amends \"pkl:settings\""),
        &ModuleId::new("settings"),
    );
    assert!(ok.is_ok());

    let missing = evaluator
        .evaluate_output_as(&ModuleSource::text("x = 1"), &ModuleId::new("settings"))
        .unwrap_err();
    assert!(matches!(missing, EvalError::ShapeMismatch { .. }));

    let wrong = evaluator
        .evaluate_output_as(
            &ModuleSource::text("amends \"pkl:Benchmark\""),
            &ModuleId::new("settings"),
        )
        .unwrap_err();
    assert!(matches!(wrong, EvalError::ShapeMismatch { .. }));
}

#[test]
fn sessions_sharing_a_registry_reuse_standard_library_classes() {
    let registry = Arc::new(BootstrapRegistry::new());
    let first = EvaluatorBuilder::preconfigured()
        .set_bootstrap_registry(Arc::clone(&registry))
        .build();
    let second = EvaluatorBuilder::preconfigured()
        .set_bootstrap_registry(Arc::clone(&registry))
        .build();

    let id = ModuleId::new("Benchmark");
    let from_first = first.std_class(&id, "BenchmarkResult").expect("class");
    let from_second = second.std_class(&id, "BenchmarkResult").expect("class");
    assert!(Arc::ptr_eq(&from_first, &from_second));
    assert_eq!(from_first.name, "BenchmarkResult");
}

#[test]
fn benchmark_module_exposes_its_result_class() {
    let evaluator = fresh_session().build();
    let value = evaluator
        .evaluate(&ModuleSource::text(
            "amends \"pkl:Benchmark\"\nresult { iterations = 3 min = 1 max = 9 }",
        ))
        .expect("evaluate");

    match value.member("BenchmarkResult") {
        Some(Value::Class(class)) => {
            assert_eq!(class.properties, vec!["iterations", "min", "max"]);
            assert_eq!(class.methods, vec!["range"]);
        }
        other => panic!("expected class handle, found {other:?}"),
    }
    let result = value.member("result").expect("result");
    assert_eq!(result.member("max"), Some(&Value::Int(9)));
}
