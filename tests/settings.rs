use std::fs;

use pklrt::resolve::ModuleSource;
use pklrt::runtime::EvalError;
use pklrt::security::ViolationKind;
use pklrt::settings::{Editor, Settings};

#[test]
fn missing_settings_file_yields_the_system_defaults() {
    let home = tempfile::tempdir().expect("tempdir");
    let settings = Settings::load_from_home_dir(home.path()).expect("load");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.editor.url_scheme(), "%{url}, line %{line}");
}

#[test]
fn settings_file_selects_a_predefined_editor() {
    let home = tempfile::tempdir().expect("tempdir");
    fs::write(
        home.path().join("settings.pkl"),
        "amends \"pkl:settings\"\neditor = Sublime",
    )
    .expect("write");

    let settings = Settings::load_from_home_dir(home.path()).expect("load");
    assert_eq!(settings.editor, Editor::sublime());
}

#[test]
fn settings_file_may_define_a_custom_editor() {
    let home = tempfile::tempdir().expect("tempdir");
    fs::write(
        home.path().join("settings.pkl"),
        "amends \"pkl:settings\"\neditor { urlScheme = \"myedit://%{path}:%{line}\" }",
    )
    .expect("write");

    let settings = Settings::load_from_home_dir(home.path()).expect("load");
    assert_eq!(settings.editor.url_scheme(), "myedit://%{path}:%{line}");
}

#[test]
fn https_resources_are_denied_by_the_settings_policy() {
    let home = tempfile::tempdir().expect("tempdir");
    fs::write(
        home.path().join("settings.pkl"),
        "amends \"pkl:settings\"\neditor { urlScheme = read(\"https://example.com/scheme\") }",
    )
    .expect("write");

    let error = Settings::load_from_home_dir(home.path()).unwrap_err();
    match error {
        EvalError::Security(violation) => {
            assert_eq!(violation.kind, ViolationKind::ResourceDenied);
            assert_eq!(violation.reference.as_str(), "https://example.com/scheme");
        }
        other => panic!("expected a security violation, found {other:?}"),
    }
}

#[test]
fn file_resources_are_allowed_by_the_settings_policy() {
    let home = tempfile::tempdir().expect("tempdir");
    fs::write(home.path().join("scheme.txt"), "fileedit://%{path}").expect("write");
    fs::write(
        home.path().join("settings.pkl"),
        format!(
            "amends \"pkl:settings\"\neditor {{ urlScheme = read(\"file:{}/scheme.txt\") }}",
            home.path().display()
        ),
    )
    .expect("write");

    let settings = Settings::load_from_home_dir(home.path()).expect("load");
    assert_eq!(settings.editor.url_scheme(), "fileedit://%{path}");
}

#[test]
fn settings_must_amend_the_settings_module() {
    let home = tempfile::tempdir().expect("tempdir");
    fs::write(home.path().join("settings.pkl"), "editor = 1").expect("write");

    let error = Settings::load_from_home_dir(home.path()).unwrap_err();
    assert!(matches!(error, EvalError::ShapeMismatch { .. }));
}

#[test]
fn settings_can_be_loaded_from_an_explicit_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("my-settings.pkl");
    fs::write(&path, "amends \"pkl:settings\"\neditor = Idea").expect("write");

    let settings = Settings::load(&ModuleSource::path(&path)).expect("load");
    assert_eq!(settings.editor, Editor::idea());
}
