//=====================================================
// File: settings.rs
//=====================================================
// Goal: User settings loaded from `<home>/settings.pkl`
// Objective: Evaluate the settings module under a narrow security policy
//            and project it manually into native fields
//=====================================================

use std::path::Path;

use crate::resolve::{FileResolver, ModuleSource, StandardLibraryResolver};
use crate::runtime::{EvalError, Value};
use crate::security::{SecurityManager, compile_patterns};
use crate::session::EvaluatorBuilder;
use crate::stdlib::ModuleId;

/// An editor for viewing and editing configuration files. The URL scheme may
/// contain the placeholder tokens `%{url}`, `%{path}`, `%{line}`, and
/// `%{column}`; they are stored verbatim and substituted elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editor {
    url_scheme: String,
}

impl Editor {
    pub fn new(url_scheme: impl Into<String>) -> Self {
        Self {
            url_scheme: url_scheme.into(),
        }
    }

    pub fn url_scheme(&self) -> &str {
        &self.url_scheme
    }

    /// The editor associated with `file:` URLs by the operating system.
    pub fn system() -> Self {
        Self::new("%{url}, line %{line}")
    }

    pub fn idea() -> Self {
        Self::new("idea://open?file=%{path}&line=%{line}")
    }

    pub fn text_mate() -> Self {
        Self::new("txmt://open?url=%{url}&line=%{line}&column=%{column}")
    }

    pub fn sublime() -> Self {
        Self::new("subl://open?url=%{url}&line=%{line}&column=%{column}")
    }

    pub fn atom() -> Self {
        Self::new("atom://open?url=%{url}&line=%{line}&column=%{column}")
    }

    pub fn vs_code() -> Self {
        Self::new("vscode://file/%{path}:%{line}:%{column}")
    }
}

/// Native representation of a settings file: a module amending
/// `pkl:settings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub editor: Editor,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            editor: Editor::system(),
        }
    }
}

impl Settings {
    /// Loads `settings.pkl` from the default home directory
    /// (`~/.pkl/settings.pkl`).
    pub fn load_default() -> Result<Self, EvalError> {
        match dirs::home_dir() {
            Some(home) => Self::load_from_home_dir(&home.join(".pkl")),
            None => Ok(Self::default()),
        }
    }

    /// Loads `<dir>/settings.pkl`. A missing file yields the built-in
    /// defaults instead of an error.
    pub fn load_from_home_dir(dir: &Path) -> Result<Self, EvalError> {
        let path = dir.join("settings.pkl");
        if path.exists() {
            Self::load(&ModuleSource::path(path))
        } else {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            Ok(Self::default())
        }
    }

    /// Evaluates a settings module under an intentionally narrow policy:
    /// standard library and filesystem modules, environment and filesystem
    /// resources, nothing else.
    pub fn load(source: &ModuleSource) -> Result<Self, EvalError> {
        let allowed_modules =
            compile_patterns(&["pkl:", "file:"]).expect("settings module patterns are valid");
        let allowed_resources =
            compile_patterns(&["env:", "file:"]).expect("settings resource patterns are valid");
        let evaluator = EvaluatorBuilder::unconfigured()
            .set_security_manager(SecurityManager::standard(allowed_modules, allowed_resources))
            .add_module_resolver(Box::new(StandardLibraryResolver))
            .add_module_resolver(Box::new(FileResolver))
            .add_resource_reader(Box::new(FileResolver))
            .add_environment_variables(std::env::vars().collect())
            .build();
        let module = evaluator.evaluate_output_as(source, &ModuleId::new("settings"))?;
        Self::project(&module)
    }

    // Object mapping conveniences live outside this crate, so project the
    // module manually, field by field.
    fn project(module: &Value) -> Result<Self, EvalError> {
        let editor = module
            .member("editor")
            .ok_or_else(|| shape_mismatch("an `editor` property", "no such property"))?;
        let url_scheme = editor
            .member("urlScheme")
            .ok_or_else(|| shape_mismatch("an `editor.urlScheme` property", "no such property"))?;
        let url_scheme = url_scheme.as_str().ok_or_else(|| {
            shape_mismatch(
                "`editor.urlScheme` to be a string",
                url_scheme.type_name(),
            )
        })?;
        Ok(Self {
            editor: Editor::new(url_scheme),
        })
    }
}

fn shape_mismatch(expected: &str, found: &str) -> EvalError {
    EvalError::ShapeMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}


//=====================================================
// End of file
//=====================================================
