//=====================================================
// File: stdlib.rs
//=====================================================
// Goal: Standard library sources and bootstrap registry
// Objective: Serve embedded stdlib module sources and cache their
//            evaluated singletons with exactly-once initialization
//=====================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use thiserror::Error;

use crate::resolve::Reference;
use crate::runtime::{ClassHandle, EvalError, Value};

//=====================================================
// Section 1.0 - Embedded Sources
//=====================================================

/// Source text for a well-known standard library module, by name.
pub fn source_for(name: &str) -> Option<&'static str> {
    match name {
        "settings" => Some(include_str!("settings.pkl")),
        "Benchmark" => Some(include_str!("benchmark.pkl")),
        _ => None,
    }
}

/// Canonical identity of a standard library module (`pkl:<name>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn reference(&self) -> Reference {
        Reference::new(format!("pkl:{}", self.0))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkl:{}", self.0)
    }
}

/// A fully evaluated standard library module. Published to the registry only
/// once complete; readers never observe a partially populated module.
#[derive(Debug)]
pub struct StdModule {
    pub id: ModuleId,
    pub value: Value,
}

impl StdModule {
    pub fn member(&self, name: &str) -> Option<&Value> {
        self.value.member(name)
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("standard library module `{id}` failed to load")]
    ModuleLoad {
        id: ModuleId,
        #[source]
        source: Box<EvalError>,
    },
    #[error("standard library module `{id}` has no member `{name}`")]
    MissingMember { id: ModuleId, name: String },
    #[error("member `{name}` of standard library module `{id}` is not a class")]
    NotAClass { id: ModuleId, name: String },
}

//=====================================================
// Section 2.0 - Bootstrap Registry
//=====================================================

type ModuleCell = Arc<OnceCell<Arc<StdModule>>>;
type ClassCell = Arc<OnceCell<Arc<ClassHandle>>>;

/// Process-wide cache of lazily built standard library modules and class
/// handles. Each identity has its own once-cell, so a blocking first load of
/// one module never serializes loads of unrelated modules. A failed load
/// leaves the cell empty; a later caller may retry.
#[derive(Default)]
pub struct BootstrapRegistry {
    modules: Mutex<HashMap<ModuleId, ModuleCell>>,
    classes: Mutex<HashMap<(ModuleId, String), ClassCell>>,
}

static GLOBAL: Lazy<Arc<BootstrapRegistry>> = Lazy::new(|| Arc::new(BootstrapRegistry::new()));

impl BootstrapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by default-configured sessions. Tests inject their
    /// own instance instead.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Returns the singleton module for `id`, invoking `load` at most once
    /// per completed initialization across all callers.
    pub fn get_module<F>(&self, id: &ModuleId, load: F) -> Result<Arc<StdModule>, BootstrapError>
    where
        F: FnOnce() -> Result<StdModule, BootstrapError>,
    {
        let cell = self.module_cell(id);
        // Initialization runs outside the map lock so that slow loads of one
        // identity do not block lookups of others.
        cell.get_or_try_init(|| {
            tracing::debug!(%id, "bootstrapping standard library module");
            load().map(Arc::new)
        })
        .cloned()
    }

    /// Returns the singleton class handle for `name` in module `id`, loading
    /// the module first if needed.
    pub fn get_class<F>(
        &self,
        id: &ModuleId,
        name: &str,
        load: F,
    ) -> Result<Arc<ClassHandle>, BootstrapError>
    where
        F: FnOnce() -> Result<StdModule, BootstrapError>,
    {
        let cell = self.class_cell(id, name);
        cell.get_or_try_init(|| {
            let module = self.get_module(id, load)?;
            match module.member(name) {
                Some(Value::Class(class)) => Ok(Arc::clone(class)),
                Some(_) => Err(BootstrapError::NotAClass {
                    id: id.clone(),
                    name: name.to_string(),
                }),
                None => Err(BootstrapError::MissingMember {
                    id: id.clone(),
                    name: name.to_string(),
                }),
            }
        })
        .cloned()
    }

    fn module_cell(&self, id: &ModuleId) -> ModuleCell {
        let mut modules = self.modules.lock();
        Arc::clone(modules.entry(id.clone()).or_default())
    }

    fn class_cell(&self, id: &ModuleId, name: &str) -> ClassCell {
        let mut classes = self.classes.lock();
        Arc::clone(
            classes
                .entry((id.clone(), name.to_string()))
                .or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &ModuleId) -> StdModule {
        StdModule {
            id: id.clone(),
            value: Value::Object(vec![("x".into(), Value::Int(1))]),
        }
    }

    #[test]
    fn known_sources_are_embedded() {
        assert!(source_for("settings").is_some());
        assert!(source_for("Benchmark").is_some());
        assert!(source_for("nope").is_none());
    }

    #[test]
    fn failed_load_is_not_cached() {
        let registry = BootstrapRegistry::new();
        let id = ModuleId::new("settings");
        let error = registry.get_module(&id, || {
            Err(BootstrapError::MissingMember {
                id: id.clone(),
                name: "boom".into(),
            })
        });
        assert!(error.is_err());

        // A later loader may still succeed.
        let loaded = registry.get_module(&id, || Ok(module(&id))).expect("retry");
        assert_eq!(loaded.member("x"), Some(&Value::Int(1)));
    }
}

//=====================================================
// End of file
//=====================================================
