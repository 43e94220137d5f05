//=====================================================
// File: session.rs
//=====================================================
// Goal: Scoped evaluation sessions
// Objective: Assemble a security manager, resolution chains, and a
//            bootstrap registry into one evaluator whose native context
//            is released on every exit path
//=====================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::resolve::{
    EnvReader, FileResolver, ModuleResolution, ModuleResolver, ModuleSource, Reference,
    ResourceReader, ResourceResolution, StandardLibraryResolver,
};
use crate::runtime::{EvalError, FrameTransformer, ModuleEvaluator, ModuleOutput, Value};
use crate::security::SecurityManager;
use crate::stdlib::{BootstrapRegistry, ModuleId};

//=====================================================
// Section 1.0 - Native Context Guard
//=====================================================

static ACTIVE_CONTEXTS: AtomicUsize = AtomicUsize::new(0);

/// Guard for the native evaluation context a session holds while alive.
/// Released in `Drop`, so every exit path (success, error, panic) gives the
/// context back.
pub struct EvalContext(());

impl EvalContext {
    fn acquire() -> Self {
        let active = ACTIVE_CONTEXTS.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(active, "evaluation context acquired");
        Self(())
    }

    /// Number of live evaluation contexts in the process.
    pub fn active_count() -> usize {
        ACTIVE_CONTEXTS.load(Ordering::SeqCst)
    }
}

impl Drop for EvalContext {
    fn drop(&mut self) {
        let active = ACTIVE_CONTEXTS.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::trace!(active, "evaluation context released");
    }
}

//=====================================================
// Section 2.0 - Builder
//=====================================================

/// Configures one evaluation session. All options are optional; a session
/// built without a security manager gets a fully permissive policy.
#[derive(Default)]
pub struct EvaluatorBuilder {
    security: Option<SecurityManager>,
    module_resolvers: Vec<Box<dyn ModuleResolver>>,
    resource_readers: Vec<Box<dyn ResourceReader>>,
    env: HashMap<String, String>,
    frame_transformer: Option<FrameTransformer>,
    registry: Option<Arc<BootstrapRegistry>>,
}

impl EvaluatorBuilder {
    /// A builder with no resolvers, no readers, and no policy.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// A builder with the standard library and filesystem module resolvers,
    /// filesystem resource reading, the process environment, and a
    /// permissive policy.
    pub fn preconfigured() -> Self {
        Self::unconfigured()
            .add_module_resolver(Box::new(StandardLibraryResolver))
            .add_module_resolver(Box::new(FileResolver))
            .add_resource_reader(Box::new(FileResolver))
            .add_environment_variables(std::env::vars().collect())
    }

    pub fn set_security_manager(mut self, security: SecurityManager) -> Self {
        self.security = Some(security);
        self
    }

    pub fn set_stack_frame_transformer(mut self, transformer: FrameTransformer) -> Self {
        self.frame_transformer = Some(transformer);
        self
    }

    /// Resolvers are consulted in the order added; the first claiming
    /// resolver wins.
    pub fn add_module_resolver(mut self, resolver: Box<dyn ModuleResolver>) -> Self {
        self.module_resolvers.push(resolver);
        self
    }

    pub fn add_resource_reader(mut self, reader: Box<dyn ResourceReader>) -> Self {
        self.resource_readers.push(reader);
        self
    }

    /// Environment variables exposed to the `env:` resource scheme. An env
    /// reader over the accumulated map is appended after the explicitly
    /// added readers at build time.
    pub fn add_environment_variables(mut self, vars: HashMap<String, String>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn set_bootstrap_registry(mut self, registry: Arc<BootstrapRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Evaluator {
        let security = Arc::new(self.security.unwrap_or_else(SecurityManager::permissive));
        let mut readers = self.resource_readers;
        if !self.env.is_empty() {
            readers.push(Box::new(EnvReader::new(self.env)));
        }
        Evaluator {
            modules: ModuleResolution::new(Arc::clone(&security), self.module_resolvers),
            resources: ResourceResolution::new(security, readers),
            registry: self.registry.unwrap_or_else(BootstrapRegistry::global),
            frame_transformer: self.frame_transformer,
            _context: EvalContext::acquire(),
        }
    }
}

//=====================================================
// Section 3.0 - Evaluator
//=====================================================

/// One bounded use of the resolution, security, and bootstrap machinery.
/// Owns its resolution chains exclusively; shares only the bootstrap
/// registry with other sessions.
pub struct Evaluator {
    modules: ModuleResolution,
    resources: ResourceResolution,
    registry: Arc<BootstrapRegistry>,
    frame_transformer: Option<FrameTransformer>,
    _context: EvalContext,
}

impl Evaluator {
    pub fn evaluate(&self, source: &ModuleSource) -> Result<Value, EvalError> {
        self.evaluate_output(source).map(|output| output.value)
    }

    /// Evaluates a module and requires it to amend the expected standard
    /// library module.
    pub fn evaluate_output_as(
        &self,
        source: &ModuleSource,
        expected: &ModuleId,
    ) -> Result<Value, EvalError> {
        let output = self.evaluate_output(source)?;
        match &output.amends {
            Some(reference) if *reference == expected.reference() => Ok(output.value),
            Some(reference) => Err(EvalError::ShapeMismatch {
                expected: format!("a module amending `{expected}`"),
                found: format!("a module amending `{reference}`"),
            }),
            None => Err(EvalError::ShapeMismatch {
                expected: format!("a module amending `{expected}`"),
                found: "a module with no amends clause".to_string(),
            }),
        }
    }

    /// Returns the singleton class handle for a standard library class,
    /// e.g. the benchmark result class of `pkl:Benchmark`.
    pub fn std_class(
        &self,
        id: &ModuleId,
        name: &str,
    ) -> Result<Arc<crate::runtime::ClassHandle>, EvalError> {
        let mut evaluator = ModuleEvaluator::new(
            &self.modules,
            &self.resources,
            Arc::clone(&self.registry),
            self.frame_transformer.clone(),
        );
        Ok(evaluator.std_class(id, name)?)
    }

    fn evaluate_output(&self, source: &ModuleSource) -> Result<ModuleOutput, EvalError> {
        let mut evaluator = ModuleEvaluator::new(
            &self.modules,
            &self.resources,
            Arc::clone(&self.registry),
            self.frame_transformer.clone(),
        );
        match source {
            ModuleSource::Text(text) => {
                evaluator.evaluate(&Reference::new("repl:text"), text, None)
            }
            ModuleSource::Path(_) => {
                let reference = source.reference();
                let (resolved, _trust) = self.modules.resolve(&reference)?;
                evaluator.evaluate(&resolved.reference, &resolved.source, resolved.base_dir)
            }
        }
    }
}


//=====================================================
// End of file
//=====================================================
