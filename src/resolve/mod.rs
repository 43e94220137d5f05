//=====================================================
// File: resolve.rs
//=====================================================
// Goal: Module and resource resolution chains
// Objective: Map permitted references to loadable content through an
//            ordered sequence of claiming resolvers
//=====================================================

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::security::{SecurityManager, SecurityViolation, TrustLevel};
use crate::stdlib;

//=====================================================
// Section 1.0 - References and Sources
//=====================================================

/// A scheme-qualified locator for a module or resource, e.g.
/// `pkl:settings`, `file:/etc/app.pkl`, `env:HOME`. Immutable value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference(String);

impl Reference {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first `:`, or the empty string for a bare path.
    pub fn scheme(&self) -> &str {
        match self.0.split_once(':') {
            Some((scheme, _)) => scheme,
            None => "",
        }
    }

    /// The part after the first `:`, or the whole locator for a bare path.
    pub fn path(&self) -> &str {
        match self.0.split_once(':') {
            Some((_, path)) => path,
            None => &self.0,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the root module of an evaluation comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleSource {
    Text(String),
    Path(PathBuf),
}

impl ModuleSource {
    pub fn text(source: impl Into<String>) -> Self {
        Self::Text(source.into())
    }

    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    pub fn reference(&self) -> Reference {
        match self {
            ModuleSource::Text(_) => Reference::new("repl:text"),
            ModuleSource::Path(path) => Reference::new(format!("file:{}", path.display())),
        }
    }
}

/// Content a module resolver produced for a claimed reference.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub reference: Reference,
    pub source: String,
    /// Directory that relative `file:` references inside this module are
    /// resolved against, when the module came from disk.
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Security(#[from] SecurityViolation),
    #[error("no resolver claims `{reference}`")]
    NotFound { reference: Reference },
    #[error("failed reading `{reference}`: {source}")]
    Io {
        reference: Reference,
        #[source]
        source: io::Error,
    },
}

//=====================================================
// Section 2.0 - Resolver Traits
//=====================================================

/// A component able to claim and load module content for references of a
/// given scheme.
pub trait ModuleResolver: Send + Sync {
    fn claims(&self, reference: &Reference) -> bool;
    fn resolve(&self, reference: &Reference) -> Result<ResolvedModule, ResolveError>;
}

/// A component able to claim and read resource content for references of a
/// given scheme.
pub trait ResourceReader: Send + Sync {
    fn claims(&self, reference: &Reference) -> bool;
    fn read(&self, reference: &Reference) -> Result<String, ResolveError>;
}

/// Serves the embedded standard library under the `pkl:` scheme.
pub struct StandardLibraryResolver;

impl ModuleResolver for StandardLibraryResolver {
    fn claims(&self, reference: &Reference) -> bool {
        reference.scheme() == "pkl"
    }

    fn resolve(&self, reference: &Reference) -> Result<ResolvedModule, ResolveError> {
        match stdlib::source_for(reference.path()) {
            Some(source) => Ok(ResolvedModule {
                reference: reference.clone(),
                source: source.to_string(),
                base_dir: None,
            }),
            None => Err(ResolveError::NotFound {
                reference: reference.clone(),
            }),
        }
    }
}

/// Loads modules and resources from the local filesystem under the `file:`
/// scheme.
pub struct FileResolver;

impl FileResolver {
    fn read_file(&self, reference: &Reference) -> Result<String, ResolveError> {
        fs::read_to_string(Path::new(reference.path())).map_err(|source| ResolveError::Io {
            reference: reference.clone(),
            source,
        })
    }
}

impl ModuleResolver for FileResolver {
    fn claims(&self, reference: &Reference) -> bool {
        reference.scheme() == "file"
    }

    fn resolve(&self, reference: &Reference) -> Result<ResolvedModule, ResolveError> {
        let source = self.read_file(reference)?;
        let base_dir = Path::new(reference.path())
            .parent()
            .map(Path::to_path_buf);
        Ok(ResolvedModule {
            reference: reference.clone(),
            source,
            base_dir,
        })
    }
}

impl ResourceReader for FileResolver {
    fn claims(&self, reference: &Reference) -> bool {
        reference.scheme() == "file"
    }

    fn read(&self, reference: &Reference) -> Result<String, ResolveError> {
        self.read_file(reference)
    }
}

/// Exposes a fixed set of environment variables under the `env:` scheme.
/// Only the variables handed to the session are visible.
pub struct EnvReader {
    vars: HashMap<String, String>,
}

impl EnvReader {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl ResourceReader for EnvReader {
    fn claims(&self, reference: &Reference) -> bool {
        reference.scheme() == "env"
    }

    fn read(&self, reference: &Reference) -> Result<String, ResolveError> {
        match self.vars.get(reference.path()) {
            Some(value) => Ok(value.clone()),
            None => Err(ResolveError::NotFound {
                reference: reference.clone(),
            }),
        }
    }
}

//=====================================================
// Section 3.0 - Resolution Chains
//=====================================================
// Security check first, then the first claiming resolver in registration
// order wins. Callers compose the chain to control shadowing.

pub struct ModuleResolution {
    security: Arc<SecurityManager>,
    resolvers: Vec<Box<dyn ModuleResolver>>,
}

impl ModuleResolution {
    pub fn new(security: Arc<SecurityManager>, resolvers: Vec<Box<dyn ModuleResolver>>) -> Self {
        Self {
            security,
            resolvers,
        }
    }

    pub fn security(&self) -> &SecurityManager {
        &self.security
    }

    pub fn resolve(
        &self,
        reference: &Reference,
    ) -> Result<(ResolvedModule, TrustLevel), ResolveError> {
        let trust = self.security.check_module(reference)?;
        for resolver in &self.resolvers {
            if resolver.claims(reference) {
                let resolved = resolver.resolve(reference)?;
                tracing::debug!(%reference, ?trust, "module resolved");
                return Ok((resolved, trust));
            }
        }
        Err(ResolveError::NotFound {
            reference: reference.clone(),
        })
    }
}

pub struct ResourceResolution {
    security: Arc<SecurityManager>,
    readers: Vec<Box<dyn ResourceReader>>,
}

impl ResourceResolution {
    pub fn new(security: Arc<SecurityManager>, readers: Vec<Box<dyn ResourceReader>>) -> Self {
        Self { security, readers }
    }

    pub fn read(&self, reference: &Reference) -> Result<(String, TrustLevel), ResolveError> {
        let trust = self.security.check_resource(reference)?;
        for reader in &self.readers {
            if reader.claims(reference) {
                let content = reader.read(reference)?;
                tracing::debug!(%reference, ?trust, "resource read");
                return Ok((content, trust));
            }
        }
        Err(ResolveError::NotFound {
            reference: reference.clone(),
        })
    }
}


//=====================================================
// End of file
//=====================================================
