//=====================================================
// File: security.rs
//=====================================================
// Goal: Allow-list security policy for module and resource references
// Objective: Decide whether a reference may be resolved and at what
//            trust level, before any resolver sees it
//=====================================================

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::resolve::Reference;

/// Privilege tier attached to a permitted reference. Governs which further
/// capabilities a loaded module may exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    Untrusted,
    Trusted,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    ModuleDenied,
    ResourceDenied,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::ModuleDenied => f.write_str("module"),
            ViolationKind::ResourceDenied => f.write_str("resource"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} `{reference}` is not allowed by the security policy")]
pub struct SecurityViolation {
    pub kind: ViolationKind,
    pub reference: Reference,
}

/// Override from reference to trust level, consulted before the per-scheme
/// defaults.
pub type TrustOverride = Arc<dyn Fn(&Reference) -> Option<TrustLevel> + Send + Sync>;

/// Immutable allow-list policy shared by every resolution performed within
/// one evaluation session. A reference is permitted iff at least one pattern
/// in the relevant list matches a prefix of it; an empty list denies all
/// references of that kind.
#[derive(Clone)]
pub struct SecurityManager {
    allowed_modules: Vec<Regex>,
    allowed_resources: Vec<Regex>,
    trust_override: Option<TrustOverride>,
}

impl fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityManager")
            .field("allowed_modules", &self.allowed_modules)
            .field("allowed_resources", &self.allowed_resources)
            .field("trust_override", &self.trust_override.is_some())
            .finish()
    }
}

impl SecurityManager {
    pub fn standard(allowed_modules: Vec<Regex>, allowed_resources: Vec<Regex>) -> Self {
        Self {
            allowed_modules,
            allowed_resources,
            trust_override: None,
        }
    }

    /// Permits every module and resource reference. Used when a session is
    /// built without an explicit policy.
    pub fn permissive() -> Self {
        let anything = compile_patterns(&[""]).expect("the empty pattern is valid");
        Self {
            allowed_modules: anything.clone(),
            allowed_resources: anything,
            trust_override: None,
        }
    }

    pub fn with_trust_override(mut self, trust_override: TrustOverride) -> Self {
        self.trust_override = Some(trust_override);
        self
    }

    pub fn check_module(&self, reference: &Reference) -> Result<TrustLevel, SecurityViolation> {
        self.check(reference, &self.allowed_modules, ViolationKind::ModuleDenied)
    }

    pub fn check_resource(&self, reference: &Reference) -> Result<TrustLevel, SecurityViolation> {
        self.check(
            reference,
            &self.allowed_resources,
            ViolationKind::ResourceDenied,
        )
    }

    fn check(
        &self,
        reference: &Reference,
        allowed: &[Regex],
        kind: ViolationKind,
    ) -> Result<TrustLevel, SecurityViolation> {
        let permitted = allowed
            .iter()
            .any(|pattern| looking_at(pattern, reference.as_str()));
        if !permitted {
            tracing::debug!(%reference, %kind, "reference denied");
            return Err(SecurityViolation {
                kind,
                reference: reference.clone(),
            });
        }
        Ok(self.trust_level(reference))
    }

    fn trust_level(&self, reference: &Reference) -> TrustLevel {
        if let Some(trust_override) = &self.trust_override {
            if let Some(level) = trust_override(reference) {
                return level;
            }
        }
        default_trust_level(reference)
    }
}

/// Per-scheme default trust mapping, used when no override claims the
/// reference. Unknown schemes fall back to the untrusted baseline.
pub fn default_trust_level(reference: &Reference) -> TrustLevel {
    match reference.scheme() {
        "pkl" => TrustLevel::System,
        "file" | "repl" => TrustLevel::Trusted,
        _ => TrustLevel::Untrusted,
    }
}

// Same prefix semantics as java.util.regex lookingAt: the match must begin
// at the start of the reference but need not span all of it.
fn looking_at(pattern: &Regex, text: &str) -> bool {
    pattern.find(text).is_some_and(|found| found.start() == 0)
}

/// Compile a list of allow-list patterns.
pub fn compile_patterns(patterns: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|pattern| Regex::new(pattern)).collect()
}


//=====================================================
// End of file
//=====================================================
