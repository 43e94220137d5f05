use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pklrt::resolve::{
    EnvReader, FileResolver, ModuleResolution, ModuleResolver, Reference, ResolveError,
    ResolvedModule, ResourceResolution, StandardLibraryResolver,
};
use pklrt::security::{SecurityManager, ViolationKind, compile_patterns};

struct StubResolver {
    scheme: &'static str,
    content: &'static str,
    consulted: Arc<AtomicBool>,
}

impl StubResolver {
    fn new(scheme: &'static str, content: &'static str) -> (Self, Arc<AtomicBool>) {
        let consulted = Arc::new(AtomicBool::new(false));
        (
            Self {
                scheme,
                content,
                consulted: Arc::clone(&consulted),
            },
            consulted,
        )
    }
}

impl ModuleResolver for StubResolver {
    fn claims(&self, reference: &Reference) -> bool {
        self.consulted.store(true, Ordering::SeqCst);
        reference.scheme() == self.scheme
    }

    fn resolve(&self, reference: &Reference) -> Result<ResolvedModule, ResolveError> {
        Ok(ResolvedModule {
            reference: reference.clone(),
            source: self.content.to_string(),
            base_dir: None,
        })
    }
}

fn permissive() -> Arc<SecurityManager> {
    Arc::new(SecurityManager::permissive())
}

#[test]
fn first_registered_resolver_wins_the_claim() {
    let (first, _) = StubResolver::new("stub", "first = 1");
    let (second, _) = StubResolver::new("stub", "second = 2");
    let chain = ModuleResolution::new(permissive(), vec![Box::new(first), Box::new(second)]);

    let (resolved, _trust) = chain.resolve(&Reference::new("stub:module")).expect("resolve");
    assert_eq!(resolved.source, "first = 1");
}

#[test]
fn registration_order_controls_shadowing_regardless_of_content() {
    let (first, _) = StubResolver::new("stub", "second = 2");
    let (second, _) = StubResolver::new("stub", "first = 1");
    let chain = ModuleResolution::new(permissive(), vec![Box::new(first), Box::new(second)]);

    let (resolved, _trust) = chain.resolve(&Reference::new("stub:module")).expect("resolve");
    assert_eq!(resolved.source, "second = 2");
}

#[test]
fn denied_reference_never_reaches_a_resolver() {
    let (stub, consulted) = StubResolver::new("stub", "x = 1");
    let deny_all = Arc::new(SecurityManager::standard(Vec::new(), Vec::new()));
    let chain = ModuleResolution::new(deny_all, vec![Box::new(stub)]);

    let error = chain.resolve(&Reference::new("stub:module")).unwrap_err();
    match error {
        ResolveError::Security(violation) => {
            assert_eq!(violation.kind, ViolationKind::ModuleDenied)
        }
        other => panic!("expected a security violation, found {other:?}"),
    }
    assert!(!consulted.load(Ordering::SeqCst));
}

#[test]
fn unclaimed_reference_is_not_found_rather_than_denied() {
    let (stub, _) = StubResolver::new("stub", "x = 1");
    let chain = ModuleResolution::new(permissive(), vec![Box::new(stub)]);

    let error = chain.resolve(&Reference::new("other:module")).unwrap_err();
    assert!(matches!(error, ResolveError::NotFound { .. }));
}

#[test]
fn standard_library_resolver_claims_only_pkl() {
    let resolver = StandardLibraryResolver;
    assert!(resolver.claims(&Reference::new("pkl:settings")));
    assert!(!resolver.claims(&Reference::new("file:/settings.pkl")));

    let resolved = resolver.resolve(&Reference::new("pkl:settings")).expect("resolve");
    assert!(resolved.source.contains("editor = System"));

    let error = resolver.resolve(&Reference::new("pkl:unknown")).unwrap_err();
    assert!(matches!(error, ResolveError::NotFound { .. }));
}

#[test]
fn file_resolver_reports_io_failures_distinct_from_denials() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.pkl");
    let chain = ModuleResolution::new(permissive(), vec![Box::new(FileResolver)]);

    let error = chain
        .resolve(&Reference::new(format!("file:{}", missing.display())))
        .unwrap_err();
    assert!(matches!(error, ResolveError::Io { .. }));
}

#[test]
fn file_resolver_loads_module_content_and_base_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("app.pkl");
    let mut file = std::fs::File::create(&path).expect("create");
    writeln!(file, "x = 1").expect("write");

    let chain = ModuleResolution::new(permissive(), vec![Box::new(FileResolver)]);
    let (resolved, _trust) = chain
        .resolve(&Reference::new(format!("file:{}", path.display())))
        .expect("resolve");
    assert_eq!(resolved.source.trim(), "x = 1");
    assert_eq!(resolved.base_dir.as_deref(), Some(dir.path()));
}

#[test]
fn env_reader_exposes_only_the_session_variables() {
    let mut vars = HashMap::new();
    vars.insert("VISIBLE".to_string(), "yes".to_string());
    let chain = ResourceResolution::new(permissive(), vec![Box::new(EnvReader::new(vars))]);

    let (content, _trust) = chain.read(&Reference::new("env:VISIBLE")).expect("read");
    assert_eq!(content, "yes");

    let error = chain.read(&Reference::new("env:HIDDEN")).unwrap_err();
    assert!(matches!(error, ResolveError::NotFound { .. }));
}

#[test]
fn resource_check_uses_the_resource_list() {
    let modules_only = Arc::new(SecurityManager::standard(
        compile_patterns(&["env:"]).expect("patterns"),
        Vec::new(),
    ));
    let chain = ResourceResolution::new(
        modules_only,
        vec![Box::new(EnvReader::new(HashMap::new()))],
    );

    let error = chain.read(&Reference::new("env:HOME")).unwrap_err();
    match error {
        ResolveError::Security(violation) => {
            assert_eq!(violation.kind, ViolationKind::ResourceDenied)
        }
        other => panic!("expected a security violation, found {other:?}"),
    }
}
