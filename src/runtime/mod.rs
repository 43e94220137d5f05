//=====================================================
// File: runtime.rs
//=====================================================
// Goal: Value model and module evaluator
// Objective: Evaluate parsed modules into values, routing every nested
//            module and resource reference through the security-checked
//            resolution chains and the bootstrap registry
//=====================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::ast::{
    ClassNode, DuplicateName, DuplicateNameCheck, IdentifierNode, Node, NodeVisitor, Span,
};
use crate::parser::{self, ParseError};
use crate::resolve::{ModuleResolution, Reference, ResolveError, ResourceResolution};
use crate::security::SecurityViolation;
use crate::stdlib::{BootstrapError, BootstrapRegistry, ModuleId, StdModule};

//=====================================================
// Section 1.0 - Values
//=====================================================

/// Runtime representation of an evaluated module or expression. Object
/// members keep declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Object(Vec<(String, Value)>),
    Class(Arc<ClassHandle>),
}

impl Value {
    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(members) => members
                .iter()
                .find(|(member, _)| member == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Object(_) => "object",
            Value::Class(_) => "class",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(value) => write!(f, "{value:?}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Object(members) => {
                f.write_str("{")?;
                for (index, (name, value)) in members.iter().enumerate() {
                    if index > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, " {name} = {value}")?;
                }
                f.write_str(" }")
            }
            Value::Class(class) => write!(f, "class {}", class.name),
        }
    }
}

/// Handle to a class declared by a module. Derived from the class body's
/// ordered property and method views.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassHandle {
    pub module: Reference,
    pub name: String,
    pub properties: Vec<String>,
    pub methods: Vec<String>,
}

impl ClassHandle {
    pub fn from_class(module: Reference, class: &ClassNode) -> Self {
        Self {
            module,
            name: class.name.clone(),
            properties: class
                .body
                .properties()
                .iter()
                .map(|property| property.name.clone())
                .collect(),
            methods: class
                .body
                .methods()
                .iter()
                .map(|method| method.name.clone())
                .collect(),
        }
    }
}

//=====================================================
// Section 2.0 - Errors and Diagnostics
//=====================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    pub module: Reference,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}, column {}", self.module, self.line, self.column)
    }
}

/// Rewrites the stack frame attached to evaluation diagnostics, e.g. to map
/// generated locations back to user-visible ones.
pub type FrameTransformer = Arc<dyn Fn(StackFrame) -> StackFrame + Send + Sync>;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Security(SecurityViolation),
    #[error(transparent)]
    Resolve(ResolveError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Duplicate(#[from] DuplicateName),
    #[error("cyclic module import through `{reference}`")]
    CyclicImport { reference: Reference },
    #[error("unknown name `{name}` in {frame}")]
    UnknownName { name: String, frame: StackFrame },
    #[error("expected {expected}, but found {found}")]
    ShapeMismatch { expected: String, found: String },
}

impl From<SecurityViolation> for EvalError {
    fn from(violation: SecurityViolation) -> Self {
        EvalError::Security(violation)
    }
}

// A security denial inside the chain surfaces as a security violation, not
// as a generic resolution failure.
impl From<ResolveError> for EvalError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Security(violation) => EvalError::Security(violation),
            other => EvalError::Resolve(other),
        }
    }
}

//=====================================================
// Section 3.0 - Module Evaluator
//=====================================================

/// Result of evaluating one module.
#[derive(Debug)]
pub struct ModuleOutput {
    pub value: Value,
    /// Reference named by the module's amends clause, if any. Used by the
    /// session's expected-output-shape check.
    pub amends: Option<Reference>,
}

/// Evaluates modules within one session. Borrows the session's resolution
/// chains; owns only its cycle-tracking state.
pub struct ModuleEvaluator<'a> {
    modules: &'a ModuleResolution,
    resources: &'a ResourceResolution,
    registry: Arc<BootstrapRegistry>,
    frame_transformer: Option<FrameTransformer>,
    in_progress: Vec<Reference>,
}

struct EvalScope<'s> {
    module: &'s Reference,
    base_dir: Option<&'s Path>,
    locals: &'s [(String, Value)],
    imports: &'s [(String, Value)],
    base: &'s [(String, Value)],
}

impl<'a> ModuleEvaluator<'a> {
    pub fn new(
        modules: &'a ModuleResolution,
        resources: &'a ResourceResolution,
        registry: Arc<BootstrapRegistry>,
        frame_transformer: Option<FrameTransformer>,
    ) -> Self {
        Self {
            modules,
            resources,
            registry,
            frame_transformer,
            in_progress: Vec::new(),
        }
    }

    pub fn evaluate(
        &mut self,
        reference: &Reference,
        source: &str,
        base_dir: Option<PathBuf>,
    ) -> Result<ModuleOutput, EvalError> {
        if self.in_progress.contains(reference) {
            return Err(EvalError::CyclicImport {
                reference: reference.clone(),
            });
        }
        self.in_progress.push(reference.clone());
        let result = self.evaluate_inner(reference, source, base_dir.as_deref());
        self.in_progress.pop();
        result
    }

    fn evaluate_inner(
        &mut self,
        reference: &Reference,
        source: &str,
        base_dir: Option<&Path>,
    ) -> Result<ModuleOutput, EvalError> {
        let module = parser::parse_module(source)?;
        DuplicateNameCheck.visit_module(&module)?;

        let mut amends_reference = None;
        let mut base: Vec<(String, Value)> = Vec::new();
        if let Some(amends) = &module.amends {
            let target = absolutize(Reference::new(&amends.reference), base_dir);
            let value = self.load_module_value(&target)?;
            base = match value {
                Value::Object(members) => members,
                other => {
                    return Err(EvalError::ShapeMismatch {
                        expected: format!("`{target}` to evaluate to an object"),
                        found: format!("a {}", other.type_name()),
                    });
                }
            };
            amends_reference = Some(target);
        }

        let mut imports: Vec<(String, Value)> = Vec::new();
        for import in &module.imports {
            let target = absolutize(Reference::new(&import.reference), base_dir);
            let value = self.load_module_value(&target)?;
            let name = import
                .alias
                .clone()
                .unwrap_or_else(|| default_import_name(&target));
            imports.push((name, value));
        }

        let mut locals: Vec<(String, Value)> = Vec::new();
        for member in &module.members {
            match member {
                Node::Property(property) => {
                    let value = {
                        let scope = EvalScope {
                            module: reference,
                            base_dir,
                            locals: &locals,
                            imports: &imports,
                            base: &base,
                        };
                        self.eval_expr(&property.value, &scope)?
                    };
                    locals.push((property.name.clone(), value));
                }
                Node::Class(class) => {
                    let handle = ClassHandle::from_class(reference.clone(), class);
                    locals.push((class.name.clone(), Value::Class(Arc::new(handle))));
                }
                // The parser only produces properties and classes at the top
                // level of a module.
                _ => {}
            }
        }

        let value = Value::Object(merge_members(base, locals));
        Ok(ModuleOutput {
            value,
            amends: amends_reference,
        })
    }

    /// Loads and evaluates the module behind `reference`, enforcing the
    /// security check at the point of access. Standard library modules go
    /// through the bootstrap registry and are evaluated at most once per
    /// process.
    fn load_module_value(&mut self, reference: &Reference) -> Result<Value, EvalError> {
        if reference.scheme() == "pkl" {
            self.modules.security().check_module(reference)?;
            if self.in_progress.contains(reference) {
                return Err(EvalError::CyclicImport {
                    reference: reference.clone(),
                });
            }
            let id = ModuleId::new(reference.path());
            let registry = Arc::clone(&self.registry);
            let module = registry.get_module(&id, || self.load_std_module(&id))?;
            return Ok(module.value.clone());
        }
        let (resolved, _trust) = self.modules.resolve(reference)?;
        let output = self.evaluate(&resolved.reference, &resolved.source, resolved.base_dir)?;
        Ok(output.value)
    }

    /// Returns the cached class handle for a member of a standard library
    /// module, bootstrapping the module through this session's chain on
    /// first use.
    pub fn std_class(
        &mut self,
        id: &ModuleId,
        name: &str,
    ) -> Result<Arc<ClassHandle>, BootstrapError> {
        let registry = Arc::clone(&self.registry);
        registry.get_class(id, name, || self.load_std_module(id))
    }

    fn load_std_module(&mut self, id: &ModuleId) -> Result<StdModule, BootstrapError> {
        let reference = id.reference();
        let load = |evaluator: &mut Self| -> Result<Value, EvalError> {
            let (resolved, _trust) = evaluator.modules.resolve(&reference)?;
            let output =
                evaluator.evaluate(&resolved.reference, &resolved.source, resolved.base_dir)?;
            Ok(output.value)
        };
        match load(self) {
            Ok(value) => Ok(StdModule {
                id: id.clone(),
                value,
            }),
            Err(error) => Err(BootstrapError::ModuleLoad {
                id: id.clone(),
                source: Box::new(error),
            }),
        }
    }

    fn eval_expr(&mut self, node: &Node, scope: &EvalScope<'_>) -> Result<Value, EvalError> {
        match node {
            Node::StringLit(literal) => Ok(Value::String(literal.value.clone())),
            Node::IntLit(literal) => Ok(Value::Int(literal.value)),
            Node::Identifier(identifier) => self.eval_identifier(identifier, scope),
            Node::Read(read) => {
                let reference = absolutize(Reference::new(&read.reference), scope.base_dir);
                let (content, _trust) = self.resources.read(&reference)?;
                Ok(Value::String(content))
            }
            Node::Object(object) => {
                let mut members = Vec::new();
                for member in &object.members {
                    if let Node::Property(property) = member {
                        let value = self.eval_expr(&property.value, scope)?;
                        members.push((property.name.clone(), value));
                    }
                }
                Ok(Value::Object(members))
            }
            other => Err(EvalError::Parse(ParseError::InvalidSyntax {
                message: "expected an expression".into(),
                position: other.span().start,
            })),
        }
    }

    fn eval_identifier(
        &mut self,
        identifier: &IdentifierNode,
        scope: &EvalScope<'_>,
    ) -> Result<Value, EvalError> {
        let head = &identifier.segments[0];
        let mut value = lookup(scope, head).ok_or_else(|| {
            self.unknown_name(identifier.segments.join("."), scope.module, identifier.span)
        })?;
        for segment in &identifier.segments[1..] {
            value = value.member(segment).ok_or_else(|| {
                self.unknown_name(identifier.segments.join("."), scope.module, identifier.span)
            })?;
        }
        Ok(value.clone())
    }

    fn unknown_name(&self, name: String, module: &Reference, span: Span) -> EvalError {
        let frame = StackFrame {
            module: module.clone(),
            line: span.start.line,
            column: span.start.column,
        };
        let frame = match &self.frame_transformer {
            Some(transform) => transform(frame),
            None => frame,
        };
        EvalError::UnknownName { name, frame }
    }
}

fn lookup<'s>(scope: &'s EvalScope<'_>, name: &str) -> Option<&'s Value> {
    find(scope.locals, name)
        .or_else(|| find(scope.imports, name))
        .or_else(|| find(scope.base, name))
}

fn find<'v>(members: &'v [(String, Value)], name: &str) -> Option<&'v Value> {
    members
        .iter()
        .rev()
        .find(|(member, _)| member == name)
        .map(|(_, value)| value)
}

/// Overlay locally declared members onto the amended base, preserving the
/// base's member order for overridden names.
fn merge_members(
    base: Vec<(String, Value)>,
    locals: Vec<(String, Value)>,
) -> Vec<(String, Value)> {
    let mut members = base;
    for (name, value) in locals {
        match members.iter_mut().find(|(member, _)| *member == name) {
            Some(slot) => slot.1 = value,
            None => members.push((name, value)),
        }
    }
    members
}

fn absolutize(reference: Reference, base_dir: Option<&Path>) -> Reference {
    if reference.scheme() == "file" {
        let path = Path::new(reference.path());
        if path.is_relative() {
            if let Some(base) = base_dir {
                return Reference::new(format!("file:{}", base.join(path).display()));
            }
        }
    }
    reference
}

fn default_import_name(reference: &Reference) -> String {
    let path = reference.path();
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".pkl").unwrap_or(name).to_string()
}


//=====================================================
// End of file
//=====================================================
