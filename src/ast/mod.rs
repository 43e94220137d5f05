//=====================================================
// File: ast.rs
//=====================================================
// Goal: Syntax tree definitions for configuration modules
// Objective: Define immutable node types with spans, ordered children,
//            and single-dispatch visitor traversal
//=====================================================

use thiserror::Error;

use crate::tokenizer::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

//=====================================================
// Section 1.0 - Node Kinds
//=====================================================
// One variant per concrete syntax construct. Nodes own their children;
// every node carries the span it was parsed from.

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Module(ModuleNode),
    Amends(AmendsNode),
    Import(ImportNode),
    Class(ClassNode),
    ClassBody(ClassBodyNode),
    Property(PropertyNode),
    Method(MethodNode),
    StringLit(StringLitNode),
    IntLit(IntLitNode),
    Identifier(IdentifierNode),
    Read(ReadNode),
    Object(ObjectNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleNode {
    pub amends: Option<AmendsNode>,
    pub imports: Vec<ImportNode>,
    pub members: Vec<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmendsNode {
    pub reference: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportNode {
    pub reference: String,
    pub alias: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    pub name: String,
    pub body: ClassBodyNode,
    pub span: Span,
}

/// Container node for the members of a class declaration. The member list is
/// a mixture of property and method nodes in declaration order; it is always
/// present (an empty body is an empty list, never a missing one).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBodyNode {
    pub members: Vec<Node>,
    pub span: Span,
}

impl ClassBodyNode {
    pub fn new(members: Vec<Node>, span: Span) -> Self {
        Self { members, span }
    }

    /// Order-preserving view of the members that are properties.
    pub fn properties(&self) -> Vec<&PropertyNode> {
        self.members.iter().filter_map(Node::as_property).collect()
    }

    /// Order-preserving view of the members that are methods.
    pub fn methods(&self) -> Vec<&MethodNode> {
        self.members.iter().filter_map(Node::as_method).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyNode {
    pub name: String,
    pub value: Box<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub name: String,
    pub body: Box<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLitNode {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntLitNode {
    pub value: i64,
    pub span: Span,
}

/// A dotted name such as `Sublime` or `editor.urlScheme`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierNode {
    pub segments: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadNode {
    pub reference: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    pub members: Vec<Node>,
    pub span: Span,
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Module(node) => node.span,
            Node::Amends(node) => node.span,
            Node::Import(node) => node.span,
            Node::Class(node) => node.span,
            Node::ClassBody(node) => node.span,
            Node::Property(node) => node.span,
            Node::Method(node) => node.span,
            Node::StringLit(node) => node.span,
            Node::IntLit(node) => node.span,
            Node::Identifier(node) => node.span,
            Node::Read(node) => node.span,
            Node::Object(node) => node.span,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyNode> {
        match self {
            Node::Property(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodNode> {
        match self {
            Node::Method(node) => Some(node),
            _ => None,
        }
    }

    /// Dispatch to the one visitor operation matching this node's kind and
    /// return its result unchanged.
    pub fn accept<V: NodeVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Node::Module(node) => visitor.visit_module(node),
            Node::Amends(node) => visitor.visit_amends(node),
            Node::Import(node) => visitor.visit_import(node),
            Node::Class(node) => visitor.visit_class(node),
            Node::ClassBody(node) => visitor.visit_class_body(node),
            Node::Property(node) => visitor.visit_property(node),
            Node::Method(node) => visitor.visit_method(node),
            Node::StringLit(node) => visitor.visit_string_lit(node),
            Node::IntLit(node) => visitor.visit_int_lit(node),
            Node::Identifier(node) => visitor.visit_identifier(node),
            Node::Read(node) => visitor.visit_read(node),
            Node::Object(node) => visitor.visit_object(node),
        }
    }
}

//=====================================================
// Section 2.0 - Visitor Contract
//=====================================================

/// Single-dispatch visitor over the node kinds. The result type is chosen by
/// the visitor, not the node.
pub trait NodeVisitor {
    type Output;

    fn visit_module(&mut self, node: &ModuleNode) -> Self::Output;
    fn visit_amends(&mut self, node: &AmendsNode) -> Self::Output;
    fn visit_import(&mut self, node: &ImportNode) -> Self::Output;
    fn visit_class(&mut self, node: &ClassNode) -> Self::Output;
    fn visit_class_body(&mut self, node: &ClassBodyNode) -> Self::Output;
    fn visit_property(&mut self, node: &PropertyNode) -> Self::Output;
    fn visit_method(&mut self, node: &MethodNode) -> Self::Output;
    fn visit_string_lit(&mut self, node: &StringLitNode) -> Self::Output;
    fn visit_int_lit(&mut self, node: &IntLitNode) -> Self::Output;
    fn visit_identifier(&mut self, node: &IdentifierNode) -> Self::Output;
    fn visit_read(&mut self, node: &ReadNode) -> Self::Output;
    fn visit_object(&mut self, node: &ObjectNode) -> Self::Output;
}

//=====================================================
// Section 3.0 - Duplicate Name Check
//=====================================================

#[derive(Debug, Clone, PartialEq, Error)]
#[error("duplicate definition of `{name}` at {position}")]
pub struct DuplicateName {
    pub name: String,
    pub position: Position,
}

/// Rejects duplicate member names within a module, class body, or object
/// literal. Run before evaluation.
pub struct DuplicateNameCheck;

impl DuplicateNameCheck {
    fn check_members(&mut self, members: &[Node]) -> Result<(), DuplicateName> {
        let mut seen: Vec<&str> = Vec::new();
        for member in members {
            let name = match member {
                Node::Property(node) => Some(node.name.as_str()),
                Node::Method(node) => Some(node.name.as_str()),
                Node::Class(node) => Some(node.name.as_str()),
                _ => None,
            };
            if let Some(name) = name {
                if seen.contains(&name) {
                    return Err(DuplicateName {
                        name: name.to_string(),
                        position: member.span().start,
                    });
                }
                seen.push(name);
            }
            member.accept(self)?;
        }
        Ok(())
    }
}

impl NodeVisitor for DuplicateNameCheck {
    type Output = Result<(), DuplicateName>;

    fn visit_module(&mut self, node: &ModuleNode) -> Self::Output {
        self.check_members(&node.members)
    }

    fn visit_amends(&mut self, _node: &AmendsNode) -> Self::Output {
        Ok(())
    }

    fn visit_import(&mut self, _node: &ImportNode) -> Self::Output {
        Ok(())
    }

    fn visit_class(&mut self, node: &ClassNode) -> Self::Output {
        self.visit_class_body(&node.body)
    }

    fn visit_class_body(&mut self, node: &ClassBodyNode) -> Self::Output {
        self.check_members(&node.members)
    }

    fn visit_property(&mut self, node: &PropertyNode) -> Self::Output {
        node.value.accept(self)
    }

    fn visit_method(&mut self, node: &MethodNode) -> Self::Output {
        node.body.accept(self)
    }

    fn visit_string_lit(&mut self, _node: &StringLitNode) -> Self::Output {
        Ok(())
    }

    fn visit_int_lit(&mut self, _node: &IntLitNode) -> Self::Output {
        Ok(())
    }

    fn visit_identifier(&mut self, _node: &IdentifierNode) -> Self::Output {
        Ok(())
    }

    fn visit_read(&mut self, _node: &ReadNode) -> Self::Output {
        Ok(())
    }

    fn visit_object(&mut self, node: &ObjectNode) -> Self::Output {
        self.check_members(&node.members)
    }
}

//=====================================================
// End of file
//=====================================================
