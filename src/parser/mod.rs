//=====================================================
// File: parser.rs
//=====================================================
// Goal: Recursive descent parser for configuration modules
// Objective: Transform token streams into syntax nodes consumed by the
//            evaluation session
//=====================================================

use thiserror::Error;

use crate::ast::{
    AmendsNode, ClassBodyNode, ClassNode, IdentifierNode, ImportNode, IntLitNode, MethodNode,
    ModuleNode, Node, ObjectNode, PropertyNode, ReadNode, Span, StringLitNode,
};
use crate::tokenizer::{Position, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected} but found {found:?} at {position}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        position: Position,
    },
    #[error("expected {expected} but reached the end of input at {position}")]
    UnexpectedEndOfInput {
        expected: String,
        position: Position,
    },
    #[error("{message} at {position}")]
    InvalidSyntax { message: String, position: Position },
}

/// Recursive descent parser over the token stream produced by the tokenizer.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse a complete module: an optional amends clause, imports, then
    /// property and class declarations.
    pub fn parse(&mut self) -> Result<ModuleNode, ParseError> {
        let start = self.current_position();

        let amends = if matches!(self.peek_kind(), TokenKind::Amends) {
            Some(self.parse_amends()?)
        } else {
            None
        };

        let mut imports = Vec::new();
        while matches!(self.peek_kind(), TokenKind::Import) {
            imports.push(self.parse_import()?);
        }

        let mut members = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::Eof) {
            members.push(self.parse_declaration()?);
        }

        let span = Span::new(start, self.current_position());
        Ok(ModuleNode {
            amends,
            imports,
            members,
            span,
        })
    }

    fn parse_amends(&mut self) -> Result<AmendsNode, ParseError> {
        let start = self.current_position();
        self.advance(); // amends
        let reference = self.expect_string("a module reference after `amends`")?;
        Ok(AmendsNode {
            reference,
            span: Span::new(start, self.previous_position()),
        })
    }

    fn parse_import(&mut self) -> Result<ImportNode, ParseError> {
        let start = self.current_position();
        self.advance(); // import
        let reference = self.expect_string("a module reference after `import`")?;
        let alias = if matches!(self.peek_kind(), TokenKind::As) {
            self.advance();
            Some(self.expect_identifier("an alias name after `as`")?)
        } else {
            None
        };
        Ok(ImportNode {
            reference,
            alias,
            span: Span::new(start, self.previous_position()),
        })
    }

    fn parse_declaration(&mut self) -> Result<Node, ParseError> {
        match self.peek_kind() {
            TokenKind::Class => self.parse_class().map(Node::Class),
            TokenKind::Identifier(_) => self.parse_property().map(Node::Property),
            _ => {
                let token = self.peek();
                Err(ParseError::UnexpectedToken {
                    expected: "a property or class declaration".into(),
                    found: token.kind.clone(),
                    position: token.position,
                })
            }
        }
    }

    fn parse_class(&mut self) -> Result<ClassNode, ParseError> {
        let start = self.current_position();
        self.advance(); // class
        let name = self.expect_identifier("a class name")?;
        self.expect_left_brace("`{` to open the class body")?;

        let body_start = self.previous_position();
        let mut members = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Function => members.push(Node::Method(self.parse_method()?)),
                TokenKind::Identifier(_) => members.push(Node::Property(self.parse_property()?)),
                _ => {
                    let token = self.peek();
                    return Err(ParseError::UnexpectedToken {
                        expected: "a property, a method, or `}`".into(),
                        found: token.kind.clone(),
                        position: token.position,
                    });
                }
            }
        }

        let body = ClassBodyNode::new(members, Span::new(body_start, self.previous_position()));
        Ok(ClassNode {
            name,
            body,
            span: Span::new(start, self.previous_position()),
        })
    }

    fn parse_method(&mut self) -> Result<MethodNode, ParseError> {
        let start = self.current_position();
        self.advance(); // function
        let name = self.expect_identifier("a method name")?;
        self.expect_token(TokenKind::LeftParen, "`(`")?;
        self.expect_token(TokenKind::RightParen, "`)`")?;
        self.expect_token(TokenKind::Equals, "`=` before the method body")?;
        let body = self.parse_expression()?;
        Ok(MethodNode {
            name,
            body: Box::new(body),
            span: Span::new(start, self.previous_position()),
        })
    }

    fn parse_property(&mut self) -> Result<PropertyNode, ParseError> {
        let start = self.current_position();
        let name = self.expect_identifier("a property name")?;
        // `name { ... }` is shorthand for `name = { ... }`
        let value = match self.peek_kind() {
            TokenKind::LeftBrace => self.parse_object()?,
            TokenKind::Equals => {
                self.advance();
                self.parse_expression()?
            }
            _ => {
                let token = self.peek();
                return Err(ParseError::UnexpectedToken {
                    expected: "`=` or `{` after a property name".into(),
                    found: token.kind.clone(),
                    position: token.position,
                });
            }
        };
        Ok(PropertyNode {
            name,
            value: Box::new(value),
            span: Span::new(start, self.previous_position()),
        })
    }

    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        let position = self.current_position();
        match self.peek_kind().clone() {
            TokenKind::StringLit(value) => {
                self.advance();
                Ok(Node::StringLit(StringLitNode {
                    value,
                    span: Span::new(position, self.previous_position()),
                }))
            }
            TokenKind::IntLit(value) => {
                self.advance();
                Ok(Node::IntLit(IntLitNode {
                    value,
                    span: Span::new(position, self.previous_position()),
                }))
            }
            TokenKind::Read => {
                self.advance();
                self.expect_token(TokenKind::LeftParen, "`(` after `read`")?;
                let reference = self.expect_string("a resource reference")?;
                self.expect_token(TokenKind::RightParen, "`)` after the resource reference")?;
                Ok(Node::Read(ReadNode {
                    reference,
                    span: Span::new(position, self.previous_position()),
                }))
            }
            TokenKind::LeftBrace => self.parse_object(),
            TokenKind::Identifier(_) => {
                let mut segments = vec![self.expect_identifier("a name")?];
                while matches!(self.peek_kind(), TokenKind::Dot) {
                    self.advance();
                    segments.push(self.expect_identifier("a member name after `.`")?);
                }
                Ok(Node::Identifier(IdentifierNode {
                    segments,
                    span: Span::new(position, self.previous_position()),
                }))
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEndOfInput {
                expected: "an expression".into(),
                position,
            }),
            found => Err(ParseError::UnexpectedToken {
                expected: "an expression".into(),
                found,
                position,
            }),
        }
    }

    fn parse_object(&mut self) -> Result<Node, ParseError> {
        let start = self.current_position();
        self.expect_left_brace("`{` to open an object")?;
        let mut members = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Identifier(_) => members.push(Node::Property(self.parse_property()?)),
                _ => {
                    let token = self.peek();
                    return Err(ParseError::UnexpectedToken {
                        expected: "a property or `}`".into(),
                        found: token.kind.clone(),
                        position: token.position,
                    });
                }
            }
        }
        Ok(Node::Object(ObjectNode {
            members,
            span: Span::new(start, self.previous_position()),
        }))
    }

    //=====================================================
    // Token Navigation
    //=====================================================

    fn peek(&self) -> &Token {
        // The tokenizer always terminates the stream with an Eof token.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn current_position(&self) -> Position {
        self.peek().position
    }

    fn previous_position(&self) -> Position {
        if self.current == 0 {
            return self.current_position();
        }
        self.tokens[self.current - 1].position
    }

    fn advance(&mut self) {
        if self.current < self.tokens.len() {
            self.current += 1;
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEndOfInput {
                expected: expected.into(),
                position: self.current_position(),
            }),
            found => Err(ParseError::UnexpectedToken {
                expected: expected.into(),
                found,
                position: self.current_position(),
            }),
        }
    }

    fn expect_string(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::StringLit(value) => {
                self.advance();
                Ok(value)
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEndOfInput {
                expected: expected.into(),
                position: self.current_position(),
            }),
            found => Err(ParseError::UnexpectedToken {
                expected: expected.into(),
                found,
                position: self.current_position(),
            }),
        }
    }

    fn expect_left_brace(&mut self, expected: &str) -> Result<(), ParseError> {
        self.expect_token(TokenKind::LeftBrace, expected)
    }

    fn expect_token(&mut self, kind: TokenKind, expected: &str) -> Result<(), ParseError> {
        if *self.peek_kind() == kind {
            self.advance();
            Ok(())
        } else {
            match self.peek_kind().clone() {
                TokenKind::Eof => Err(ParseError::UnexpectedEndOfInput {
                    expected: expected.into(),
                    position: self.current_position(),
                }),
                found => Err(ParseError::UnexpectedToken {
                    expected: expected.into(),
                    found,
                    position: self.current_position(),
                }),
            }
        }
    }
}

/// Tokenize and parse module source in one step.
pub fn parse_module(source: &str) -> Result<ModuleNode, ParseError> {
    let tokens = crate::tokenizer::Tokenizer::new(source)
        .tokenize()
        .map_err(|error| ParseError::InvalidSyntax {
            message: error.to_string(),
            position: tokenize_error_position(&error),
        })?;
    Parser::new(tokens).parse()
}

fn tokenize_error_position(error: &crate::tokenizer::TokenizeError) -> Position {
    use crate::tokenizer::TokenizeError::*;
    match error {
        UnexpectedChar { position, .. }
        | UnterminatedString { position }
        | InvalidEscape { position, .. }
        | InvalidNumber { position, .. } => *position,
    }
}


//=====================================================
// End of file
//=====================================================
