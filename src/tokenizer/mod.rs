//=====================================================
// File: tokenizer.rs
//=====================================================
// Goal: Lexer for the configuration-module surface syntax
// Objective: Turn module source text into a token stream with positions
//            consumed by the recursive descent parser
//=====================================================

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    StringLit(String),
    IntLit(i64),
    Equals,
    Dot,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Amends,
    Import,
    As,
    Class,
    Function,
    Read,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TokenizeError {
    #[error("unexpected character `{ch}` at {position}")]
    UnexpectedChar { ch: char, position: Position },
    #[error("unterminated string literal starting at {position}")]
    UnterminatedString { position: Position },
    #[error("invalid escape sequence `\\{ch}` at {position}")]
    InvalidEscape { ch: char, position: Position },
    #[error("invalid integer literal `{text}` at {position}")]
    InvalidNumber { text: String, position: Position },
}

pub struct Tokenizer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_layout();
            let position = self.current_position();
            let Some(ch) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    position,
                });
                return Ok(tokens);
            };
            let kind = match ch {
                '=' => {
                    self.advance();
                    TokenKind::Equals
                }
                '.' => {
                    self.advance();
                    TokenKind::Dot
                }
                '{' => {
                    self.advance();
                    TokenKind::LeftBrace
                }
                '}' => {
                    self.advance();
                    TokenKind::RightBrace
                }
                '(' => {
                    self.advance();
                    TokenKind::LeftParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RightParen
                }
                '"' => self.scan_string(position)?,
                ch if ch.is_ascii_digit() => self.scan_number(position)?,
                ch if ch.is_ascii_alphabetic() || ch == '_' => self.scan_word(),
                other => {
                    return Err(TokenizeError::UnexpectedChar {
                        ch: other,
                        position,
                    });
                }
            };
            tokens.push(Token { kind, position });
        }
    }

    fn skip_layout(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn scan_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        match word.as_str() {
            "amends" => TokenKind::Amends,
            "import" => TokenKind::Import,
            "as" => TokenKind::As,
            "class" => TokenKind::Class,
            "function" => TokenKind::Function,
            "read" => TokenKind::Read,
            _ => TokenKind::Identifier(word),
        }
    }

    fn scan_number(&mut self, position: Position) -> Result<TokenKind, TokenizeError> {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let value = text
            .parse::<i64>()
            .map_err(|_| TokenizeError::InvalidNumber {
                text: text.clone(),
                position,
            })?;
        Ok(TokenKind::IntLit(value))
    }

    fn scan_string(&mut self, start: Position) -> Result<TokenKind, TokenizeError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(TokenizeError::UnterminatedString { position: start });
            };
            match ch {
                '"' => {
                    self.advance();
                    return Ok(TokenKind::StringLit(value));
                }
                '\n' => return Err(TokenizeError::UnterminatedString { position: start }),
                '\\' => {
                    self.advance();
                    let position = self.current_position();
                    let Some(escaped) = self.peek() else {
                        return Err(TokenizeError::UnterminatedString { position: start });
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        '\\' => value.push('\\'),
                        '"' => value.push('"'),
                        other => {
                            return Err(TokenizeError::InvalidEscape {
                                ch: other,
                                position,
                            });
                        }
                    }
                    self.advance();
                }
                other => {
                    value.push(other);
                    self.advance();
                }
            }
        }
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.index += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}


//=====================================================
// End of file
//=====================================================
