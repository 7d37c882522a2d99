//! Tokenizer for rule files.
//!
//! Whitespace and `#` line comments are skipped (import directives are
//! comments as far as the grammar is concerned; see `imports.rs`). Every
//! other byte must start one of the token kinds below, otherwise lexing
//! fails with a positional [`SyntaxError`].

use crate::rules::error::SyntaxError;
use std::fmt;

/// Line/column position (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `=>` separating a rule name from its chain. Also accepted as the
    /// case-insensitive keyword `is`.
    Arrow,
    /// `<` opening a producer declaration.
    ProducerOpen,
    /// Case-insensitive keyword form of the producer marker; the declaration
    /// then has no closing `>`.
    From,
    Ident(String),
    Str(String),
    Number(f64),
    LBracket,
    RBracket,
    Pipe,
    Comma,
    Colon,
    Semicolon,
    LParen,
    RParen,
    Equals,
    Gt,
    Bang,
    At,
    Eof,
}

impl TokenKind {
    /// Short description used in "expected ..." error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Arrow => "`=>`".into(),
            TokenKind::ProducerOpen => "`<`".into(),
            TokenKind::From => "`from`".into(),
            TokenKind::Ident(s) => format!("identifier `{s}`"),
            TokenKind::Str(s) => format!("string \"{s}\""),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::LBracket => "`[`".into(),
            TokenKind::RBracket => "`]`".into(),
            TokenKind::Pipe => "`|`".into(),
            TokenKind::Comma => "`,`".into(),
            TokenKind::Colon => "`:`".into(),
            TokenKind::Semicolon => "`;`".into(),
            TokenKind::LParen => "`(`".into(),
            TokenKind::RParen => "`)`".into(),
            TokenKind::Equals => "`=`".into(),
            TokenKind::Gt => "`>`".into(),
            TokenKind::Bang => "`!`".into(),
            TokenKind::At => "`@`".into(),
            TokenKind::Eof => "end of file".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.offset + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b & 0xC0 != 0x80 {
            // Count characters, not UTF-8 continuation bytes.
            self.column += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                }
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_trivia();
        let pos = self.position();
        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos,
            });
        };

        let kind = match b {
            b'"' => self.string(pos)?,
            b'=' if self.peek_at(1) == Some(b'>') => {
                self.bump();
                self.bump();
                TokenKind::Arrow
            }
            b'-' | b'+' | b'.' | b'0'..=b'9' => self.number(pos)?,
            b if b.is_ascii_alphabetic() || b == b'_' => self.word(),
            _ => {
                let kind = match b {
                    b'[' => TokenKind::LBracket,
                    b']' => TokenKind::RBracket,
                    b'|' => TokenKind::Pipe,
                    b',' => TokenKind::Comma,
                    b':' => TokenKind::Colon,
                    b';' => TokenKind::Semicolon,
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b'=' => TokenKind::Equals,
                    b'<' => TokenKind::ProducerOpen,
                    b'>' => TokenKind::Gt,
                    b'!' => TokenKind::Bang,
                    b'@' => TokenKind::At,
                    _ => {
                        let found = self.char_at_offset();
                        return Err(SyntaxError::unexpected_char(pos, found));
                    }
                };
                self.bump();
                kind
            }
        };

        Ok(Token { kind, pos })
    }

    fn char_at_offset(&self) -> char {
        std::str::from_utf8(&self.src[self.offset..])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn word(&mut self) -> TokenKind {
        let start = self.offset;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.offset]).into_owned();
        if text.eq_ignore_ascii_case("is") {
            TokenKind::Arrow
        } else if text.eq_ignore_ascii_case("from") {
            TokenKind::From
        } else {
            TokenKind::Ident(text)
        }
    }

    fn string(&mut self, pos: Position) -> Result<TokenKind, SyntaxError> {
        self.bump(); // opening quote
        let mut buf = Vec::new();
        loop {
            match self.bump() {
                None => return Err(SyntaxError::unterminated_string(pos)),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'"') => buf.push(b'"'),
                    Some(b'\\') => buf.push(b'\\'),
                    Some(b'n') => buf.push(b'\n'),
                    Some(b't') => buf.push(b'\t'),
                    // Unknown escapes are kept verbatim so regex patterns like "\d" survive.
                    Some(other) => {
                        buf.push(b'\\');
                        buf.push(other);
                    }
                    None => return Err(SyntaxError::unterminated_string(pos)),
                },
                Some(other) => buf.push(other),
            }
        }
        Ok(TokenKind::Str(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn number(&mut self, pos: Position) -> Result<TokenKind, SyntaxError> {
        let start = self.offset;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.bump();
        }
        let mut digits = 0;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {
                    digits += 1;
                    self.bump();
                }
                b'.' => {
                    self.bump();
                }
                b'e' | b'E' if digits > 0 => {
                    self.bump();
                    if matches!(self.peek(), Some(b'-' | b'+')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.offset]).into_owned();
        if digits == 0 {
            return Err(SyntaxError::invalid_number(pos, text));
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| SyntaxError::invalid_number(pos, text))
    }
}

/// Convenience wrapper around [`Lexer::tokenize`].
pub fn tokenize(src: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(src).tokenize()
}
