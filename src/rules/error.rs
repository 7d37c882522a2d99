//! Errors raised while reading rule files.

use crate::rules::lexer::Position;
use std::path::PathBuf;
use thiserror::Error;

/// A positional lexing or grammar error inside one file.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{pos}: {message}{}", expected_suffix(.expected))]
pub struct SyntaxError {
    pub pos: Position,
    pub message: String,
    /// What the grammar would have accepted at `pos`.
    pub expected: Vec<String>,
}

fn expected_suffix(expected: &[String]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        format!(" (expected one of: {})", expected.join(", "))
    }
}

impl SyntaxError {
    pub fn unexpected_char(pos: Position, found: char) -> Self {
        Self {
            pos,
            message: format!("unexpected character `{found}`"),
            expected: Vec::new(),
        }
    }

    pub fn unterminated_string(pos: Position) -> Self {
        Self {
            pos,
            message: "unterminated string literal".into(),
            expected: Vec::new(),
        }
    }

    pub fn invalid_number(pos: Position, text: String) -> Self {
        Self {
            pos,
            message: format!("invalid number `{text}`"),
            expected: Vec::new(),
        }
    }

    pub fn unexpected_token(pos: Position, found: String, expected: Vec<String>) -> Self {
        Self {
            pos,
            message: format!("unexpected {found}"),
            expected,
        }
    }
}

/// Errors from parsing one file or resolving a tree of imports.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("syntax error in {}: {source}", .file.display())]
    Syntax {
        file: PathBuf,
        #[source]
        source: SyntaxError,
    },

    #[error("cyclic dependency on `{}`", .file.display())]
    CyclicDependency { file: PathBuf },

    #[error("`{}` imports `{}`, which cannot be read: {source}", .file.display(), .import.display())]
    MissingImport {
        file: PathBuf,
        import: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read rule file `{}`: {source}", .file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;
