//! The rule language: lexer, parse tree, parser and import resolution.
//!
//! A rule file is a sequence of `;`-terminated statements:
//!
//! ```text
//! #import "common.rules"
//!
//! # every second, log the tick unless it matches "foo"
//! greet => <timer: freq="1s"> | !text(pattern="foo") | @shout;
//! shout => echo(prefix="tick");
//! ```

pub mod ast;
pub mod error;
pub mod imports;
pub mod lexer;
pub mod parser;

pub use ast::{
    FilterDecl, Node, Param, ParamValue, ProducerDecl, RuleBody, RuleCallRef, RuleFile, RuleNode,
};
pub use error::{ParseError, ParseResult, SyntaxError};
pub use imports::{FsLoader, ImportResolver, MemoryLoader, ParsedFiles, SourceLoader};
pub use lexer::{Position, Token, TokenKind};
pub use parser::parse_source;
