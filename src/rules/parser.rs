//! Recursive-descent parser for one rule file.
//!
//! ```text
//! file      := rule* EOF
//! rule      := IDENT "=>" (producer | node) ";"
//! producer  := "<" IDENT (":" params)? ">" ("|" node)?
//!            | "from" IDENT (":" params)? ("|" node)?
//! node      := "!"? IDENT "(" params? ")" ("|" node)?
//!            | "@" IDENT ("|" node)?
//! params    := param ("," param)*
//! param     := IDENT "=" (STRING | NUMBER)
//! ```
//!
//! `#import "path"` lines are comments to the grammar and are collected by
//! [`scan_imports`] instead.

use crate::rules::ast::{
    FilterDecl, Node, Param, ParamValue, ProducerDecl, RuleBody, RuleCallRef, RuleFile, RuleNode,
};
use crate::rules::error::{ParseError, ParseResult, SyntaxError};
use crate::rules::lexer::{tokenize, Position, Token, TokenKind};
use std::path::{Path, PathBuf};

const IMPORT_DIRECTIVE: &str = "#import";

/// Parse a single file's text. Imports are resolved relative to `path` but
/// not loaded; see [`crate::rules::imports::ImportResolver`] for that.
pub fn parse_source(path: &Path, src: &str) -> ParseResult<RuleFile> {
    let syntax = |source| ParseError::Syntax {
        file: path.to_path_buf(),
        source,
    };

    let imports = scan_imports(src)
        .map_err(syntax)?
        .into_iter()
        .map(|import| resolve_relative(path, &import))
        .collect();

    let tokens = tokenize(src).map_err(syntax)?;
    let rules = Grammar::new(&tokens).file().map_err(syntax)?;

    Ok(RuleFile {
        path: path.to_path_buf(),
        imports,
        rules,
    })
}

/// Collect the raw paths of every `#import "path"` line, in order.
pub fn scan_imports(src: &str) -> Result<Vec<String>, SyntaxError> {
    let mut imports = Vec::new();
    for (idx, line) in src.lines().enumerate() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix(IMPORT_DIRECTIVE) else {
            continue;
        };
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            // e.g. "#important", an ordinary comment
            continue;
        }
        let column = (line.len() - trimmed.len() + IMPORT_DIRECTIVE.len() + 1) as u32;
        let pos = Position {
            line: idx as u32 + 1,
            column,
        };
        let rest = rest.trim();
        let path = rest
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .filter(|p| !p.is_empty() && !p.contains('"'));
        match path {
            Some(p) => imports.push(p.to_string()),
            None => {
                return Err(SyntaxError::unexpected_token(
                    pos,
                    format!("import target `{rest}`"),
                    vec!["quoted file path".into()],
                ))
            }
        }
    }
    Ok(imports)
}

fn resolve_relative(from: &Path, import: &str) -> PathBuf {
    let import = Path::new(import);
    if import.is_absolute() {
        return import.to_path_buf();
    }
    match from.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(import),
        _ => import.to_path_buf(),
    }
}

/// One link of a chain before it is folded into the nested AST form.
enum Link {
    Filter {
        name: String,
        params: Vec<Param>,
        negated: bool,
    },
    Call(String),
}

struct Grammar<'t> {
    tokens: &'t [Token],
    idx: usize,
}

impl<'t> Grammar<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, idx: 0 }
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        let idx = self.idx.min(self.tokens.len() - 1);
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        &self.tokens[idx]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &[&str]) -> SyntaxError {
        let tok = self.peek();
        SyntaxError::unexpected_token(
            tok.pos,
            tok.kind.describe(),
            expected.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn expect(&mut self, kind: TokenKind, label: &str) -> Result<(), SyntaxError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(&[label]))
        }
    }

    fn ident(&mut self, label: &str) -> Result<(String, Position), SyntaxError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, tok.pos))
            }
            _ => Err(self.error(&[label])),
        }
    }

    fn file(&mut self) -> Result<Vec<RuleNode>, SyntaxError> {
        let mut rules = Vec::new();
        while !self.check(&TokenKind::Eof) {
            rules.push(self.rule()?);
        }
        Ok(rules)
    }

    fn rule(&mut self) -> Result<RuleNode, SyntaxError> {
        let (identifier, pos) = self.ident("rule name")?;
        self.expect(TokenKind::Arrow, "`=>`")?;

        let body = match self.peek().kind.clone() {
            TokenKind::ProducerOpen => {
                self.advance();
                let producer = self.producer(true)?;
                RuleBody::Producer(producer)
            }
            TokenKind::From => {
                self.advance();
                let producer = self.producer(false)?;
                RuleBody::Producer(producer)
            }
            TokenKind::Ident(_) | TokenKind::Bang | TokenKind::At => {
                RuleBody::Chain(self.chain()?)
            }
            _ => {
                return Err(self.error(&["`<`", "`from`", "filter", "`!`", "`@`"]));
            }
        };

        if !self.eat(&TokenKind::Semicolon) {
            return Err(self.error(&["`|`", "`;`"]));
        }

        Ok(RuleNode {
            identifier,
            pos,
            body,
        })
    }

    fn producer(&mut self, bracketed: bool) -> Result<ProducerDecl, SyntaxError> {
        let (name, _) = self.ident("producer name")?;
        let params = if self.eat(&TokenKind::Colon) {
            self.params()?
        } else {
            Vec::new()
        };
        if bracketed && !self.eat(&TokenKind::Gt) {
            return Err(self.error(&["`:`", "`,`", "`>`"]));
        }
        let next = if self.eat(&TokenKind::Pipe) {
            Some(Box::new(self.chain()?))
        } else {
            None
        };
        Ok(ProducerDecl { name, params, next })
    }

    /// Parse `node ("|" node)*` and fold it into the nested form.
    fn chain(&mut self) -> Result<Node, SyntaxError> {
        let mut links = vec![self.link()?];
        while self.eat(&TokenKind::Pipe) {
            links.push(self.link()?);
        }

        let mut next: Option<Box<Node>> = None;
        for link in links.into_iter().rev() {
            let node = match link {
                Link::Filter {
                    name,
                    params,
                    negated,
                } => Node::Filter(FilterDecl {
                    name,
                    params,
                    negated,
                    next,
                }),
                Link::Call(name) => Node::RuleCall(RuleCallRef { name, next }),
            };
            next = Some(Box::new(node));
        }
        // `links` had at least one element.
        next.map(|n| *n).ok_or_else(|| self.error(&["filter"]))
    }

    fn link(&mut self) -> Result<Link, SyntaxError> {
        if self.eat(&TokenKind::At) {
            let (name, _) = self.ident("rule name")?;
            return Ok(Link::Call(name));
        }

        let negated = self.eat(&TokenKind::Bang);
        if !matches!(self.peek().kind, TokenKind::Ident(_)) {
            let expected: &[&str] = if negated {
                &["filter name"]
            } else {
                &["filter name", "`!`", "`@`"]
            };
            return Err(self.error(expected));
        }
        let (name, _) = self.ident("filter name")?;
        self.expect(TokenKind::LParen, "`(`")?;
        let params = if self.check(&TokenKind::RParen) {
            Vec::new()
        } else {
            self.params()?
        };
        if !self.eat(&TokenKind::RParen) {
            return Err(self.error(&["`,`", "`)`"]));
        }
        Ok(Link::Filter {
            name,
            params,
            negated,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, SyntaxError> {
        let mut params = vec![self.param()?];
        while self.eat(&TokenKind::Comma) {
            params.push(self.param()?);
        }
        Ok(params)
    }

    fn param(&mut self) -> Result<Param, SyntaxError> {
        let (name, _) = self.ident("parameter name")?;
        self.expect(TokenKind::Equals, "`=`")?;
        let value = match &self.peek().kind {
            TokenKind::Str(s) => ParamValue::Str(s.clone()),
            TokenKind::Number(n) => ParamValue::Number(*n),
            _ => return Err(self.error(&["string", "number"])),
        };
        self.advance();
        Ok(Param { name, value })
    }
}
