//! Parse tree for rule files.
//!
//! Produced by the parser, consumed once by the compiler, then dropped.

use crate::rules::lexer::Position;
use std::fmt;
use std::path::PathBuf;

/// One parsed rule file together with its direct imports.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFile {
    pub path: PathBuf,
    /// Import targets, already resolved relative to `path`, in file order.
    pub imports: Vec<PathBuf>,
    pub rules: Vec<RuleNode>,
}

/// `name => <producer> | chain ;` or `name => chain ;`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleNode {
    pub identifier: String,
    pub pos: Position,
    pub body: RuleBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleBody {
    Producer(ProducerDecl),
    /// A filter-only fragment, reachable only through a rule-call.
    Chain(Node),
}

impl RuleNode {
    pub fn producer(&self) -> Option<&ProducerDecl> {
        match &self.body {
            RuleBody::Producer(p) => Some(p),
            RuleBody::Chain(_) => None,
        }
    }

    /// First link after the producer (if any).
    pub fn first_node(&self) -> Option<&Node> {
        match &self.body {
            RuleBody::Producer(p) => p.next.as_deref(),
            RuleBody::Chain(n) => Some(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducerDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub next: Option<Box<Node>>,
}

/// A single link in a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Filter(FilterDecl),
    RuleCall(RuleCallRef),
}

impl Node {
    pub fn next(&self) -> Option<&Node> {
        match self {
            Node::Filter(f) => f.next.as_deref(),
            Node::RuleCall(r) => r.next.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub negated: bool,
    pub next: Option<Box<Node>>,
}

/// `@name`: splices another rule's chain in at this point.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCallRef {
    pub name: String,
    pub next: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Number(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            ParamValue::Number(n) => write!(f, "{n}"),
        }
    }
}
