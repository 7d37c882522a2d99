//! Pipeline-specific error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling rules into the dispatch graph or while
/// managing producer lifecycles.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Rule has no name")]
    EmptyRuleName,

    #[error("Rule `{0}` is already defined")]
    DuplicateRule(String),

    #[error("Rule `{0}` is not defined (rules must be defined or imported before they are called)")]
    UnresolvedRuleCall(String),

    #[error("Rule `{0}` contains a producer and cannot be here")]
    ProducerInRuleCall(String),

    #[error("Calling rule `{0}` here would route messages back into it")]
    CyclicRuleCall(String),

    #[error("Unknown producer type `{0}`")]
    UnknownProducer(String),

    #[error("Unknown filter type `{0}`")]
    UnknownFilter(String),

    #[error("Cannot construct `{node}`: {source}")]
    NodeConstruction {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error("Cyclic dependency on `{}`", .0.display())]
    CyclicDependency(PathBuf),

    #[error("`{}` depends on `{}`, which was not parsed", .file.display(), .dependency.display())]
    MissingDependency { file: PathBuf, dependency: PathBuf },

    #[error("In {} rule `{rule}`: {source}", .file.display())]
    InRule {
        file: PathBuf,
        rule: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Failed to start producer of rule `{rule}`: {source}")]
    ProducerStart {
        rule: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Attach the owning file and rule name.
    pub fn in_rule(self, file: impl Into<PathBuf>, rule: impl Into<String>) -> Self {
        PipelineError::InRule {
            file: file.into(),
            rule: rule.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with any `InRule` wrapping removed.
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::InRule { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors produced by producer/filter implementations, either while being
/// constructed from their parameters or while handling an event.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("missing required parameter `{0}`")]
    MissingParam(String),

    #[error("invalid value `{value}` for parameter `{name}`: {reason}")]
    InvalidParam {
        name: String,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    pub fn invalid(name: &str, value: &str, reason: impl ToString) -> Self {
        NodeError::InvalidParam {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type NodeResult<T> = std::result::Result<T, NodeError>;
