//! # ruleflow: rule-driven event pipelines
//!
//! Rule files describe chains of event sources (producers) and
//! predicates/transforms (filters). The engine parses them, compiles every
//! rule into a graph of publish/subscribe links and runs the producers.
//!
//! ## Architecture
//!
//! - **Rules**: lexer, parse tree, parser and `#import` resolution
//! - **Pipeline**: compiler, dispatch bus, node contracts, built-in nodes and
//!   the producer orchestrator
//! - **Config**: TOML engine configuration and per-node parameter merging
//!
//! ## Example
//!
//! ```no_run
//! use ruleflow::{
//!     config::EngineConfig,
//!     pipeline::{NodeRegistry, Orchestrator},
//!     rules::ImportResolver,
//! };
//! use std::path::Path;
//!
//! fn main() -> ruleflow::Result<()> {
//!     let files = ImportResolver::from_disk().resolve(Path::new("main.rules"))?;
//!     let orchestrator =
//!         Orchestrator::from_files(&files, EngineConfig::default(), NodeRegistry::with_builtins())?;
//!
//!     orchestrator.start_feeders()?;
//!     orchestrator.wait_feeders();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod rules;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{EngineError, Result, ResultExt};
pub use pipeline::{Message, NodeRegistry, Orchestrator, PipeRule, Ruleset};
pub use rules::{ImportResolver, ParsedFiles, RuleFile};
