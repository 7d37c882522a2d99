//! Compiled rule graph and its runtime.
//!
//! Every producer and filter instance owns a bus topic (`<type>:<id>`).
//! Compiling a rule subscribes each link to the topic of the link before it,
//! so at runtime a message travels:
//!
//! ```text
//! [timer:0] ──► bus ──► [text:1] ──► bus ──► [echo:2]
//!                            ▲
//!                 @call from another rule
//! ```
//!
//! # Design
//!
//! - **Explicit compiler context**: [`Ruleset`] owns the rules, the compiled
//!   file cache, the id counter and the bus; nothing is global.
//! - **Closed node kinds**: [`PipeNode`] is either a producer or a filter,
//!   decided when the node is built.
//! - **Per-topic dispatch**: each topic has its own queue and thread, so a
//!   slow filter only delays its own chain.
//! - **Explicit registry**: node types come from a [`NodeRegistry`] filled
//!   at startup.

pub mod bus;
pub mod compiler;
pub mod error;
pub mod id;
pub mod message;
pub mod node;
pub mod nodes;
pub mod orchestrator;
pub mod params;
pub mod registry;
pub mod rule;

pub use bus::{Bus, Handler};
pub use compiler::Ruleset;
pub use error::{NodeError, NodeResult, PipelineError, PipelineResult};
pub use id::{NodeId, NodeIdGen, Topic};
pub use message::Message;
pub use node::{Emitter, Filter, FilterNode, PipeNode, Producer, ProducerContext, ProducerNode};
pub use orchestrator::Orchestrator;
pub use params::{parse_duration, Params};
pub use registry::{FilterFactory, NodeRegistry, NodeType, ProducerFactory};
pub use rule::PipeRule;
