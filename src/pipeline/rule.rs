//! A compiled rule: the node chain one named rule contributes to the graph.

use crate::pipeline::message::Message;
use crate::pipeline::node::{PipeNode, ProducerNode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A compiled pipeline.
///
/// `nodes` holds only the nodes this rule built itself, in chain order; a
/// producer, if any, is `nodes[0]`. `first`/`last` are the chain's entry
/// and exit, which may belong to a called rule when the chain begins or
/// ends with `@call`.
#[derive(Debug)]
pub struct PipeRule {
    name: String,
    file: PathBuf,
    nodes: Vec<PipeNode>,
    first: PipeNode,
    last: PipeNode,
}

impl PipeRule {
    pub(crate) fn new(
        name: String,
        file: PathBuf,
        nodes: Vec<PipeNode>,
        first: PipeNode,
        last: PipeNode,
    ) -> Self {
        Self {
            name,
            file,
            nodes,
            first,
            last,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule file that defined this rule
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn has_producer(&self) -> bool {
        self.first.is_producer()
    }

    pub fn producer(&self) -> Option<&Arc<ProducerNode>> {
        match &self.first {
            PipeNode::Producer(p) => Some(p),
            PipeNode::Filter(_) => None,
        }
    }

    pub fn nodes(&self) -> &[PipeNode] {
        &self.nodes
    }

    pub fn first(&self) -> &PipeNode {
        &self.first
    }

    pub fn last(&self) -> &PipeNode {
        &self.last
    }

    /// Inject `msg` at the entry node, as if it had arrived from upstream.
    pub fn feed(&self, msg: &Message) {
        tracing::trace!("Feeding rule `{}` at {}", self.name, self.first.topic());
        self.first.feed(msg);
    }
}
