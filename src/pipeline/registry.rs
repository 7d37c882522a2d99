//! Registry of producer and filter types available to rule files.
//!
//! Populated explicitly at startup (`with_builtins`, then any `register_*`
//! calls) rather than by load-time side effects.

use crate::pipeline::error::NodeResult;
use crate::pipeline::node::{Filter, Producer};
use crate::pipeline::nodes;
use crate::pipeline::params::Params;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type ProducerFactory = Arc<dyn Fn(&Params) -> NodeResult<Box<dyn Producer>> + Send + Sync>;
pub type FilterFactory = Arc<dyn Fn(&Params) -> NodeResult<Box<dyn Filter>> + Send + Sync>;

/// Whether a type name denotes a producer or a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Producer,
    Filter,
}

#[derive(Clone, Default)]
pub struct NodeRegistry {
    producers: BTreeMap<String, ProducerFactory>,
    filters: BTreeMap<String, FilterFactory>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in node type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_producer(nodes::timer::TYPE_NAME, |params| {
            Ok(Box::new(nodes::TimerProducer::from_params(params)?))
        });
        registry.register_filter(nodes::echo::TYPE_NAME, |params| {
            Ok(Box::new(nodes::EchoFilter::from_params(params)))
        });
        registry.register_filter(nodes::text::TYPE_NAME, |params| {
            Ok(Box::new(nodes::TextFilter::from_params(params)?))
        });
        registry
    }

    /// Register (or replace) a producer type.
    pub fn register_producer<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Params) -> NodeResult<Box<dyn Producer>> + Send + Sync + 'static,
    {
        self.producers.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register (or replace) a filter type.
    pub fn register_filter<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Params) -> NodeResult<Box<dyn Filter>> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn producer(&self, name: &str) -> Option<&ProducerFactory> {
        self.producers.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterFactory> {
        self.filters.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<NodeType> {
        if self.producers.contains_key(name) {
            Some(NodeType::Producer)
        } else if self.filters.contains_key(name) {
            Some(NodeType::Filter)
        } else {
            None
        }
    }

    pub fn producer_names(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }

    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("producers", &self.producers.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}
