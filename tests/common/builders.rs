//! Test data builders for creating engines from in-memory rule files

use ruleflow::pipeline::{FilterFactory, NodeRegistry, Orchestrator, ProducerFactory};
use ruleflow::rules::{ImportResolver, MemoryLoader, ParseResult};
use ruleflow::{EngineConfig, ParsedFiles};
use std::path::PathBuf;

/// Builder for an orchestrator over in-memory rule files
pub struct EngineBuilder {
    loader: MemoryLoader,
    entries: Vec<PathBuf>,
    registry: NodeRegistry,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            loader: MemoryLoader::new(),
            entries: Vec::new(),
            registry: NodeRegistry::with_builtins(),
            config: EngineConfig::default(),
        }
    }

    /// Add an entry rule file
    pub fn file(mut self, path: &str, src: &str) -> Self {
        self.loader.insert(path, src);
        self.entries.push(PathBuf::from(path));
        self
    }

    /// Add a file that is only reachable through `#import`
    pub fn library(mut self, path: &str, src: &str) -> Self {
        self.loader.insert(path, src);
        self
    }

    pub fn filter(mut self, name: &str, factory: FilterFactory) -> Self {
        self.registry.register_filter(name, move |params| factory(params));
        self
    }

    pub fn producer(mut self, name: &str, factory: ProducerFactory) -> Self {
        self.registry.register_producer(name, move |params| factory(params));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn parse(&self) -> ParseResult<ParsedFiles> {
        ImportResolver::new(self.loader.clone()).resolve_all(&self.entries)
    }

    pub fn build(self) -> ruleflow::Result<Orchestrator> {
        let files = self.parse()?;
        Ok(Orchestrator::from_files(&files, self.config, self.registry)?)
    }
}
