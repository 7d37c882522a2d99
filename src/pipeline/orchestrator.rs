//! Producer lifecycle for a compiled ruleset.
//!
//! The orchestrator starts, stops and waits on the producer of every root
//! rule (a rule whose chain begins with `<producer>`). Filters need no
//! lifecycle: they run on the bus dispatchers whenever upstream publishes.

use crate::config::EngineConfig;
use crate::pipeline::compiler::Ruleset;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::ProducerNode;
use crate::pipeline::registry::NodeRegistry;
use crate::pipeline::rule::PipeRule;
use crate::rules::ParsedFiles;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct Orchestrator {
    ruleset: Ruleset,
    /// Producers started and not yet waited for
    started: Mutex<Vec<Arc<ProducerNode>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("ruleset", &self.ruleset)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(ruleset: Ruleset) -> Self {
        Self {
            ruleset,
            started: Mutex::new(Vec::new()),
        }
    }

    /// Compile every parsed file into a fresh ruleset. Fails on the first
    /// compile error.
    pub fn from_files(
        files: &ParsedFiles,
        config: EngineConfig,
        registry: NodeRegistry,
    ) -> PipelineResult<Self> {
        let mut ruleset = Ruleset::new(registry, config);
        ruleset.compile_all(files)?;
        tracing::info!(
            "Compiled {} rules ({} with producers) from {} files",
            ruleset.len(),
            ruleset.root_rule_names().len(),
            files.len()
        );
        Ok(Self::new(ruleset))
    }

    fn started(&self) -> MutexGuard<'_, Vec<Arc<ProducerNode>>> {
        self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start every root producer that is not already running. Returns how
    /// many were started by this call.
    pub fn start_feeders(&self) -> PipelineResult<usize> {
        let mut started = self.started();
        let mut count = 0;
        for rule in self.ruleset.root_rules() {
            let Some(producer) = rule.producer() else {
                continue;
            };
            let spawned = producer.start().map_err(|source| PipelineError::ProducerStart {
                rule: rule.name().to_string(),
                source,
            })?;
            if spawned {
                count += 1;
                if !started.iter().any(|p| Arc::ptr_eq(p, producer)) {
                    started.push(Arc::clone(producer));
                }
            }
        }
        tracing::info!("Started {} producers", count);
        Ok(count)
    }

    /// Ask every started producer to stop. Does not wait.
    pub fn stop_feeders(&self) {
        let started = self.started();
        for producer in started.iter() {
            tracing::debug!("Stopping producer {} of rule `{}`", producer.topic(), producer.rule());
            producer.stop();
        }
    }

    /// Block until every started producer has returned, either on its own or
    /// after `stop_feeders`.
    pub fn wait_feeders(&self) {
        let snapshot: Vec<_> = self.started().clone();
        for producer in &snapshot {
            producer.join();
        }
        self.started().retain(|p| p.is_running());
    }

    pub fn has_running_feeder(&self) -> bool {
        self.started().iter().any(|p| p.is_running())
    }

    pub fn rule(&self, name: &str) -> Option<Arc<PipeRule>> {
        self.ruleset.rule(name)
    }

    pub fn rule_names(&self) -> &[String] {
        self.ruleset.rule_names()
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop_feeders();
        self.wait_feeders();
    }
}
