//! Compiles parsed rule files into a graph of bus subscriptions.
//!
//! Files are compiled dependencies first and at most once. Each rule becomes
//! a [`PipeRule`]; `@call` links are spliced in by subscribing the callee's
//! entry node to the caller's previous topic and continuing from the
//! callee's exit topic, so a called rule is shared rather than copied.

use crate::config::EngineConfig;
use crate::pipeline::bus::Bus;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{NodeIdGen, Topic};
use crate::pipeline::node::{FilterNode, PipeNode, ProducerNode};
use crate::pipeline::registry::NodeRegistry;
use crate::pipeline::rule::PipeRule;
use crate::rules::{FilterDecl, Node, ParsedFiles, ProducerDecl, RuleBody, RuleFile, RuleNode};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A subscription to make once the owning rule is known to be valid.
struct Wire {
    topic: Topic,
    target: Arc<FilterNode>,
    /// Called rule whose entry node `target` is, for call splices
    call: Option<String>,
}

/// Output of [`Ruleset::link_chain`].
#[derive(Default)]
struct Linked {
    nodes: Vec<PipeNode>,
    first: Option<PipeNode>,
    last: Option<PipeNode>,
    wires: Vec<Wire>,
}

/// The compiled rule graph and everything needed to extend it.
pub struct Ruleset {
    registry: NodeRegistry,
    config: EngineConfig,
    bus: Bus,
    ids: NodeIdGen,
    rules: HashMap<String, Arc<PipeRule>>,
    /// Rule names in definition order
    order: Vec<String>,
    /// Names of rules that start with a producer
    root_rule_names: Vec<String>,
    /// file -> transitive imports, for every fully compiled file
    compiled_deps: HashMap<PathBuf, Vec<PathBuf>>,
    in_progress: HashSet<PathBuf>,
    /// topic -> topics of the nodes subscribed to it
    downstream: HashMap<Topic, HashSet<Topic>>,
}

impl Ruleset {
    pub fn new(registry: NodeRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            bus: Bus::new(),
            ids: NodeIdGen::new(),
            rules: HashMap::new(),
            order: Vec::new(),
            root_rule_names: Vec::new(),
            compiled_deps: HashMap::new(),
            in_progress: HashSet::new(),
            downstream: HashMap::new(),
        }
    }

    /// Compile every file in `files`, stopping at the first error.
    pub fn compile_all(&mut self, files: &ParsedFiles) -> PipelineResult<()> {
        for file in files.values() {
            self.compile_ast(file, files)?;
        }
        Ok(())
    }

    /// Compile `file` after everything it imports. Returns the file's
    /// transitive import list; a file already compiled returns its cached
    /// list without being compiled again.
    pub fn compile_ast(&mut self, file: &RuleFile, files: &ParsedFiles) -> PipelineResult<Vec<PathBuf>> {
        if let Some(deps) = self.compiled_deps.get(&file.path) {
            return Ok(deps.clone());
        }
        if !self.in_progress.insert(file.path.clone()) {
            return Err(PipelineError::CyclicDependency(file.path.clone()));
        }

        let result = self.compile_file(file, files);
        self.in_progress.remove(&file.path);
        let deps = result?;

        self.compiled_deps.insert(file.path.clone(), deps.clone());
        Ok(deps)
    }

    fn compile_file(&mut self, file: &RuleFile, files: &ParsedFiles) -> PipelineResult<Vec<PathBuf>> {
        let mut deps: Vec<PathBuf> = Vec::new();
        for import in &file.imports {
            let dependency = files
                .get(import)
                .ok_or_else(|| PipelineError::MissingDependency {
                    file: file.path.clone(),
                    dependency: import.clone(),
                })?;
            let transitive = self.compile_ast(dependency, files)?;
            for dep in transitive.into_iter().chain(std::iter::once(import.clone())) {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }

        tracing::info!(
            "Compiling {} ({} rules, {} dependencies)",
            file.path.display(),
            file.rules.len(),
            deps.len()
        );
        for rule in &file.rules {
            self.add_rule(&file.path, rule, &deps)?;
        }
        Ok(deps)
    }

    /// Build and register one rule. `deps` are the files whose rules the
    /// rule may call, besides its own file.
    pub fn add_rule(&mut self, file: &Path, rule: &RuleNode, deps: &[PathBuf]) -> PipelineResult<()> {
        let name = rule.identifier.as_str();
        if name.is_empty() {
            return Err(PipelineError::EmptyRuleName.in_rule(file, name));
        }
        if self.rules.contains_key(name) {
            return Err(PipelineError::DuplicateRule(name.to_string()).in_rule(file, name));
        }

        let (compiled, wires) = self
            .build_rule(file, rule, deps)
            .map_err(|e| e.in_rule(file, name))?;
        self.check_acyclic(&wires, name)
            .map_err(|e| e.in_rule(file, name))?;

        for wire in wires {
            self.bus
                .subscribe(&wire.topic, wire.target.handler())
                .map_err(|e| e.in_rule(file, name))?;
            self.downstream
                .entry(wire.topic)
                .or_default()
                .insert(wire.target.topic().clone());
        }

        tracing::debug!(
            "Rule `{}`: {:?} -> {:?}",
            name,
            compiled.first(),
            compiled.last()
        );
        if compiled.has_producer() {
            self.root_rule_names.push(name.to_string());
        }
        self.order.push(name.to_string());
        self.rules.insert(name.to_string(), Arc::new(compiled));
        Ok(())
    }

    /// Fail if any wire would let a message reach a node it already passed.
    /// Only call splices reuse existing nodes, so only they can close a loop.
    fn check_acyclic(&self, wires: &[Wire], rule: &str) -> PipelineResult<()> {
        let mut pending: HashMap<&Topic, Vec<&Topic>> = HashMap::new();
        for wire in wires {
            if self.reaches(wire.target.topic(), &wire.topic, &pending) {
                let call = wire.call.as_deref().unwrap_or(rule);
                return Err(PipelineError::CyclicRuleCall(call.to_string()));
            }
            pending
                .entry(&wire.topic)
                .or_default()
                .push(wire.target.topic());
        }
        Ok(())
    }

    /// Whether `to` is reachable from `from` over applied and pending
    /// subscriptions. `from == to` counts.
    fn reaches(&self, from: &Topic, to: &Topic, pending: &HashMap<&Topic, Vec<&Topic>>) -> bool {
        let mut seen: HashSet<&Topic> = HashSet::new();
        let mut stack = vec![from];
        while let Some(topic) = stack.pop() {
            if topic == to {
                return true;
            }
            if !seen.insert(topic) {
                continue;
            }
            if let Some(next) = self.downstream.get(topic) {
                stack.extend(next.iter());
            }
            if let Some(next) = pending.get(topic) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    fn build_rule(
        &self,
        file: &Path,
        rule: &RuleNode,
        deps: &[PathBuf],
    ) -> PipelineResult<(PipeRule, Vec<Wire>)> {
        let name = rule.identifier.as_str();
        match &rule.body {
            RuleBody::Producer(decl) => {
                let producer = self.build_producer(decl, name)?;
                let head = PipeNode::Producer(Arc::clone(&producer));
                let linked = match decl.next.as_deref() {
                    Some(next) => {
                        self.link_chain(next, Some(producer.topic().clone()), name, file, deps)?
                    }
                    None => Linked::default(),
                };

                let last = linked.last.unwrap_or_else(|| head.clone());
                let mut nodes = Vec::with_capacity(linked.nodes.len() + 1);
                nodes.push(head.clone());
                nodes.extend(linked.nodes);
                Ok((
                    PipeRule::new(name.to_string(), file.to_path_buf(), nodes, head, last),
                    linked.wires,
                ))
            }
            RuleBody::Chain(start) => {
                let linked = self.link_chain(start, None, name, file, deps)?;
                let (Some(first), Some(last)) = (linked.first, linked.last) else {
                    return Err(PipelineError::Internal(format!(
                        "rule `{name}` linked to an empty chain"
                    )));
                };
                Ok((
                    PipeRule::new(name.to_string(), file.to_path_buf(), linked.nodes, first, last),
                    linked.wires,
                ))
            }
        }
    }

    /// Build the chain starting at `start`. `previous` is the topic the
    /// first link subscribes to, if any. Nothing is subscribed here: the
    /// returned wires are applied by the caller once the whole rule built.
    fn link_chain(
        &self,
        start: &Node,
        previous: Option<Topic>,
        rule: &str,
        file: &Path,
        deps: &[PathBuf],
    ) -> PipelineResult<Linked> {
        let mut linked = Linked::default();
        let mut previous = previous;
        let mut current = Some(start);

        while let Some(node) = current {
            match node {
                Node::Filter(decl) => {
                    let filter = self.build_filter(decl, rule)?;
                    if let Some(topic) = previous.take() {
                        linked.wires.push(Wire {
                            topic,
                            target: Arc::clone(&filter),
                            call: None,
                        });
                    }
                    let link = PipeNode::Filter(Arc::clone(&filter));
                    linked.first.get_or_insert_with(|| link.clone());
                    linked.last = Some(link.clone());
                    linked.nodes.push(link);
                    previous = Some(filter.topic().clone());
                }
                Node::RuleCall(call) => {
                    let callee = self.resolve_call(&call.name, file, deps)?;
                    if callee.has_producer() {
                        return Err(PipelineError::ProducerInRuleCall(call.name.clone()));
                    }
                    let PipeNode::Filter(entry) = callee.first() else {
                        return Err(PipelineError::Internal(format!(
                            "entry of rule `{}` is not a filter",
                            call.name
                        )));
                    };
                    if let Some(topic) = previous.take() {
                        linked.wires.push(Wire {
                            topic,
                            target: Arc::clone(entry),
                            call: Some(call.name.clone()),
                        });
                    }
                    linked.first.get_or_insert_with(|| callee.first().clone());
                    linked.last = Some(callee.last().clone());
                    previous = Some(callee.last().topic().clone());
                }
            }
            current = node.next();
        }
        Ok(linked)
    }

    /// Look up a called rule. Only rules from the caller's own file or from
    /// files it (transitively) imports are visible.
    fn resolve_call(&self, name: &str, file: &Path, deps: &[PathBuf]) -> PipelineResult<Arc<PipeRule>> {
        self.rules
            .get(name)
            .filter(|callee| callee.file() == file || deps.iter().any(|d| d == callee.file()))
            .cloned()
            .ok_or_else(|| PipelineError::UnresolvedRuleCall(name.to_string()))
    }

    fn build_producer(&self, decl: &ProducerDecl, rule: &str) -> PipelineResult<Arc<ProducerNode>> {
        let factory = self
            .registry
            .producer(&decl.name)
            .ok_or_else(|| PipelineError::UnknownProducer(decl.name.clone()))?;
        let params = self.config.node_params(&decl.name, &decl.params);
        let producer = factory(&params).map_err(|source| PipelineError::NodeConstruction {
            node: decl.name.clone(),
            source,
        })?;
        Ok(Arc::new(ProducerNode::new(
            self.ids.next_id(),
            decl.name.as_str(),
            rule,
            producer,
            self.bus.clone(),
        )))
    }

    fn build_filter(&self, decl: &FilterDecl, rule: &str) -> PipelineResult<Arc<FilterNode>> {
        let factory = self
            .registry
            .filter(&decl.name)
            .ok_or_else(|| PipelineError::UnknownFilter(decl.name.clone()))?;
        let params = self.config.node_params(&decl.name, &decl.params);
        let filter = factory(&params).map_err(|source| PipelineError::NodeConstruction {
            node: decl.name.clone(),
            source,
        })?;
        Ok(Arc::new(FilterNode::new(
            self.ids.next_id(),
            decl.name.as_str(),
            rule,
            decl.negated,
            filter,
            self.bus.clone(),
        )))
    }

    pub fn rule(&self, name: &str) -> Option<Arc<PipeRule>> {
        self.rules.get(name).cloned()
    }

    /// Rule names in definition order
    pub fn rule_names(&self) -> &[String] {
        &self.order
    }

    /// Names of rules that start with a producer, in definition order
    pub fn root_rule_names(&self) -> &[String] {
        &self.root_rule_names
    }

    /// Root rules, in definition order
    pub fn root_rules(&self) -> impl Iterator<Item = Arc<PipeRule>> + '_ {
        self.root_rule_names.iter().filter_map(|name| self.rule(name))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `file` has been fully compiled
    pub fn is_compiled(&self, file: &Path) -> bool {
        self.compiled_deps.contains_key(file)
    }

    /// Number of node ids handed out so far
    pub fn node_count(&self) -> u32 {
        self.ids.issued()
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

impl Drop for Ruleset {
    fn drop(&mut self) {
        self.bus.shutdown();
    }
}

impl std::fmt::Debug for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ruleset")
            .field("rules", &self.order)
            .field("root_rule_names", &self.root_rule_names)
            .field("nodes", &self.ids.issued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::message::Message;
    use crate::pipeline::error::NodeResult;
    use crate::pipeline::node::{Emitter, Filter};
    use crate::rules::{parse_source, ImportResolver, MemoryLoader};
    use crossbeam_channel::{Receiver, Sender};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(150);

    /// Passes everything and reports what it saw.
    struct Capture(Sender<Message>);

    impl Filter for Capture {
        fn do_filter(&self, msg: &mut Message, _out: &Emitter) -> NodeResult<bool> {
            let _ = self.0.send(msg.clone());
            Ok(true)
        }
    }

    fn registry_with_capture() -> (NodeRegistry, Receiver<Message>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut registry = NodeRegistry::with_builtins();
        registry.register_filter("capture", move |_| Ok(Box::new(Capture(tx.clone()))));
        (registry, rx)
    }

    fn compile_one(registry: NodeRegistry, src: &str) -> PipelineResult<Ruleset> {
        let file = parse_source(Path::new("main.rules"), src).unwrap();
        let mut files = ParsedFiles::new();
        files.insert(file.path.clone(), file);
        let mut ruleset = Ruleset::new(registry, EngineConfig::default());
        ruleset.compile_all(&files)?;
        Ok(ruleset)
    }

    #[test]
    fn test_producer_rule_shape() {
        let ruleset = compile_one(
            NodeRegistry::with_builtins(),
            r#"greet => <timer: freq="1s"> | echo();"#,
        )
        .unwrap();
        let greet = ruleset.rule("greet").unwrap();
        assert!(greet.has_producer());
        assert_eq!(greet.nodes().len(), 2);
        assert!(greet.nodes()[0].is_producer());
        assert_eq!(greet.last().type_name(), "echo");
        assert_eq!(ruleset.root_rule_names(), ["greet".to_string()]);
    }

    #[test]
    fn test_topics_are_unique() {
        let ruleset = compile_one(
            NodeRegistry::with_builtins(),
            "a => echo() | echo();\nb => echo();",
        )
        .unwrap();
        let mut topics: Vec<String> = ruleset
            .rule_names()
            .iter()
            .flat_map(|n| ruleset.rule(n).unwrap().nodes().to_vec())
            .map(|node| node.topic().to_string())
            .collect();
        assert_eq!(topics.len(), 3);
        topics.sort();
        topics.dedup();
        assert_eq!(topics.len(), 3);
        assert_eq!(ruleset.node_count(), 3);
    }

    #[test]
    fn test_duplicate_keeps_first_rule() {
        let (registry, rx) = registry_with_capture();
        let file = parse_source(
            Path::new("main.rules"),
            "r => capture();\nr => echo();",
        )
        .unwrap();
        let mut ruleset = Ruleset::new(registry, EngineConfig::default());
        ruleset.add_rule(&file.path, &file.rules[0], &[]).unwrap();
        let err = ruleset.add_rule(&file.path, &file.rules[1], &[]).unwrap_err();
        assert!(matches!(err.root(), PipelineError::DuplicateRule(n) if n == "r"));

        let rule = ruleset.rule("r").unwrap();
        assert_eq!(rule.first().type_name(), "capture");
        rule.feed(&Message::new("still here"));
        assert_eq!(rx.recv_timeout(WAIT).unwrap().text(), "still here");
    }

    #[test]
    fn test_rule_call_splices_callee() {
        let (registry, rx) = registry_with_capture();
        let ruleset = compile_one(
            registry,
            "r1 => text(pattern=\"^ok\");\nr2 => @r1 | capture();",
        )
        .unwrap();
        let r2 = ruleset.rule("r2").unwrap();
        assert_eq!(r2.nodes().len(), 1, "callee nodes are shared, not copied");
        assert_eq!(r2.first().topic(), ruleset.rule("r1").unwrap().first().topic());

        r2.feed(&Message::new("nope"));
        assert!(rx.recv_timeout(QUIET).is_err());
        r2.feed(&Message::new("ok then"));
        assert_eq!(rx.recv_timeout(WAIT).unwrap().text(), "ok then");
    }

    #[test]
    fn test_rule_call_mid_chain() {
        let (registry, rx) = registry_with_capture();
        let ruleset = compile_one(
            registry,
            "strip => text(pattern=\"x\", mode=\"extract\");\nr => echo() | @strip | capture();",
        )
        .unwrap();
        ruleset.rule("r").unwrap().feed(&Message::new("axbx"));
        let got: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(WAIT).unwrap().text().into_owned())
            .collect();
        assert_eq!(got, vec!["x", "x"]);
    }

    #[test]
    fn test_rule_call_errors() {
        let err = compile_one(NodeRegistry::with_builtins(), "r => @later;\nlater => echo();")
            .unwrap_err();
        assert!(matches!(err.root(), PipelineError::UnresolvedRuleCall(n) if n == "later"));

        let err = compile_one(
            NodeRegistry::with_builtins(),
            "src => <timer>;\nr => echo() | @src;",
        )
        .unwrap_err();
        assert!(matches!(err.root(), PipelineError::ProducerInRuleCall(n) if n == "src"));
        assert!(err.to_string().contains("contains a producer and cannot be here"));
    }

    #[test]
    fn test_call_back_into_own_fragment_is_rejected() {
        let (registry, rx) = registry_with_capture();
        let file = parse_source(Path::new("main.rules"), "a => capture();\nb => @a | @a;").unwrap();
        let mut ruleset = Ruleset::new(registry, EngineConfig::default());
        ruleset.add_rule(&file.path, &file.rules[0], &[]).unwrap();
        let a_topic = ruleset.rule("a").unwrap().last().topic().clone();

        let err = ruleset.add_rule(&file.path, &file.rules[1], &[]).unwrap_err();
        assert!(matches!(err.root(), PipelineError::CyclicRuleCall(n) if n == "a"));
        assert!(err.to_string().contains("rule `b`"));
        assert!(ruleset.rule("b").is_none());
        assert_eq!(ruleset.bus().subscriber_count(&a_topic), 0);

        // `a` still delivers exactly once.
        ruleset.rule("a").unwrap().feed(&Message::new("once"));
        assert_eq!(rx.recv_timeout(WAIT).unwrap().text(), "once");
        assert!(rx.recv_timeout(QUIET).is_err());
    }

    #[test]
    fn test_indirect_call_loop_is_rejected() {
        let err = compile_one(
            NodeRegistry::with_builtins(),
            "a => echo();\nc => @a | echo();\nd => @c | @a;",
        )
        .unwrap_err();
        assert!(matches!(err.root(), PipelineError::CyclicRuleCall(n) if n == "a"));
        assert!(err.to_string().contains("rule `d`"));
    }

    #[test]
    fn test_reusing_a_fragment_without_loop_is_accepted() {
        let ruleset = compile_one(
            NodeRegistry::with_builtins(),
            "a => echo();\nb => @a | echo();\nc => @a | echo() | echo();",
        )
        .unwrap();
        assert_eq!(ruleset.len(), 3);
    }

    #[test]
    fn test_failed_rule_leaves_no_subscriptions() {
        let registry = NodeRegistry::with_builtins();
        let file = parse_source(
            Path::new("main.rules"),
            "ok => echo();\nbad => @ok | echo() | nosuch();",
        )
        .unwrap();
        let mut ruleset = Ruleset::new(registry, EngineConfig::default());
        ruleset.add_rule(&file.path, &file.rules[0], &[]).unwrap();
        let entry = ruleset.rule("ok").unwrap().last().topic().clone();

        let err = ruleset.add_rule(&file.path, &file.rules[1], &[]).unwrap_err();
        assert!(matches!(err.root(), PipelineError::UnknownFilter(n) if n == "nosuch"));
        assert_eq!(ruleset.bus().subscriber_count(&entry), 0);
        assert!(ruleset.rule("bad").is_none());
        assert_eq!(ruleset.len(), 1);
    }

    #[test]
    fn test_construction_error_has_context() {
        let err = compile_one(
            NodeRegistry::with_builtins(),
            r#"t => <timer: freq="soon">;"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("main.rules"));
        assert!(msg.contains("rule `t`"));
        assert!(matches!(err.root(), PipelineError::NodeConstruction { node, .. } if node == "timer"));
    }

    #[test]
    fn test_dependencies_compile_once_and_first() {
        let loader = MemoryLoader::new()
            .with_file("main.rules", "#import \"a.rules\"\n#import \"b.rules\"\nm => @a | echo();")
            .with_file("a.rules", "#import \"common.rules\"\na => @c;")
            .with_file("b.rules", "#import \"common.rules\"\nb => @c;")
            .with_file("common.rules", "c => echo();");
        let files = ImportResolver::new(loader)
            .resolve(Path::new("main.rules"))
            .unwrap();

        let mut ruleset = Ruleset::new(NodeRegistry::with_builtins(), EngineConfig::default());
        let main = &files[Path::new("main.rules")];
        let deps = ruleset.compile_ast(main, &files).unwrap();
        assert_eq!(deps.len(), 3);
        assert!(ruleset.is_compiled(Path::new("common.rules")));
        assert_eq!(ruleset.rule_names(), ["c", "a", "b", "m"].map(String::from));

        // Already compiled: cached, no duplicate-rule errors.
        let again = ruleset.compile_ast(main, &files).unwrap();
        assert_eq!(again, deps);
        ruleset.compile_all(&files).unwrap();
        assert_eq!(ruleset.len(), 4);
    }

    #[test]
    fn test_rules_from_unimported_files_are_invisible() {
        let loader = MemoryLoader::new()
            .with_file("a.rules", "shared => echo();")
            .with_file("b.rules", "r => @shared;");
        let files = ImportResolver::new(loader)
            .resolve_all(&[PathBuf::from("a.rules"), PathBuf::from("b.rules")])
            .unwrap();
        let mut ruleset = Ruleset::new(NodeRegistry::with_builtins(), EngineConfig::default());
        let err = ruleset.compile_all(&files).unwrap_err();
        assert!(matches!(err.root(), PipelineError::UnresolvedRuleCall(n) if n == "shared"));
    }

    #[test]
    fn test_cycle_detected_without_registering_rules() {
        let mut files = ParsedFiles::new();
        for (name, src) in [
            ("a.rules", "#import \"b.rules\"\na => echo();"),
            ("b.rules", "#import \"a.rules\"\nb => echo();"),
        ] {
            let file = parse_source(Path::new(name), src).unwrap();
            files.insert(file.path.clone(), file);
        }
        let mut ruleset = Ruleset::new(NodeRegistry::with_builtins(), EngineConfig::default());
        let err = ruleset.compile_all(&files).unwrap_err();
        assert!(matches!(err, PipelineError::CyclicDependency(_)));
        assert!(ruleset.is_empty());
    }

    #[test]
    fn test_missing_dependency() {
        let file = parse_source(Path::new("a.rules"), "#import \"gone.rules\"\na => echo();").unwrap();
        let mut files = ParsedFiles::new();
        files.insert(file.path.clone(), file);
        let mut ruleset = Ruleset::new(NodeRegistry::with_builtins(), EngineConfig::default());
        let err = ruleset.compile_all(&files).unwrap_err();
        assert!(matches!(err, PipelineError::MissingDependency { .. }));
    }

    #[test]
    fn test_config_reaches_nodes() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut registry = NodeRegistry::new();
        registry.register_filter("probe", move |params| {
            let _ = tx.send(params.clone());
            Ok(Box::new(Capture(crossbeam_channel::unbounded().0)))
        });
        let config = EngineConfig::default()
            .with_custom("level", "global")
            .with_node_value("probe", "level", "typed")
            .with_node_value("probe", "limit", 10);

        let file = parse_source(Path::new("main.rules"), "r => probe(limit=3);").unwrap();
        let mut files = ParsedFiles::new();
        files.insert(file.path.clone(), file);
        let mut ruleset = Ruleset::new(registry, config);
        ruleset.compile_all(&files).unwrap();

        let params = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(params.get("level"), Some("typed"));
        assert_eq!(params.get("limit"), Some("3"));
    }
}
