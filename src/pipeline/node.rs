//! Node abstraction for the pipeline.
//!
//! Two layers:
//! - **`Producer` / `Filter` traits**: the capability contracts implemented by
//!   concrete sources and transforms (see `nodes/`).
//! - **`ProducerNode` / `FilterNode`**: the compiled graph nodes that wrap an
//!   implementation with its identity, bus topic, negation flag and lifecycle.
//!
//! `PipeNode` holds either kind so a rule can treat its chain uniformly; the
//! kind is fixed when the node is built.

use crate::pipeline::bus::{Bus, Handler};
use crate::pipeline::error::NodeResult;
use crate::pipeline::id::{NodeId, Topic};
use crate::pipeline::message::{
    Message, META_PRODUCER, META_PRODUCER_TOPIC, META_RULE, META_SOURCE_RULE,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Output side of a node: stamps routing metadata and publishes on the
/// node's own topic.
#[derive(Clone)]
pub struct Emitter {
    bus: Bus,
    topic: Topic,
    stamps: Arc<[(&'static str, String)]>,
}

impl Emitter {
    fn new(bus: Bus, topic: Topic, stamps: Vec<(&'static str, String)>) -> Self {
        Self {
            bus,
            topic,
            stamps: stamps.into(),
        }
    }

    /// An emitter that publishes without stamping anything. Useful for
    /// driving a filter implementation directly.
    pub fn detached(bus: Bus, topic: Topic) -> Self {
        Self::new(bus, topic, Vec::new())
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Publish `msg` to every downstream subscriber.
    pub fn propagate(&self, mut msg: Message) {
        for (key, value) in self.stamps.iter() {
            msg.set_meta(*key, value.as_str());
        }
        self.bus.publish(&self.topic, msg);
    }
}

/// Predicate/transform contract.
///
/// `do_filter` receives a private copy of the message and may rewrite it.
/// Returning `Ok(true)` means "matched": the (possibly rewritten) message
/// continues down the chain, subject to negation. Implementations that fan
/// out call `out.propagate` for each derived message and usually return
/// `Ok(false)` for the original.
#[cfg_attr(test, mockall::automock)]
pub trait Filter: Send + Sync {
    fn do_filter(&self, msg: &mut Message, out: &Emitter) -> NodeResult<bool>;
}

/// Event source contract.
///
/// `run` is the producer's control loop. It is called on a dedicated thread
/// and must return promptly once `ctx` reports a stop request.
pub trait Producer: Send + Sync {
    fn run(&self, ctx: &ProducerContext) -> NodeResult<()>;
}

/// Handed to `Producer::run`.
pub struct ProducerContext {
    emitter: Emitter,
    stop: Receiver<()>,
}

impl ProducerContext {
    /// Emit a new event into the graph.
    pub fn propagate(&self, msg: Message) {
        self.emitter.propagate(msg);
    }

    /// Becomes ready (message or disconnect) once a stop is requested.
    /// Meant for use inside `crossbeam_channel::select!`.
    pub fn stop_signal(&self) -> &Receiver<()> {
        &self.stop
    }

    /// Sleep for `d`, waking early on stop. Returns `true` if stopped.
    pub fn sleep(&self, d: Duration) -> bool {
        !matches!(self.stop.recv_timeout(d), Err(RecvTimeoutError::Timeout))
    }
}

/// A compiled filter link.
pub struct FilterNode {
    id: NodeId,
    type_name: String,
    rule: String,
    negated: bool,
    emitter: Emitter,
    filter: Box<dyn Filter>,
}

impl FilterNode {
    pub fn new(
        id: NodeId,
        type_name: impl Into<String>,
        rule: impl Into<String>,
        negated: bool,
        filter: Box<dyn Filter>,
        bus: Bus,
    ) -> Self {
        let type_name = type_name.into();
        let rule = rule.into();
        let topic = Topic::for_node(&type_name, id);
        let emitter = Emitter::new(bus, topic, vec![(META_RULE, rule.clone())]);
        Self {
            id,
            type_name,
            rule,
            negated,
            emitter,
            filter,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        self.emitter.topic()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Run the predicate on a copy of `msg` and forward the copy if the
    /// (possibly negated) result says so. Errors drop the message.
    pub fn pipe(&self, msg: &Message) {
        let mut copy = msg.clone();
        let matched = match self.filter.do_filter(&mut copy, &self.emitter) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!(
                    "Filter {} in rule `{}` failed, message dropped: {}",
                    self.topic(),
                    self.rule,
                    e
                );
                return;
            }
        };

        if self.negated ^ matched {
            self.propagate(copy);
        } else {
            tracing::trace!("Filter {} rejected message", self.topic());
        }
    }

    pub fn propagate(&self, msg: Message) {
        self.emitter.propagate(msg);
    }

    /// Bus handler that pipes into this node.
    pub fn handler(self: &Arc<Self>) -> Handler {
        let node = Arc::clone(self);
        Arc::new(move |msg: &Message| node.pipe(msg))
    }
}

#[derive(Default)]
struct ProducerRuntime {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

/// Clears the running flag when the producer thread ends, even by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A compiled producer: the head of a rule.
pub struct ProducerNode {
    id: NodeId,
    type_name: String,
    rule: String,
    emitter: Emitter,
    producer: Arc<dyn Producer>,
    running: Arc<AtomicBool>,
    runtime: Mutex<ProducerRuntime>,
}

impl ProducerNode {
    pub fn new(
        id: NodeId,
        type_name: impl Into<String>,
        rule: impl Into<String>,
        producer: Box<dyn Producer>,
        bus: Bus,
    ) -> Self {
        let type_name = type_name.into();
        let rule = rule.into();
        let topic = Topic::for_node(&type_name, id);
        let emitter = Emitter::new(
            bus,
            topic.clone(),
            vec![
                (META_RULE, rule.clone()),
                (META_SOURCE_RULE, rule.clone()),
                (META_PRODUCER, type_name.clone()),
                (META_PRODUCER_TOPIC, topic.to_string()),
            ],
        );
        Self {
            id,
            type_name,
            rule,
            emitter,
            producer: Arc::from(producer),
            running: Arc::new(AtomicBool::new(false)),
            runtime: Mutex::new(ProducerRuntime::default()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        self.emitter.topic()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stamp producer identity and publish.
    pub fn propagate(&self, msg: Message) {
        self.emitter.propagate(msg);
    }

    /// Spawn the producer's control loop. Returns `Ok(false)` if it is
    /// already running.
    pub fn start(&self) -> std::io::Result<bool> {
        let mut runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_running() {
            return Ok(false);
        }
        if let Some(previous) = runtime.handle.take() {
            // Already finished (running is false); reap it.
            let _ = previous.join();
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ctx = ProducerContext {
            emitter: self.emitter.clone(),
            stop: stop_rx,
        };
        let producer = Arc::clone(&self.producer);
        let topic = self.topic().clone();
        let rule = self.rule.clone();

        self.running.store(true, Ordering::Release);
        let guard = RunningGuard(Arc::clone(&self.running));
        let spawned = std::thread::Builder::new()
            .name(format!("producer:{topic}"))
            .spawn(move || {
                let _guard = guard;
                tracing::info!("Producer {} of rule `{}` started", topic, rule);
                match producer.run(&ctx) {
                    Ok(()) => tracing::info!("Producer {} of rule `{}` stopped", topic, rule),
                    Err(e) => tracing::error!("Producer {} of rule `{}` failed: {}", topic, rule, e),
                }
            });

        match spawned {
            Ok(handle) => {
                runtime.stop_tx = Some(stop_tx);
                runtime.handle = Some(handle);
                Ok(true)
            }
            Err(e) => {
                // The guard moved into the failed closure and was dropped with it.
                self.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Request shutdown. The control loop observes this through its context.
    pub fn stop(&self) {
        let mut runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stop_tx) = runtime.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
    }

    /// Block until the control loop started by `start` has returned.
    pub fn join(&self) {
        let handle = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Producer {} panicked", self.topic());
            }
        }
    }
}

/// One node of a compiled chain.
#[derive(Clone)]
pub enum PipeNode {
    Producer(Arc<ProducerNode>),
    Filter(Arc<FilterNode>),
}

impl PipeNode {
    pub fn id(&self) -> NodeId {
        match self {
            PipeNode::Producer(n) => n.id(),
            PipeNode::Filter(n) => n.id(),
        }
    }

    pub fn topic(&self) -> &Topic {
        match self {
            PipeNode::Producer(n) => n.topic(),
            PipeNode::Filter(n) => n.topic(),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            PipeNode::Producer(n) => n.type_name(),
            PipeNode::Filter(n) => n.type_name(),
        }
    }

    pub fn is_producer(&self) -> bool {
        matches!(self, PipeNode::Producer(_))
    }

    /// Inject a message at this node: filters evaluate it, producers
    /// publish it as if they had emitted it.
    pub fn feed(&self, msg: &Message) {
        match self {
            PipeNode::Producer(n) => n.propagate(msg.clone()),
            PipeNode::Filter(n) => n.pipe(msg),
        }
    }
}

impl std::fmt::Debug for PipeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipeNode::Producer(n) => write!(f, "Producer({})", n.topic()),
            PipeNode::Filter(n) if n.is_negated() => write!(f, "Filter(!{})", n.topic()),
            PipeNode::Filter(n) => write!(f, "Filter({})", n.topic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::NodeError;
    use serde_json::json;

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(150);

    fn capture(bus: &Bus, topic: &Topic) -> Receiver<Message> {
        let (tx, rx) = crossbeam_channel::unbounded();
        bus.subscribe(
            topic,
            Arc::new(move |msg: &Message| {
                let _ = tx.send(msg.clone());
            }),
        )
        .unwrap();
        rx
    }

    fn filter_node(bus: &Bus, negated: bool, mock: MockFilter) -> FilterNode {
        FilterNode::new(NodeId(1), "mock", "r", negated, Box::new(mock), bus.clone())
    }

    #[test]
    fn test_match_propagates_with_rule_stamp() {
        let bus = Bus::new();
        let mut mock = MockFilter::new();
        mock.expect_do_filter().times(1).returning(|_, _| Ok(true));
        let node = filter_node(&bus, false, mock);
        let rx = capture(&bus, node.topic());

        node.pipe(&Message::new("x"));
        let out = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(out.text(), "x");
        assert_eq!(out.meta_str(META_RULE), Some("r"));
    }

    #[test]
    fn test_negated_match_is_dropped() {
        let bus = Bus::new();
        let mut mock = MockFilter::new();
        mock.expect_do_filter().returning(|_, _| Ok(true));
        let node = filter_node(&bus, true, mock);
        let rx = capture(&bus, node.topic());

        node.pipe(&Message::new("x"));
        assert!(rx.recv_timeout(QUIET).is_err());
    }

    #[test]
    fn test_negated_mismatch_propagates() {
        let bus = Bus::new();
        let mut mock = MockFilter::new();
        mock.expect_do_filter().returning(|_, _| Ok(false));
        let node = filter_node(&bus, true, mock);
        let rx = capture(&bus, node.topic());

        node.pipe(&Message::new("y"));
        assert_eq!(rx.recv_timeout(WAIT).unwrap().text(), "y");
    }

    #[test]
    fn test_error_drops_message_even_when_negated() {
        let bus = Bus::new();
        let mut mock = MockFilter::new();
        mock.expect_do_filter()
            .returning(|_, _| Err(NodeError::Runtime("bad input".into())));
        let node = filter_node(&bus, true, mock);
        let rx = capture(&bus, node.topic());

        node.pipe(&Message::new("z"));
        assert!(rx.recv_timeout(QUIET).is_err());
    }

    #[test]
    fn test_pipe_works_on_a_copy() {
        let bus = Bus::new();
        let mut mock = MockFilter::new();
        mock.expect_do_filter().returning(|msg, _| {
            msg.set_payload(json!("rewritten"));
            msg.set_meta("touched", true);
            Ok(true)
        });
        let node = filter_node(&bus, false, mock);
        let rx = capture(&bus, node.topic());

        let original = Message::new("original");
        node.pipe(&original);
        assert_eq!(rx.recv_timeout(WAIT).unwrap().text(), "rewritten");
        assert_eq!(original.text(), "original");
        assert!(original.meta("touched").is_none());
    }

    #[test]
    fn test_fan_out_through_emitter() {
        let bus = Bus::new();
        let mut mock = MockFilter::new();
        mock.expect_do_filter().returning(|_, out| {
            out.propagate(Message::new(1));
            out.propagate(Message::new(2));
            Ok(false)
        });
        let node = filter_node(&bus, false, mock);
        let rx = capture(&bus, node.topic());

        node.pipe(&Message::new("batch"));
        let got: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(WAIT).unwrap().payload().clone())
            .collect();
        assert_eq!(got, vec![json!(1), json!(2)]);
        assert!(rx.recv_timeout(QUIET).is_err());
    }

    struct TickOnce;

    impl Producer for TickOnce {
        fn run(&self, ctx: &ProducerContext) -> NodeResult<()> {
            ctx.propagate(Message::new("tick"));
            while !ctx.sleep(Duration::from_millis(10)) {}
            Ok(())
        }
    }

    #[test]
    fn test_producer_lifecycle_and_stamps() {
        let bus = Bus::new();
        let node = ProducerNode::new(NodeId(9), "once", "src", Box::new(TickOnce), bus.clone());
        let rx = capture(&bus, node.topic());

        assert!(!node.is_running());
        assert!(node.start().unwrap());
        assert!(!node.start().unwrap(), "second start is a no-op");

        let msg = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(msg.meta_str(META_PRODUCER), Some("once"));
        assert_eq!(msg.meta_str(META_PRODUCER_TOPIC), Some("once:9"));
        assert_eq!(msg.meta_str(META_SOURCE_RULE), Some("src"));
        assert!(node.is_running());

        node.stop();
        node.join();
        assert!(!node.is_running());
    }

    struct Exploding;

    impl Producer for Exploding {
        fn run(&self, _ctx: &ProducerContext) -> NodeResult<()> {
            panic!("producer bug");
        }
    }

    #[test]
    fn test_panicking_producer_clears_running_flag() {
        let node = ProducerNode::new(NodeId(3), "boom", "r", Box::new(Exploding), Bus::new());
        node.start().unwrap();
        node.join();
        assert!(!node.is_running());
    }
}
