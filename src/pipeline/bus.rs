//! Topic-addressed publish/subscribe transport between compiled nodes.
//!
//! Each topic that has at least one subscriber owns an unbounded
//! crossbeam queue and a dispatcher thread. `publish` only enqueues, so a
//! publisher never blocks on its consumers; the queue grows instead.
//! The dispatcher invokes the topic's handlers one after another in
//! subscription order, so a slow handler delays only its own topic.
//!
//! ```text
//! publish("timer:0", msg) ──► [queue timer:0] ──► dispatcher ──► handler 1
//!                                                             └► handler 2
//! ```

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::Topic;
use crate::pipeline::message::Message;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// A subscriber callback. Receives a shared reference; handlers that need
/// to mutate clone first.
pub type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

struct TopicQueue {
    tx: Sender<Message>,
    handlers: Arc<RwLock<Vec<Handler>>>,
}

#[derive(Default)]
struct BusInner {
    topics: RwLock<HashMap<Topic, TopicQueue>>,
    closed: AtomicBool,
}

/// Cheaply cloneable handle; all clones address the same topics.
#[derive(Clone, Default)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` on `topic`. Handlers live as long as the bus.
    pub fn subscribe(&self, topic: &Topic, handler: Handler) -> PipelineResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PipelineError::Internal(format!(
                "subscribe to {topic} after bus shutdown"
            )));
        }

        let mut topics = self
            .inner
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(queue) = topics.get(topic) {
            queue
                .handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handler);
            return Ok(());
        }

        let (tx, rx) = unbounded();
        let handlers = Arc::new(RwLock::new(vec![handler]));
        let dispatch_handlers = handlers.clone();
        let dispatch_topic = topic.clone();
        std::thread::Builder::new()
            .name(format!("bus:{topic}"))
            .spawn(move || dispatch(dispatch_topic, rx, dispatch_handlers))
            .map_err(|e| {
                PipelineError::Internal(format!("cannot spawn dispatcher for {topic}: {e}"))
            })?;

        tracing::trace!("Bus: new topic {}", topic);
        topics.insert(topic.clone(), TopicQueue { tx, handlers });
        Ok(())
    }

    /// Queue `msg` for every subscriber of `topic`.
    pub fn publish(&self, topic: &Topic, msg: Message) {
        let topics = self
            .inner
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match topics.get(topic) {
            Some(queue) => {
                if queue.tx.send(msg).is_err() {
                    tracing::warn!("Bus: dispatcher for {} is gone, message dropped", topic);
                }
            }
            None => tracing::trace!("Bus: no subscribers on {}", topic),
        }
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(|q| q.handlers.read().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.inner
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close every queue. Dispatchers finish what is already queued, then exit.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut topics = self
            .inner
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        tracing::debug!("Bus: shutting down {} topics", topics.len());
        topics.clear();
    }
}

fn dispatch(topic: Topic, rx: Receiver<Message>, handlers: Arc<RwLock<Vec<Handler>>>) {
    for msg in rx.iter() {
        let snapshot: Vec<Handler> = handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(&msg))).is_err() {
                tracing::error!("Bus: handler on {} panicked, message dropped for it", topic);
            }
        }
    }
    tracing::trace!("Bus: dispatcher for {} exiting", topic);
}
