//! Mock node implementations

use super::{quiet_period, test_timeout};
use crossbeam_channel::{unbounded, Receiver, Sender};
use ruleflow::pipeline::{
    Emitter, Filter, FilterFactory, NodeResult, Params, Producer, ProducerContext,
    ProducerFactory,
};
use ruleflow::Message;
use serde_json::Value;
use std::sync::Arc;

/// A filter that passes every message and reports it to the test.
pub struct CaptureFilter {
    tx: Sender<Message>,
}

impl Filter for CaptureFilter {
    fn do_filter(&self, msg: &mut Message, _out: &Emitter) -> NodeResult<bool> {
        let _ = self.tx.send(msg.clone());
        Ok(true)
    }
}

/// Receiving side of every `CaptureFilter` built from one factory.
pub struct Capture {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Capture {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn factory(&self) -> FilterFactory {
        let tx = self.tx.clone();
        Arc::new(move |_: &Params| -> NodeResult<Box<dyn Filter>> {
            Ok(Box::new(CaptureFilter { tx: tx.clone() }))
        })
    }

    /// Next captured message, panicking after the test timeout.
    pub fn recv(&self) -> Message {
        self.rx
            .recv_timeout(test_timeout())
            .unwrap_or_else(|_| panic!("no message captured within {:?}", test_timeout()))
    }

    /// Next captured payload as text.
    pub fn recv_text(&self) -> String {
        self.recv().text().into_owned()
    }

    pub fn assert_quiet(&self) {
        if let Ok(msg) = self.rx.recv_timeout(quiet_period()) {
            panic!("unexpected message captured: {:?}", msg.payload());
        }
    }
}

/// A producer that emits a fixed list of payloads, then idles until stopped.
pub struct ScriptedProducer {
    payloads: Vec<Value>,
}

impl ScriptedProducer {
    pub fn factory(payloads: Vec<Value>) -> ProducerFactory {
        Arc::new(move |_: &Params| -> NodeResult<Box<dyn Producer>> {
            Ok(Box::new(ScriptedProducer {
                payloads: payloads.clone(),
            }))
        })
    }
}

impl Producer for ScriptedProducer {
    fn run(&self, ctx: &ProducerContext) -> NodeResult<()> {
        for payload in &self.payloads {
            ctx.propagate(Message::new(payload.clone()));
        }
        let _ = ctx.stop_signal().recv();
        Ok(())
    }
}
