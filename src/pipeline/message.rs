//! The event envelope carried across the bus.
//!
//! Both payload and metadata are owned `serde_json::Value`s, so `clone()` is a
//! deep copy: mutating a clone never shows through to the original.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Metadata key holding the name of the rule whose node last propagated the message.
pub const META_RULE: &str = "rule";
/// Metadata key holding the producer type that created the message.
pub const META_PRODUCER: &str = "producer";
/// Metadata key holding the bus topic of the producer that created the message.
pub const META_PRODUCER_TOPIC: &str = "producer_topic";
/// Metadata key holding the rule that owns the producer.
pub const META_SOURCE_RULE: &str = "source_rule";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    payload: Value,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

impl Message {
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_meta(key, value);
        self
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Value {
        &mut self.payload
    }

    pub fn set_payload(&mut self, payload: impl Into<Value>) {
        self.payload = payload.into();
    }

    /// The payload as text: strings as-is, `null` as empty, anything else as JSON.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.payload {
            Value::String(s) => Cow::Borrowed(s),
            Value::Null => Cow::Borrowed(""),
            other => Cow::Owned(other.to_string()),
        }
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }
}
