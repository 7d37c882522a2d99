//! Echo filter: logs every message it sees and lets it through.

use crate::pipeline::error::NodeResult;
use crate::pipeline::message::{Message, META_RULE};
use crate::pipeline::node::{Emitter, Filter};
use crate::pipeline::params::Params;

pub const TYPE_NAME: &str = "echo";

#[derive(Debug, Clone, Default)]
pub struct EchoFilter {
    prefix: Option<String>,
}

impl EchoFilter {
    pub fn from_params(params: &Params) -> Self {
        Self {
            prefix: params.get("prefix").map(str::to_string),
        }
    }
}

impl Filter for EchoFilter {
    fn do_filter(&self, msg: &mut Message, _out: &Emitter) -> NodeResult<bool> {
        let rule = msg.meta_str(META_RULE).unwrap_or("-");
        match &self.prefix {
            Some(prefix) => tracing::info!(rule, "{}: {}", prefix, msg.text()),
            None => tracing::info!(rule, "{}", msg.text()),
        }
        Ok(true)
    }
}
