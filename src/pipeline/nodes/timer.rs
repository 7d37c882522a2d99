//! Timer producer: emits one event per tick.
//!
//! Parameters:
//! - `freq`: tick interval (default `1s`)
//! - `count`: stop after this many ticks (default: unlimited)

use crate::pipeline::error::{NodeError, NodeResult};
use crate::pipeline::message::Message;
use crate::pipeline::node::{Producer, ProducerContext};
use crate::pipeline::params::Params;
use crossbeam_channel::{select, tick};
use std::time::Duration;

pub const TYPE_NAME: &str = "timer";

/// Metadata key holding the tick's wall-clock time (RFC 3339).
pub const META_TIME: &str = "time";

const DEFAULT_FREQ: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct TimerProducer {
    freq: Duration,
    count: Option<u64>,
}

impl TimerProducer {
    pub fn from_params(params: &Params) -> NodeResult<Self> {
        let freq = params.duration("freq")?.unwrap_or(DEFAULT_FREQ);
        if freq.is_zero() {
            return Err(NodeError::invalid("freq", params.get_or("freq", ""), "must be > 0"));
        }
        Ok(Self {
            freq,
            count: params.parse::<u64>("count")?,
        })
    }

    pub fn freq(&self) -> Duration {
        self.freq
    }
}

impl Producer for TimerProducer {
    fn run(&self, ctx: &ProducerContext) -> NodeResult<()> {
        let ticker = tick(self.freq);
        let mut sequence: u64 = 0;

        loop {
            select! {
                recv(ctx.stop_signal()) -> _ => return Ok(()),
                recv(ticker) -> _ => {
                    sequence += 1;
                    let msg = Message::new(sequence)
                        .with_meta(META_TIME, chrono::Utc::now().to_rfc3339());
                    ctx.propagate(msg);

                    if self.count.is_some_and(|max| sequence >= max) {
                        tracing::debug!("Timer reached {} ticks", sequence);
                        return Ok(());
                    }
                }
            }
        }
    }
}
