//! Text filter: regular-expression matching on the payload's text.
//!
//! Parameters:
//! - `pattern` (required): regular expression
//! - `mode`: `match` (default) passes the message when the pattern matches;
//!   `extract` emits one derived message per match (the first capture group
//!   if present, else the whole match) and drops the original.

use crate::pipeline::error::{NodeError, NodeResult};
use crate::pipeline::message::Message;
use crate::pipeline::node::{Emitter, Filter};
use crate::pipeline::params::Params;
use regex::Regex;

pub const TYPE_NAME: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Match,
    Extract,
}

#[derive(Debug, Clone)]
pub struct TextFilter {
    pattern: Regex,
    mode: TextMode,
}

impl TextFilter {
    pub fn from_params(params: &Params) -> NodeResult<Self> {
        let raw = params.require("pattern")?;
        let pattern = Regex::new(raw).map_err(|e| NodeError::invalid("pattern", raw, e))?;
        let mode = match params.get_or("mode", "match") {
            "match" => TextMode::Match,
            "extract" => TextMode::Extract,
            other => {
                return Err(NodeError::invalid(
                    "mode",
                    other,
                    "expected `match` or `extract`",
                ))
            }
        };
        Ok(Self { pattern, mode })
    }
}

impl Filter for TextFilter {
    fn do_filter(&self, msg: &mut Message, out: &Emitter) -> NodeResult<bool> {
        match self.mode {
            TextMode::Match => Ok(self.pattern.is_match(&msg.text())),
            TextMode::Extract => {
                let text = msg.text().into_owned();
                for caps in self.pattern.captures_iter(&text) {
                    let Some(found) = caps.get(1).or_else(|| caps.get(0)) else {
                        continue;
                    };
                    let mut derived = msg.clone();
                    derived.set_payload(found.as_str());
                    out.propagate(derived);
                }
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::bus::Bus;
    use crate::pipeline::id::{NodeId, Topic};
    use std::sync::Arc;
    use std::time::Duration;

    fn text(params: Params) -> TextFilter {
        TextFilter::from_params(&params).unwrap()
    }

    #[test]
    fn test_match_mode() {
        let f = text(Params::new().with("pattern", "^fo+$"));
        let out = Emitter::detached(Bus::new(), Topic::for_node(TYPE_NAME, NodeId(0)));
        assert!(f.do_filter(&mut Message::new("foo"), &out).unwrap());
        assert!(!f.do_filter(&mut Message::new("bar"), &out).unwrap());
    }

    #[test]
    fn test_invalid_params() {
        assert!(TextFilter::from_params(&Params::new().with("pattern", "(")).is_err());
        assert!(TextFilter::from_params(
            &Params::new().with("pattern", "x").with("mode", "count")
        )
        .is_err());
    }

    #[test]
    fn test_extract_fans_out() {
        let bus = Bus::new();
        let topic = Topic::for_node(TYPE_NAME, NodeId(1));
        let (tx, rx) = crossbeam_channel::unbounded();
        bus.subscribe(
            &topic,
            Arc::new(move |m: &Message| {
                let _ = tx.send(m.text().into_owned());
            }),
        )
        .unwrap();

        let f = text(Params::new().with("pattern", r"id=(\d+)").with("mode", "extract"));
        let out = Emitter::detached(bus.clone(), topic);
        let matched = f
            .do_filter(&mut Message::new("id=1 id=22 nothing id=333"), &out)
            .unwrap();
        assert!(!matched);

        let got: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(got, vec!["1", "22", "333"]);
    }
}
