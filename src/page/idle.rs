//! Network idle detection
//!
//! [`IdleTracker`] is a pure state machine over the network events of one
//! session. It either runs the idle timer (no matching request outstanding)
//! or tracks the outstanding set; the wait built on it completes when the
//! timer's deadline passes.

use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::cdp::protocol::RequestId;
use crate::cdp::{CdpEvent, Event};
use crate::{Error, Result};

/// Include/exclude URL filter
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl UrlFilter {
    pub fn new(includes: &[&str], excludes: &[&str]) -> Result<Self> {
        Ok(Self {
            includes: compile(includes)?,
            excludes: compile(excludes)?,
        })
    }

    /// Passes when some include matches (or there are none) and no exclude does
    pub fn matches(&self, url: &str) -> bool {
        let included = self.includes.is_empty() || self.includes.iter().any(|r| r.is_match(url));
        included && !self.excludes.iter().any(|r| r.is_match(url))
    }
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(Error::from))
        .collect()
}

/// Idle-timer state machine
#[derive(Debug)]
pub struct IdleTracker {
    filter: UrlFilter,
    idle: Duration,
    outstanding: HashSet<RequestId>,
    /// `Some` while the idle timer runs
    deadline: Option<Instant>,
}

impl IdleTracker {
    /// Start with the timer running from `now`
    pub fn new(filter: UrlFilter, idle: Duration, now: Instant) -> Self {
        Self {
            filter,
            idle,
            outstanding: HashSet::new(),
            deadline: Some(now + idle),
        }
    }

    /// When the wait completes, unless more events arrive first
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Feed one event observed at `now`
    pub fn observe(&mut self, raw: &CdpEvent, now: Instant) {
        let event = match Event::decode(raw) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(e) => {
                warn!(method = %raw.method, "Ignoring malformed event: {}", e);
                return;
            }
        };

        match event {
            Event::RequestWillBeSent(sent) => {
                if self.filter.matches(&sent.request.url) {
                    self.deadline = None;
                    self.outstanding.insert(sent.request_id);
                }
            }
            Event::LoadingFinished(done) => self.settle(&done.request_id, now),
            Event::LoadingFailed(failed) => self.settle(&failed.request_id, now),
            _ => {}
        }
    }

    fn settle(&mut self, id: &RequestId, now: Instant) {
        if self.outstanding.remove(id) && self.outstanding.is_empty() {
            self.deadline = Some(now + self.idle);
        }
    }
}
