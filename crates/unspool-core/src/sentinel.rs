//! Depth sentinel: decides when to stop recursing natively and unwind

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Tuning for the depth sentinel.
///
/// `max_depth` is compared against a counter of logical calls currently on
/// the native stack; it should sit conservatively below the host's real
/// recursion limit. `max_burst_ms`, when set, caps the wall-clock time of one
/// uninterrupted native-recursion burst, bounding worst-case latency on hosts
/// where recursion limits are not reliably enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub max_depth: usize,
    pub max_burst_ms: Option<u64>,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        SentinelConfig {
            max_depth: 256,
            max_burst_ms: None,
        }
    }
}

/// Advisory probe for "the native call stack is close to its limit".
///
/// Purely heuristic: a false negative risks a native stack-overflow fault,
/// which is fatal and outside this component's responsibility.
#[derive(Debug)]
pub struct DepthSentinel {
    depth: usize,
    burst_started: Option<Instant>,
    config: SentinelConfig,
}

impl DepthSentinel {
    pub fn new(config: SentinelConfig) -> Self {
        DepthSentinel {
            depth: 0,
            burst_started: None,
            config,
        }
    }

    /// Should the current call unwind instead of recursing natively?
    pub fn should_unwind(&mut self) -> bool {
        if self.depth >= self.config.max_depth {
            return true;
        }
        if let Some(cap) = self.config.max_burst_ms {
            match self.burst_started {
                Some(started) => {
                    if started.elapsed() >= Duration::from_millis(cap) {
                        return true;
                    }
                }
                None => self.burst_started = Some(Instant::now()),
            }
        }
        false
    }

    /// Logical call entered natively.
    pub(crate) fn enter(&mut self) {
        self.depth += 1;
        if self.config.max_burst_ms.is_some() && self.burst_started.is_none() {
            self.burst_started = Some(Instant::now());
        }
    }

    /// Logical call left natively.
    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Known-safe point: the native stack is empty again.
    pub(crate) fn reset(&mut self) {
        self.depth = 0;
        self.burst_started = None;
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn config(&self) -> SentinelConfig {
        self.config
    }
}
