//! Deadline tracking for a single transition attempt.

/// Monotonic deadline armed when a valve starts moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTimer {
    started_ms: u64,
    timeout_ms: u64,
}

impl TransitionTimer {
    pub fn start(now_ms: u64, timeout_ms: u64) -> Self {
        Self {
            started_ms: now_ms,
            timeout_ms,
        }
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_ms)
    }

    /// True once the full timeout has elapsed (inclusive).
    pub fn has_timed_out(&self, now_ms: u64) -> bool {
        self.elapsed_ms(now_ms) >= self.timeout_ms
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.timeout_ms.saturating_sub(self.elapsed_ms(now_ms))
    }
}
