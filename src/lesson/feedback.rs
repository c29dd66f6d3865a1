//! Correct / incorrect indicators that switch themselves off
//!
//! Each indicator remembers the tick it was armed at; [`FeedbackTimer::tick`]
//! turns it off once `now - armed >= duration`. The two kinds are
//! independent.

use serde::Serialize;

/// Default on-time of an indicator in milliseconds
pub const DEFAULT_FEEDBACK_MS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Correct,
    Incorrect,
}

impl FeedbackKind {
    const fn index(self) -> usize {
        match self {
            FeedbackKind::Correct => 0,
            FeedbackKind::Incorrect => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeedbackIndicator {
    kind: FeedbackKind,
    armed_at: u64,
    duration: u64,
}

impl FeedbackIndicator {
    fn expired(&self, now: u64) -> bool {
        now.saturating_sub(self.armed_at) >= self.duration
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackTimer {
    duration: u64,
    indicators: [Option<FeedbackIndicator>; 2],
}

impl FeedbackTimer {
    pub fn new(duration: u64) -> Self {
        Self {
            duration,
            indicators: [None; 2],
        }
    }

    /// Light `kind` from `now`, replacing an indicator already lit
    pub fn arm(&mut self, kind: FeedbackKind, now: u64) {
        self.indicators[kind.index()] = Some(FeedbackIndicator {
            kind,
            armed_at: now,
            duration: self.duration,
        });
    }

    /// Switch off expired indicators and report which ones went off
    pub fn tick(&mut self, now: u64) -> Vec<FeedbackKind> {
        let mut expired = Vec::new();
        for slot in &mut self.indicators {
            if let Some(indicator) = slot {
                if indicator.expired(now) {
                    expired.push(indicator.kind);
                    *slot = None;
                }
            }
        }
        expired
    }

    pub fn is_lit(&self, kind: FeedbackKind) -> bool {
        self.indicators[kind.index()].is_some()
    }

    /// Switch both indicators off
    pub fn clear(&mut self) {
        self.indicators = [None; 2];
    }
}

impl Default for FeedbackTimer {
    fn default() -> Self {
        Self::new(DEFAULT_FEEDBACK_MS)
    }
}
