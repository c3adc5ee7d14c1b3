#![allow(dead_code)]

//! Source tracker — per-source lifecycle for progress display.
//!
//! ```text
//! Pending ──batch──▶ Streaming ──done──▶ Done
//!    │                  │
//!    └──done──▶ Done    └──source error──▶ Error
//!    └──source error / timeout──▶ Error
//! ```
//!
//! Anything else (a batch for a finished source, a second completion) is an
//! anomaly: it is logged and leaves the status untouched.

use serde::Serialize;
use tracing::warn;

use crate::models::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Pending,
    Streaming,
    Done,
    Error,
}

impl SourceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SourceStatus::Done | SourceStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceState {
    pub source: Source,
    pub status: SourceStatus,
    /// Set iff `status == Error`.
    pub error: Option<String>,
    /// Results delivered for this source so far, anomalous batches included.
    pub delivered: usize,
}

impl SourceState {
    fn pending(source: Source) -> Self {
        Self {
            source,
            status: SourceStatus::Pending,
            error: None,
            delivered: 0,
        }
    }

    /// Short progress line for the UI.
    pub fn label(&self) -> String {
        match self.status {
            SourceStatus::Pending => format!("searching {}…", self.source),
            SourceStatus::Streaming => format!("{}: {} so far…", self.source, self.delivered),
            SourceStatus::Done => format!("{} done ({})", self.source, self.delivered),
            SourceStatus::Error => format!(
                "{} failed: {}",
                self.source,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Result of applying one input to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status changed along a legal edge.
    Advanced,
    /// Legal input that does not move the status (another batch while streaming).
    Stayed,
    /// Illegal input; status untouched.
    Anomaly,
}

#[derive(Debug, Clone)]
pub struct SourceTracker {
    states: Vec<SourceState>,
}

impl SourceTracker {
    /// Every source starts Pending. Order follows `sources`.
    pub fn new(sources: &[Source]) -> Self {
        let mut states: Vec<SourceState> = Vec::with_capacity(sources.len());
        for &source in sources {
            if !states.iter().any(|s| s.source == source) {
                states.push(SourceState::pending(source));
            }
        }
        Self { states }
    }

    pub fn contains(&self, source: Source) -> bool {
        self.get(source).is_some()
    }

    pub fn get(&self, source: Source) -> Option<&SourceState> {
        self.states.iter().find(|s| s.source == source)
    }

    fn get_mut(&mut self, source: Source) -> Option<&mut SourceState> {
        self.states.iter_mut().find(|s| s.source == source)
    }

    pub fn states(&self) -> &[SourceState] {
        &self.states
    }

    /// Sources still Pending or Streaming.
    pub fn outstanding(&self) -> Vec<Source> {
        self.states
            .iter()
            .filter(|s| !s.status.is_terminal())
            .map(|s| s.source)
            .collect()
    }

    pub fn pending(&self) -> Vec<Source> {
        self.states
            .iter()
            .filter(|s| s.status == SourceStatus::Pending)
            .map(|s| s.source)
            .collect()
    }

    /// Records `count` delivered results for `source`.
    /// Returns `None` when the source is not tracked.
    pub fn record_batch(&mut self, source: Source, count: usize) -> Option<Transition> {
        let state = self.get_mut(source)?;
        state.delivered += count;
        let transition = match state.status {
            SourceStatus::Pending => {
                state.status = SourceStatus::Streaming;
                Transition::Advanced
            }
            SourceStatus::Streaming => Transition::Stayed,
            SourceStatus::Done | SourceStatus::Error => {
                warn!(
                    source = %source,
                    status = ?state.status,
                    count,
                    "batch received for a source that already finished"
                );
                Transition::Anomaly
            }
        };
        Some(transition)
    }

    /// Applies the session-wide completion: every outstanding source becomes Done.
    /// Returns the sources that changed.
    pub fn complete_all(&mut self) -> Vec<Source> {
        let mut changed = Vec::new();
        for state in self.states.iter_mut() {
            if !state.status.is_terminal() {
                state.status = SourceStatus::Done;
                changed.push(state.source);
            }
        }
        changed
    }

    /// Source-scoped failure.
    pub fn fail(&mut self, source: Source, message: impl Into<String>) -> Option<Transition> {
        let state = self.get_mut(source)?;
        if state.status.is_terminal() {
            warn!(
                source = %source,
                status = ?state.status,
                "failure reported for a source that already finished"
            );
            return Some(Transition::Anomaly);
        }
        state.status = SourceStatus::Error;
        state.error = Some(message.into());
        Some(Transition::Advanced)
    }

    /// Fails every source that is still Pending. Returns the sources that changed.
    pub fn expire_pending(&mut self, message: &str) -> Vec<Source> {
        let pending = self.pending();
        for &source in &pending {
            self.fail(source, message);
        }
        pending
    }
}
