//! Progress reporting for the resume pipeline.
//!
//! The orchestrator talks to a `ProgressObserver`; the HTTP layer plugs in a
//! `ProgressBoard` entry per identity so a client can poll which phase is
//! active and how far along it is.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-invocation pipeline state. No state is re-entered within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Validating,
    Uploading,
    Extracting,
    Merging,
    Persisting,
    Succeeded,
    Failed,
}

/// The two progress phases a client can display. Each is scaled 0–100 on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uploading,
    Extracting,
}

pub trait ProgressObserver: Send + Sync {
    fn stage_changed(&self, stage: PipelineStage);

    fn progress(&self, phase: Phase, percent: u8);

    /// Called once when an invocation fails, with the user-facing message.
    fn failed(&self, _message: &str) {}
}

/// Clamps reports into 0–100 and suppresses values lower than the last one
/// forwarded, so observers only ever see a non-decreasing sequence.
pub struct MonotonicProgress<'a> {
    observer: &'a dyn ProgressObserver,
    phase: Phase,
    last: AtomicU8,
}

impl<'a> MonotonicProgress<'a> {
    pub fn new(observer: &'a dyn ProgressObserver, phase: Phase) -> Self {
        Self {
            observer,
            phase,
            last: AtomicU8::new(0),
        }
    }

    pub fn start(&self) {
        self.observer.progress(self.phase, 0);
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent >= previous {
            self.observer.progress(self.phase, percent);
        }
    }

    /// Reports a fraction in [0, 1], as OCR engines do.
    pub fn report_fraction(&self, fraction: f32) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.report((fraction * 100.0).round() as u8);
    }

    pub fn complete(&self) {
        self.report(100);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressSnapshot {
    pub stage: PipelineStage,
    pub phase: Option<Phase>,
    pub percent: u8,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Idle,
            phase: None,
            percent: 0,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Latest progress per identity, shared across handlers.
#[derive(Clone, Default)]
pub struct ProgressBoard {
    entries: Arc<RwLock<HashMap<String, ProgressSnapshot>>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, uid: &str) -> ProgressSnapshot {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(uid).cloned())
            .unwrap_or_default()
    }

    /// Observer that writes into this board under `uid`.
    pub fn observer(&self, uid: &str) -> BoardObserver {
        BoardObserver {
            board: self.clone(),
            uid: uid.to_string(),
        }
    }

    fn update(&self, uid: &str, f: impl FnOnce(&mut ProgressSnapshot)) {
        // A poisoned lock only means a panicked writer; progress is advisory.
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries.entry(uid.to_string()).or_default();
        f(entry);
        entry.updated_at = Utc::now();
    }
}

pub struct BoardObserver {
    board: ProgressBoard,
    uid: String,
}

impl ProgressObserver for BoardObserver {
    fn stage_changed(&self, stage: PipelineStage) {
        self.board.update(&self.uid, |s| {
            if stage == PipelineStage::Validating {
                *s = ProgressSnapshot::default();
            }
            s.stage = stage;
        });
    }

    fn progress(&self, phase: Phase, percent: u8) {
        self.board.update(&self.uid, |s| {
            s.phase = Some(phase);
            s.percent = percent;
        });
    }

    fn failed(&self, message: &str) {
        self.board.update(&self.uid, |s| {
            s.stage = PipelineStage::Failed;
            s.error = Some(message.to_string());
        });
    }
}
