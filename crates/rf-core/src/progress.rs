//! Structured progress events.
//!
//! Passes report progress through a [`ProgressSink`] rather than printing.
//! Nothing in the engine depends on what a sink does with an event.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use rf_common::Remaining;
use serde::Serialize;
use tracing::info;

/// Engine stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Backfill,
    Sync,
    Derive,
    Leakage,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Backfill => write!(f, "backfill"),
            Stage::Sync => write!(f, "sync"),
            Stage::Derive => write!(f, "derive"),
            Stage::Leakage => write!(f, "leakage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageStarted {
        stage: Stage,
        target: Option<Remaining>,
        total: usize,
    },
    BatchCompleted {
        stage: Stage,
        target: Option<Remaining>,
        batch: usize,
        batches: usize,
        done: usize,
        total: usize,
    },
    StageCompleted {
        stage: Stage,
        target: Option<Remaining>,
        changed: usize,
        elapsed_ms: u64,
    },
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Milliseconds since `started`.
pub fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}

/// Receiver for progress events.
pub trait ProgressSink {
    fn emit(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _event: &ProgressEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted {
                stage,
                target,
                total,
            } => {
                info!(%stage, target = ?target, total, "stage started");
            }
            ProgressEvent::BatchCompleted {
                stage,
                target,
                batch,
                batches,
                done,
                total,
            } => {
                info!(%stage, target = ?target, batch, batches, done, total, "batch completed");
            }
            ProgressEvent::StageCompleted {
                stage,
                target,
                changed,
                elapsed_ms,
            } => {
                info!(%stage, target = ?target, changed, elapsed_ms, "stage completed");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: RefCell<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.borrow().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: &ProgressEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_saturate_instead_of_wrapping() {
        assert_eq!(duration_ms(Duration::from_millis(1_500)), 1_500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingProgress::new();
        sink.emit(&ProgressEvent::StageStarted {
            stage: Stage::Sync,
            target: None,
            total: 3,
        });
        sink.emit(&ProgressEvent::StageCompleted {
            stage: Stage::Sync,
            target: None,
            changed: 2,
            elapsed_ms: 0,
        });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProgressEvent::StageStarted { .. }));
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = ProgressEvent::BatchCompleted {
            stage: Stage::Backfill,
            target: Some(Remaining::M800),
            batch: 1,
            batches: 2,
            done: 500,
            total: 900,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "batch_completed");
        assert_eq!(json["stage"], "backfill");
        assert_eq!(json["target"], "800");
    }
}
