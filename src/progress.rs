//! # Progress
//! Job progress state and its publish/subscribe fan-out.
//!
//! A [`ProgressTracker`] is owned by the running job and mutates a
//! [`ProgressState`]; every mutation publishes a full snapshot to a
//! [`ProgressSink`]. [`ProgressHub`] is the sink used by the server: it keeps
//! the latest snapshot for late subscribers and drops subscribers whose
//! channel has closed.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub current: usize,
    pub total: usize,
    pub percent: u32,
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
    pub complete: bool,
    pub error: bool,
    pub message: String,
    pub report_file: Option<String>,
    pub summary_row_count: Option<usize>,
    pub raw_row_count: Option<usize>,
}

/// Result fields attached to a successful completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub report_file: String,
    pub summary_row_count: usize,
    pub raw_row_count: usize,
}

pub trait ProgressSink: Send + Sync {
    fn publish(&self, snapshot: &ProgressState);
}

fn percent_of(current: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((current as f64 / total as f64) * 100.0).round().min(100.0) as u32
}

pub struct ProgressTracker {
    state: ProgressState,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    /// Fresh, empty state; the reset is published immediately.
    pub fn start(sink: Arc<dyn ProgressSink>) -> Self {
        let t = Self {
            state: ProgressState::default(),
            sink,
        };
        t.publish();
        t
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn set_total(&mut self, total: usize) {
        self.state.total = total;
        self.state.percent = percent_of(self.state.current, total);
        self.publish();
    }

    pub fn record_file(&mut self, label: impl Into<String>, count: usize, message: Option<String>) {
        let s = &mut self.state;
        s.current += 1;
        s.labels.push(label.into());
        s.counts.push(count);
        s.percent = percent_of(s.current, s.total);
        s.message = message.unwrap_or_default();
        self.publish();
    }

    pub fn complete(&mut self, success: bool, message: impl Into<String>, outcome: Option<ReportOutcome>) {
        let s = &mut self.state;
        s.complete = true;
        s.error = !success;
        s.message = message.into();
        if success {
            s.percent = 100;
        }
        if let Some(o) = outcome {
            s.report_file = Some(o.report_file);
            s.summary_row_count = Some(o.summary_row_count);
            s.raw_row_count = Some(o.raw_row_count);
        }
        self.publish();
    }

    fn publish(&self) {
        self.sink.publish(&self.state);
    }
}

#[derive(Debug, Default)]
struct HubInner {
    latest: ProgressState,
    subscribers: Vec<mpsc::Sender<ProgressState>>,
}

/// Broadcast registry for live observers.
#[derive(Debug, Clone, Default)]
pub struct ProgressHub {
    inner: Arc<Mutex<HubInner>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; it receives the current snapshot first.
    pub fn subscribe(&self) -> mpsc::Receiver<ProgressState> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut inner = self.inner.lock().expect("progress hub mutex poisoned");
        if tx.try_send(inner.latest.clone()).is_ok() {
            inner.subscribers.push(tx);
        }
        rx
    }

    pub fn snapshot(&self) -> ProgressState {
        self.inner
            .lock()
            .expect("progress hub mutex poisoned")
            .latest
            .clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .expect("progress hub mutex poisoned")
            .subscribers
            .len()
    }
}

impl ProgressSink for ProgressHub {
    fn publish(&self, snapshot: &ProgressState) {
        let mut inner = self.inner.lock().expect("progress hub mutex poisoned");
        inner.latest = snapshot.clone();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            // slow reader: it still gets the next snapshot
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        });
        let pruned = before - inner.subscribers.len();
        if pruned > 0 {
            tracing::debug!(pruned, "progress observers disconnected");
        }
    }
}

/// Sink that only records snapshots; used by the CLI and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub snapshots: Mutex<Vec<ProgressState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<ProgressState> {
        self.snapshots
            .lock()
            .expect("recording sink mutex poisoned")
            .last()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots
            .lock()
            .expect("recording sink mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressSink for RecordingSink {
    fn publish(&self, snapshot: &ProgressState) {
        self.snapshots
            .lock()
            .expect("recording sink mutex poisoned")
            .push(snapshot.clone());
    }
}
