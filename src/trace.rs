//! JSONL trace capture for sessions.
//!
//! [`JsonlTraceSink`] is a [`SessionObserver`] that hands events to a
//! background writer thread, one JSON object per line. Drop every clone of
//! the sink and call [`TraceWorker::join`] to flush.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::observer::{
    CompletionEvent, DegeneracyEvent, ObserverError, SessionEvent, SessionObserver, TrialEvent,
};

#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub event: SessionEvent,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("trace channel closed")]
    Closed,
    #[error("trace worker failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone)]
pub struct JsonlTraceSink {
    sender: mpsc::Sender<TraceRecord>,
}

#[derive(Debug)]
pub struct TraceWorker {
    handle: Option<std::thread::JoinHandle<Result<(), TraceError>>>,
}

impl TraceWorker {
    pub fn join(mut self) -> Result<(), TraceError> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(TraceError::Join("trace worker panicked".to_string())),
            },
            None => Ok(()),
        }
    }
}

impl JsonlTraceSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, TraceWorker), TraceError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<TraceRecord>();
        let handle = std::thread::spawn(move || write_trace_loop(file, receiver));
        Ok((
            Self { sender },
            TraceWorker {
                handle: Some(handle),
            },
        ))
    }

    pub fn record(&self, event: SessionEvent) -> Result<(), TraceError> {
        let record = TraceRecord {
            timestamp_ms: now_epoch_ms(),
            event,
        };
        self.sender.send(record).map_err(|_| TraceError::Closed)
    }
}

impl SessionObserver for JsonlTraceSink {
    fn on_trial(&self, event: &TrialEvent) -> Result<(), ObserverError> {
        self.record(SessionEvent::Trial(event.clone()))
            .map_err(|e| ObserverError::Message(e.to_string()))
    }

    fn on_degeneracy(&self, event: &DegeneracyEvent) -> Result<(), ObserverError> {
        self.record(SessionEvent::Degeneracy(event.clone()))
            .map_err(|e| ObserverError::Message(e.to_string()))
    }

    fn on_complete(&self, event: &CompletionEvent) -> Result<(), ObserverError> {
        self.record(SessionEvent::Complete(event.clone()))
            .map_err(|e| ObserverError::Message(e.to_string()))
    }
}

fn write_trace_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<TraceRecord>,
) -> Result<(), TraceError> {
    let mut writer = BufWriter::new(file);
    for record in receiver {
        let line = serde_json::to_string(&record).map_err(|e| TraceError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
