use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::inventory::KitchenLocation;
use crate::recipes::GenerationMode;

/// One pipeline event. Pipeline failures are silent toward the user
/// (empty results, no-op speech); this closed set is where they stay
/// observable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KitchenEvent {
    ScanStarted {
        location: KitchenLocation,
    },
    ScanCompleted {
        location: KitchenLocation,
        found: usize,
    },
    PlanStarted {
        mode: GenerationMode,
    },
    PlanCompleted {
        mode: GenerationMode,
        accepted: usize,
        rejected: usize,
    },
    PipelineError {
        operation: String,
        reason: String,
    },
    NarrationStarted {
        backend: String,
    },
    NarrationFinished,
    NarrationFailed {
        reason: String,
    },
}

/// Append-only writer for the session's `events.jsonl`: one compact JSON
/// object per line, stamped with `session_id` and a UTC `ts`.
#[derive(Debug)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn emit(&self, event: &KitchenEvent) -> Result<Value> {
        let mut record = serde_json::to_value(event)?;
        let fields = record
            .as_object_mut()
            .ok_or_else(|| anyhow!("event did not serialize to an object"))?;
        fields.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        fields.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(&record)?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;

        Ok(record)
    }
}
