//! JSONL call log for LM transparency.
//!
//! When enabled, every LM call made during a run is appended to a log file as
//! one JSON object per line:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"attempt":1,"kind":"role_selection","duration_ms":420,"outcome":"success",...}
//! {"schema_version":1,"ts":1707900000600,"attempt":1,"kind":"answer","duration_ms":3100,"outcome":"failed","error":"...",...}
//! ```
use super::{LanguageModel, LmCallKind, LmError, LmRequest};
use crate::util::{now_epoch_ms, preview};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Current schema version for call log entries.
pub const CALL_LOG_SCHEMA_VERSION: u32 = 1;

const PREVIEW_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub schema_version: u32,
    /// Unix timestamp in milliseconds when the call started.
    pub ts: u64,
    pub attempt: u32,
    pub kind: LmCallKind,
    pub duration_ms: u64,
    pub outcome: CallOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
}

/// Decorator that records each call of the wrapped model.
///
/// Log write failures are reported through tracing and never fail the call.
pub struct LoggedLm<L> {
    inner: L,
    path: PathBuf,
}

impl<L: LanguageModel> LoggedLm<L> {
    pub fn new(inner: L, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
        }
    }
}

impl<L: LanguageModel> LanguageModel for LoggedLm<L> {
    fn complete(&self, request: &LmRequest) -> Result<String, LmError> {
        let ts = now_epoch_ms();
        let start = Instant::now();
        let result = self.inner.complete(request);
        let (outcome, error, response_preview) = match &result {
            Ok(text) => (CallOutcome::Success, None, Some(preview(text, PREVIEW_BYTES))),
            Err(err) => (CallOutcome::Failed, Some(err.to_string()), None),
        };
        let entry = CallLogEntry {
            schema_version: CALL_LOG_SCHEMA_VERSION,
            ts,
            attempt: request.attempt,
            kind: request.kind,
            duration_ms: start.elapsed().as_millis() as u64,
            outcome,
            error,
            prompt_preview: Some(preview(&request.prompt, PREVIEW_BYTES)),
            response_preview,
        };
        if let Err(err) = append_call_log(&self.path, &entry) {
            tracing::warn!(path = %self.path.display(), error = %err, "call log write failed");
        }
        result
    }
}

fn append_call_log(path: &Path, entry: &CallLogEntry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("create call log directory")?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open call log for append: {}", path.display()))?;
    let line = serde_json::to_string(entry).context("serialize call log entry")?;
    writeln!(file, "{line}").context("write call log entry")?;
    Ok(())
}

/// Load all entries, skipping lines that do not parse.
pub fn load_call_log(path: &Path) -> Result<Vec<CallLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("open call log: {}", path.display()))?;
    let mut entries = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read line {} of call log", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CallLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(line = line_num + 1, error = %err, "skip corrupt call log entry");
            }
        }
    }
    Ok(entries)
}
