//! Scripted language model for workflow tests.
use crate::lm::{LanguageModel, LmCallKind, LmError, LmRequest};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Replays queued responses per call kind and records every request.
///
/// When a kind's queue holds a single response it is repeated forever, so
/// "always approve" or "always reject" scripts need one entry.
#[derive(Default)]
pub struct ScriptedLm {
    responses: Mutex<HashMap<LmCallKind, VecDeque<Result<String, String>>>>,
    calls: Mutex<Vec<LmRequest>>,
}

impl ScriptedLm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, kind: LmCallKind, text: &str) -> Self {
        self.push(kind, Ok(text.to_string()))
    }

    /// Queue a transport failure for `kind`.
    pub fn fail(self, kind: LmCallKind, message: &str) -> Self {
        self.push(kind, Err(message.to_string()))
    }

    fn push(self, kind: LmCallKind, response: Result<String, String>) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(kind)
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<LmRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_of(&self, kind: LmCallKind) -> Vec<LmRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.kind == kind)
            .collect()
    }

    pub fn kinds(&self) -> Vec<LmCallKind> {
        self.calls().iter().map(|call| call.kind).collect()
    }
}

impl LanguageModel for ScriptedLm {
    fn complete(&self, request: &LmRequest) -> Result<String, LmError> {
        self.calls.lock().expect("calls lock").push(request.clone());
        let mut responses = self.responses.lock().expect("responses lock");
        let queue = responses
            .get_mut(&request.kind)
            .unwrap_or_else(|| panic!("no scripted response for {}", request.kind));
        let response = if queue.len() > 1 {
            queue.pop_front().expect("non-empty queue")
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| panic!("no scripted response for {}", request.kind))
        };
        response.map_err(LmError::RemoteCall)
    }
}

pub fn verdict(approved: bool, reason: &str) -> String {
    serde_json::json!({ "judge": approved, "reason": reason }).to_string()
}

pub fn clarification(need: bool, questions: &[&str]) -> String {
    serde_json::json!({ "need": need, "reasons": [], "questions": questions }).to_string()
}
