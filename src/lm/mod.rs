//! Language model boundary.
//!
//! Every stage talks to the model through [`LanguageModel`]: a rendered prompt
//! goes in, raw text comes out. Stages that need structured output call
//! [`complete_structured`], which returns a typed [`Structured`] value instead
//! of an untyped JSON map.
//!
//! # Backends
//!
//! - [`CommandLm`]: a user-configured local command. The prompt is written to
//!   stdin and the response read from stdout, so any tool that accepts text
//!   (`llm`, `ollama run`, a wrapper script) works.
//! - [`OpenAiLm`]: an OpenAI-compatible `/chat/completions` endpoint.
//!
//! [`LoggedLm`] wraps either one and appends a JSONL entry per call.
//!
//! # Response Format
//!
//! When a request carries an [`OutputSchema`], backends append a response
//! format section describing the JSON shape. Responses may wrap the JSON in
//! markdown fences; those are stripped before parsing.
mod command;
mod log;
mod openai;

pub use command::CommandLm;
pub use log::{load_call_log, CallLogEntry, LoggedLm};
pub use openai::OpenAiLm;

use crate::config::{LmBackend, LmSettings};
use crate::error::ErrorKind;
use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which stage issued a call; used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmCallKind {
    RoleSelection,
    Clarification,
    Answer,
    QualityCheck,
}

impl fmt::Display for LmCallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoleSelection => write!(f, "role_selection"),
            Self::Clarification => write!(f, "clarification"),
            Self::Answer => write!(f, "answer"),
            Self::QualityCheck => write!(f, "quality_check"),
        }
    }
}

/// Shape of the JSON a structured request expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSchema {
    pub name: &'static str,
    /// Example object shown to the model.
    pub shape: &'static str,
}

#[derive(Debug, Clone)]
pub struct LmRequest {
    pub kind: LmCallKind,
    /// 1-based answer attempt the call belongs to.
    pub attempt: u32,
    /// Fully rendered instructions.
    pub prompt: String,
    pub schema: Option<OutputSchema>,
    /// Generation-length cap, honored by backends that support one.
    pub max_tokens: Option<u32>,
}

impl LmRequest {
    pub fn text(kind: LmCallKind, attempt: u32, prompt: String) -> Self {
        Self {
            kind,
            attempt,
            prompt,
            schema: None,
            max_tokens: None,
        }
    }

    pub fn structured(
        kind: LmCallKind,
        attempt: u32,
        prompt: String,
        schema: OutputSchema,
    ) -> Self {
        Self {
            schema: Some(schema),
            ..Self::text(kind, attempt, prompt)
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Prompt text including the response format section, if any.
    pub fn full_prompt(&self) -> String {
        match self.schema {
            Some(schema) => format!(
                "{}\n\n# Response Format\n\nRespond ONLY with a JSON object of this shape, no other text:\n```json\n{}\n```\n",
                self.prompt.trim_end(),
                schema.shape
            ),
            None => self.prompt.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LmError {
    #[error("LM call failed: {0}")]
    RemoteCall(String),
    #[error("LM call exceeded {}s deadline", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("LM output does not match {schema}: {detail}")]
    SchemaViolation {
        schema: &'static str,
        detail: String,
        raw: String,
    },
}

impl LmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteCall(_) => ErrorKind::RemoteCallError,
            Self::Timeout(_) => ErrorKind::RemoteCallTimeout,
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
        }
    }
}

/// A blocking request/response language model.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, request: &LmRequest) -> Result<String, LmError>;
}

impl<T: LanguageModel + ?Sized> LanguageModel for Box<T> {
    fn complete(&self, request: &LmRequest) -> Result<String, LmError> {
        (**self).complete(request)
    }
}

/// Outcome of a structured call: either a typed value or the raw text that
/// failed to conform.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured<T> {
    Parsed(T),
    SchemaViolation {
        schema: &'static str,
        detail: String,
        raw: String,
    },
}

impl<T> Structured<T> {
    pub fn into_result(self) -> Result<T, LmError> {
        match self {
            Self::Parsed(value) => Ok(value),
            Self::SchemaViolation {
                schema,
                detail,
                raw,
            } => Err(LmError::SchemaViolation {
                schema,
                detail,
                raw,
            }),
        }
    }
}

/// Issue a structured request and decode the response.
///
/// Transport failures are returned as `Err`; non-conforming output is
/// returned as [`Structured::SchemaViolation`].
pub fn complete_structured<T: DeserializeOwned>(
    lm: &dyn LanguageModel,
    request: &LmRequest,
) -> Result<Structured<T>, LmError> {
    let schema = request.schema.map(|schema| schema.name).unwrap_or("json");
    let raw = lm.complete(request)?;
    Ok(parse_structured(schema, raw))
}

pub(crate) fn parse_structured<T: DeserializeOwned>(
    schema: &'static str,
    raw: String,
) -> Structured<T> {
    match serde_json::from_str::<T>(extract_json(&raw)) {
        Ok(value) => Structured::Parsed(value),
        Err(err) => {
            tracing::debug!(schema, error = %err, "structured LM output rejected");
            Structured::SchemaViolation {
                schema,
                detail: format!("{err} at line {}, column {}", err.line(), err.column()),
                raw,
            }
        }
    }
}

/// Extract a JSON payload from a response that may wrap it in code fences or
/// surround it with prose.
pub(crate) fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip language identifier if present
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    // Prose around a bare object
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }

    text
}

/// Build the configured backend.
pub fn build_client(settings: &LmSettings) -> Result<Box<dyn LanguageModel>> {
    let timeout = Duration::from_secs(settings.timeout_seconds);
    match settings.backend {
        LmBackend::Command => {
            let command = settings.command.as_deref().ok_or_else(|| {
                anyhow!(
                    "no LM command configured (use --lm, lm.command in the config, or {})",
                    crate::config::LM_COMMAND_ENV
                )
            })?;
            Ok(Box::new(CommandLm::new(command, timeout)?))
        }
        LmBackend::Openai => {
            let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
                anyhow!(
                    "openai backend requires an API key in ${}",
                    settings.api_key_env
                )
            })?;
            Ok(Box::new(OpenAiLm::new(
                &settings.base_url,
                &settings.model,
                api_key,
                timeout,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        judge: bool,
        reason: String,
    }

    struct Canned(&'static str);

    impl LanguageModel for Canned {
        fn complete(&self, _request: &LmRequest) -> Result<String, LmError> {
            Ok(self.0.to_string())
        }
    }

    const VERDICT_SCHEMA: OutputSchema = OutputSchema {
        name: "verdict",
        shape: r#"{"judge": true, "reason": "..."}"#,
    };

    fn request() -> LmRequest {
        LmRequest::structured(LmCallKind::QualityCheck, 1, "judge it".to_string(), VERDICT_SCHEMA)
    }

    #[test]
    fn test_extract_json_plain() {
        let text = r#"{"judge": true}"#;
        assert_eq!(extract_json(text), r#"{"judge": true}"#);
    }

    #[test]
    fn test_extract_json_with_fences() {
        let text = "Here is the verdict:\n```json\n{\"judge\": false}\n```\nThanks";
        assert_eq!(extract_json(text), "{\"judge\": false}");
    }

    #[test]
    fn test_extract_json_plain_fence_with_language() {
        let text = "```javascript\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_surrounded_by_prose() {
        let text = "Sure! {\"a\": 1} hope that helps";
        assert_eq!(extract_json(text), "{\"a\": 1}");
    }

    #[test]
    fn structured_call_parses_conforming_output() {
        let lm = Canned("```json\n{\"judge\": true, \"reason\": \"fine\"}\n```");
        let result: Structured<Verdict> = complete_structured(&lm, &request()).expect("call");
        assert_eq!(
            result,
            Structured::Parsed(Verdict {
                judge: true,
                reason: "fine".to_string()
            })
        );
    }

    #[test]
    fn structured_call_reports_violation_with_raw_text() {
        let lm = Canned("I think it is good");
        let result: Structured<Verdict> = complete_structured(&lm, &request()).expect("call");
        match result {
            Structured::SchemaViolation { schema, raw, .. } => {
                assert_eq!(schema, "verdict");
                assert_eq!(raw, "I think it is good");
            }
            other => panic!("expected violation, got {other:?}"),
        }
        let err = parse_structured::<Verdict>("verdict", "nope".to_string())
            .into_result()
            .expect_err("violation");
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }

    #[test]
    fn full_prompt_appends_schema_only_for_structured_requests() {
        let structured = request().full_prompt();
        assert!(structured.starts_with("judge it"));
        assert!(structured.contains("# Response Format"));
        assert!(structured.contains(VERDICT_SCHEMA.shape));

        let text = LmRequest::text(LmCallKind::Answer, 1, "answer it".to_string());
        assert_eq!(text.full_prompt(), "answer it");
    }
}
