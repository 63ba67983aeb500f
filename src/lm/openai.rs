//! OpenAI-compatible chat completions backend.
use super::{LanguageModel, LmError, LmRequest};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub struct OpenAiLm {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiLm {
    pub fn new(base_url: &str, model: &str, api_key: String, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
            timeout,
        }
    }

    fn body<'a>(&'a self, request: &LmRequest, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: request.max_tokens,
            response_format: request.schema.map(|_| ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

impl LanguageModel for OpenAiLm {
    fn complete(&self, request: &LmRequest) -> Result<String, LmError> {
        let prompt = request.full_prompt();
        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(self.body(request, &prompt))
            .map_err(|err| self.map_error(err))?;
        let parsed: ChatResponse = response
            .body_mut()
            .read_json()
            .map_err(|err| self.map_error(err))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LmError::RemoteCall("chat completion had no content".to_string()))?;

        tracing::info!(
            kind = %request.kind,
            attempt = request.attempt,
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis(),
            prompt_bytes = prompt.len(),
            response_bytes = text.len(),
            "lm invoke complete"
        );
        Ok(text)
    }
}

impl OpenAiLm {
    fn map_error(&self, err: ureq::Error) -> LmError {
        match err {
            ureq::Error::Timeout(_) => LmError::Timeout(self.timeout),
            ureq::Error::StatusCode(status) => {
                LmError::RemoteCall(format!("{} returned HTTP {status}", self.endpoint))
            }
            other => LmError::RemoteCall(format!("{}: {other}", self.endpoint)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::{LmCallKind, OutputSchema};

    fn client() -> OpenAiLm {
        OpenAiLm::new(
            "https://api.example.test/v1/",
            "gpt-4o-mini",
            "sk-test".to_string(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        assert_eq!(
            client().endpoint,
            "https://api.example.test/v1/chat/completions"
        );
    }

    #[test]
    fn structured_requests_ask_for_json_objects() {
        let lm = client();
        let schema = OutputSchema {
            name: "verdict",
            shape: "{}",
        };
        let request =
            LmRequest::structured(LmCallKind::QualityCheck, 1, "p".to_string(), schema)
                .with_max_tokens(64);
        let prompt = request.full_prompt();
        let body = serde_json::to_value(lm.body(&request, &prompt)).expect("serialize");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "user");

        let plain = LmRequest::text(LmCallKind::Answer, 1, "p".to_string());
        let body = serde_json::to_value(lm.body(&plain, "p")).expect("serialize");
        assert!(body.get("response_format").is_none());
        assert!(body.get("max_tokens").is_none());
    }
}
