use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{NoteError, TransportError};

use super::{
    config::CoachConfig,
    prompt::{build_prompt, NoteRequest},
};

/// Used when the service answers successfully but with no text.
pub const FALLBACK_NOTE: &str = "Adjust your technique: keep a steady cadence and an efficient catch.";

/// External text-generation service that writes coaching notes.
#[async_trait]
pub trait NoteGenerator: Send + Sync {
    async fn generate(&self, credential: &str, request: &NoteRequest) -> Result<String, NoteError>;
}

/// Hugging Face inference endpoint (text2text models such as flan-t5).
pub struct HuggingFaceGenerator {
    client: Client,
    model_url: String,
    max_new_tokens: u32,
    temperature: f32,
}

impl HuggingFaceGenerator {
    pub fn new(model_url: impl Into<String>, config: &CoachConfig) -> Self {
        Self {
            client: Client::new(),
            model_url: model_url.into(),
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
        }
    }

    fn request_body(&self, request: &NoteRequest) -> Value {
        json!({
            "inputs": build_prompt(request),
            "parameters": {
                "max_new_tokens": self.max_new_tokens,
                "temperature": self.temperature,
            },
            "options": { "wait_for_model": true },
        })
    }
}

#[async_trait]
impl NoteGenerator for HuggingFaceGenerator {
    async fn generate(&self, credential: &str, request: &NoteRequest) -> Result<String, NoteError> {
        let response = self
            .client
            .post(&self.model_url)
            .bearer_auth(credential)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::from)?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        // Some deployments answer with bare text instead of JSON.
        let parsed = serde_json::from_str(&body).unwrap_or(Value::String(body));
        let text = extract_text(&parsed)?;
        let text = text.trim();
        if text.is_empty() {
            Ok(FALLBACK_NOTE.to_string())
        } else {
            Ok(text.to_string())
        }
    }
}

/// Accepts `[{generated_text}]`, `{generated_text}`, `{summary_text}` or a
/// plain string. An object with an `error` field is a failure.
pub(crate) fn extract_text(body: &Value) -> Result<String, NoteError> {
    match body {
        Value::String(text) => Ok(text.clone()),
        Value::Array(items) => items.first().map_or(Ok(String::new()), extract_text),
        Value::Object(object) => {
            if let Some(error) = object.get("error") {
                let message = error
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return Err(NoteError::Service(message));
            }
            Ok(["generated_text", "summary_text"]
                .iter()
                .find_map(|key| object.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string())
        }
        _ => Ok(String::new()),
    }
}
