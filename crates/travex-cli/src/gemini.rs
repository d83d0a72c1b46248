//! Schema-constrained extraction over a `generateContent` HTTP API.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use travex_core::models::AiConfig;
use travex_core::{DocumentPayload, ExtractionRequest, ExtractionService, ServiceError};

/// Longest error body echoed back in a service error.
const MAX_ERROR_BODY: usize = 300;

/// HTTP client for a Gemini-style generative API.
pub struct GeminiClient {
    client: Client,
    url: String,
    api_key: String,
}

impl GeminiClient {
    /// Build a client. The API key is read from the environment variable
    /// named in the configuration.
    pub fn from_config(config: &AiConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!(
                "AI extraction needs an API key in ${} (or run with --no-ai)",
                config.api_key_env
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            api_key,
        })
    }
}

impl ExtractionService for GeminiClient {
    async fn extract(&self, request: &ExtractionRequest) -> Result<String, ServiceError> {
        let body = request_body(request);
        debug!("POST {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout { service: "AI" }
                } else {
                    ServiceError::Ai(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(ServiceError::Ai(format!("HTTP {}: {}", status, text)));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Ai(format!("invalid response envelope: {}", e)))?;

        response_text(&envelope)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Ai("response has no candidate text".to_string()))
    }
}

fn request_body(request: &ExtractionRequest) -> Value {
    let document = match &request.payload {
        DocumentPayload::Text(text) => json!({ "text": text }),
        DocumentPayload::Image { mime_type, bytes } => json!({
            "inline_data": {
                "mime_type": mime_type,
                "data": STANDARD.encode(bytes),
            }
        }),
    };

    json!({
        "contents": [{
            "parts": [{ "text": request.prompt }, document]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": api_schema(&request.schema),
        }
    })
}

/// The API spells schema types in upper case (`OBJECT`, `ARRAY`, ...).
fn api_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = match (key.as_str(), value) {
                        ("type", Value::String(t)) => Value::String(t.to_uppercase()),
                        _ => api_schema(value),
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(api_schema).collect()),
        other => other.clone(),
    }
}

/// `candidates[0].content.parts[0].text`
fn response_text(envelope: &Value) -> Option<&str> {
    envelope
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use travex_core::expense_schema;

    #[test]
    fn test_schema_types_are_upper_case() {
        let schema = api_schema(&expense_schema());
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["expenses"]["type"], "ARRAY");
        assert_eq!(
            schema["properties"]["expenses"]["items"]["properties"]["amount"]["type"],
            "NUMBER"
        );
        assert_eq!(schema["required"], json!(["expenses"]));
    }

    #[test]
    fn test_image_payload_is_inlined() {
        let request = ExtractionRequest {
            prompt: "Extract".to_string(),
            payload: DocumentPayload::Image {
                mime_type: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            },
            schema: expense_schema(),
        };
        let body = request_body(&request);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Extract");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_response_text() {
        let envelope = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"expenses\":[]}" }] } }]
        });
        assert_eq!(response_text(&envelope), Some("{\"expenses\":[]}"));
        assert_eq!(response_text(&json!({ "candidates": [] })), None);
    }
}
