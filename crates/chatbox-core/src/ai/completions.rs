use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::ChatMessage;

/// Completions proxy served alongside the web client
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/completions";

/// Body POSTed to the completions endpoint. The server is stateless, so
/// `messages` always carries the whole log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// What the endpoint answered, once the body has been understood
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReply {
    /// Status below 400 with a `choices[0].message`
    Message(ChatMessage),
    /// Status 400 or above; `msg` is the server's error text if it sent one
    Rejected { msg: Option<String> },
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// Anything that can turn a request into a reply.
///
/// An `Err` means the exchange itself failed: the request never got an
/// answer, or the answer could not be read.
#[async_trait]
pub trait CompletionsClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply>;
}

#[derive(Clone)]
pub struct HttpCompletionsClient {
    client: Client,
    endpoint: String,
}

impl HttpCompletionsClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for HttpCompletionsClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[async_trait]
impl CompletionsClient for HttpCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if status.as_u16() < 400 {
            parse_success(body)
        } else {
            log::debug!("Completions endpoint answered {}", status);
            Ok(CompletionReply::Rejected {
                msg: error_message(&body),
            })
        }
    }
}

fn parse_success(body: Value) -> Result<CompletionReply> {
    let response: CompletionResponse = serde_json::from_value(body)?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Completions response contained no choices"))?;
    Ok(CompletionReply::Message(choice.message))
}

/// The error body's `msg` as display text. Empty strings, `0`, `false`
/// and `null` count as absent; objects and arrays are ignored.
fn error_message(body: &Value) -> Option<String> {
    match body.get("msg")? {
        Value::String(msg) if !msg.is_empty() => Some(msg.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest {
            key: "sk-1".to_string(),
            model: "gpt-4".to_string(),
            messages: vec![ChatMessage::user("hi")],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "key": "sk-1",
                "model": "gpt-4",
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }

    #[test]
    fn test_parse_success_takes_first_choice() {
        let reply = parse_success(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "first"}},
                {"message": {"role": "assistant", "content": "second"}}
            ]
        }))
        .unwrap();
        assert_eq!(reply, CompletionReply::Message(ChatMessage::assistant("first")));
    }

    #[test]
    fn test_parse_success_without_choices_fails() {
        assert!(parse_success(json!({"choices": []})).is_err());
        assert!(parse_success(json!({"id": "x"})).is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(&json!({"msg": "quota exceeded"})).as_deref(), Some("quota exceeded"));
        assert_eq!(error_message(&json!({"msg": ""})), None);
        assert_eq!(error_message(&json!({"error": "x"})), None);
        assert_eq!(error_message(&json!({"msg": null})), None);
        assert_eq!(error_message(&json!(null)), None);
    }

    #[test]
    fn test_scalar_error_message_is_stringified() {
        assert_eq!(error_message(&json!({"msg": 429})).as_deref(), Some("429"));
        assert_eq!(error_message(&json!({"msg": 1.5})).as_deref(), Some("1.5"));
        assert_eq!(error_message(&json!({"msg": true})).as_deref(), Some("true"));
        assert_eq!(error_message(&json!({"msg": 0})), None);
        assert_eq!(error_message(&json!({"msg": false})), None);
        assert_eq!(error_message(&json!({"msg": {"code": 1}})), None);
    }
}
