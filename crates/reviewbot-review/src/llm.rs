use std::time::Duration;

use async_trait::async_trait;
use reviewbot_core::{LlmConfig, ReviewError};
use serde::{Deserialize, Serialize};

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use reviewbot_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::system("You are a reviewer");
/// assert!(matches!(msg.role, Role::System));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use reviewbot_review::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
}

/// The parts of a chat completion response the reviewer reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatCompletion {
    /// Candidate responses, best first.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// One candidate response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Choice {
    /// The generated message.
    pub message: ResponseMessage,
}

/// Message body of a [`Choice`]. `content` is null for some refusals and
/// tool-call responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseMessage {
    /// Generated text.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// A response with a single text choice.
    ///
    /// # Examples
    ///
    /// ```
    /// use reviewbot_review::llm::ChatCompletion;
    ///
    /// let completion = ChatCompletion::with_content("Looks good");
    /// assert_eq!(completion.choices.len(), 1);
    /// ```
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: Some(content.into()),
                },
            }],
        }
    }
}

/// A failed chat completion request.
///
/// Carries a human-readable message and, when the server answered, its
/// response body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// What went wrong.
    pub message: String,
    /// Response body from the API, if there was one.
    pub payload: Option<serde_json::Value>,
}

impl TransportError {
    /// An error with no response body.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: None,
        }
    }

    /// Attach the API response body.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Sends chat completion requests.
///
/// Implementations make exactly one attempt per call; retries, if any,
/// belong to the caller.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Request a completion for `messages` from `model`.
    async fn create_chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatCompletion, TransportError>;
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes `{base}/chat/completions`:
/// OpenAI, Azure OpenAI proxies, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use reviewbot_core::LlmConfig;
/// use reviewbot_review::llm::OpenAiTransport;
///
/// let transport = OpenAiTransport::new("https://api.openai.com/v1", &LlmConfig::default()).unwrap();
/// assert_eq!(transport.url(), "https://api.openai.com/v1/chat/completions");
/// ```
pub struct OpenAiTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl OpenAiTransport {
    /// Create a client for the API rooted at `api_endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Http`] if the HTTP client cannot be built.
    pub fn new(api_endpoint: &str, config: &LlmConfig) -> Result<Self, ReviewError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: completions_url(api_endpoint),
            api_key: config.resolve_api_key(),
        })
    }

    /// Full URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn create_chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatCompletion, TransportError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
        });

        let mut request = self.client.post(&self.url);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(
                TransportError::new(format!("API error {status}")).with_payload(error_payload(&body_text))
            );
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| TransportError::new(format!("failed to read response: {e}")))?;
        parse_completion(&body_text)
    }
}

fn completions_url(api_endpoint: &str) -> String {
    let base = api_endpoint.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

fn error_payload(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
}

/// Decode a chat completion body.
pub(crate) fn parse_completion(body: &str) -> Result<ChatCompletion, TransportError> {
    serde_json::from_str(body).map_err(|e| {
        TransportError::new(format!("failed to parse response: {e}"))
            .with_payload(error_payload(body))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_succeeds() {
        let transport = OpenAiTransport::new("https://api.openai.com/v1", &LlmConfig::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn completions_url_is_appended_once() {
        assert_eq!(
            completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn chat_message_serializes() {
        let json = serde_json::to_value(ChatMessage::system("hello")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn parse_response_with_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "- Missing bounds check"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let completion = parse_completion(body).unwrap();
        assert_eq!(completion.choices.len(), 1);
        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("- Missing bounds check")
        );
    }

    #[test]
    fn parse_response_with_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let completion = parse_completion(body).unwrap();
        assert!(completion.choices[0].message.content.is_none());
    }

    #[test]
    fn parse_response_without_choices() {
        let completion = parse_completion(r#"{"choices":[]}"#).unwrap();
        assert!(completion.choices.is_empty());
    }

    #[test]
    fn malformed_response_keeps_body_as_payload() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(err.message.starts_with("failed to parse response"));
        assert_eq!(
            err.payload,
            Some(serde_json::Value::String("<html>bad gateway</html>".into()))
        );
    }

    #[test]
    fn json_error_body_is_structured() {
        let payload = error_payload(r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#);
        assert_eq!(payload["error"]["message"], "Rate limit reached");
    }

    /// Answer one HTTP request with `status` and `body`, returning the base URL.
    fn serve_once(status: &'static str, body: &'static str) -> String {
        use std::io::{BufRead, BufReader, Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn error_status_carries_json_body() {
        let base = serve_once(
            "429 Too Many Requests",
            r#"{"error":{"message":"Rate limit reached"}}"#,
        );
        let transport = OpenAiTransport::new(&base, &LlmConfig::default()).unwrap();
        let err = transport
            .create_chat_completion("gpt-4", &[ChatMessage::user("+x")])
            .await
            .unwrap_err();
        assert_eq!(err.message, "API error 429 Too Many Requests");
        assert_eq!(err.to_string(), err.message);
        let payload = err.payload.unwrap();
        assert_eq!(payload["error"]["message"], "Rate limit reached");
    }

    #[tokio::test]
    async fn success_with_non_json_body_is_a_transport_error() {
        let base = serve_once("200 OK", "upstream says hi");
        let transport = OpenAiTransport::new(&base, &LlmConfig::default()).unwrap();
        let err = transport
            .create_chat_completion("gpt-4", &[ChatMessage::user("+x")])
            .await
            .unwrap_err();
        assert!(err.message.starts_with("failed to parse response"));
        assert_eq!(
            err.payload,
            Some(serde_json::Value::String("upstream says hi".into()))
        );
    }

    #[tokio::test]
    async fn success_returns_first_choice() {
        let base = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"- Off by one"}}]}"#,
        );
        let transport = OpenAiTransport::new(&base, &LlmConfig::default()).unwrap();
        let completion = transport
            .create_chat_completion("gpt-4", &[ChatMessage::user("+x")])
            .await
            .unwrap();
        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("- Off by one")
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let config = LlmConfig {
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let transport = OpenAiTransport::new("http://127.0.0.1:1/v1", &config).unwrap();
        let err = transport
            .create_chat_completion("gpt-4", &[ChatMessage::user("+x")])
            .await
            .unwrap_err();
        assert!(err.message.starts_with("request failed"));
        assert!(err.payload.is_none());
    }
}
