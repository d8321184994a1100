//! Model Gateway: the single point of entry for all language-model calls.
//!
//! ARCHITECTURAL RULE: No other module may call the model backend directly.
//! Evaluation code depends on the `ModelGateway` trait, never on `LlmClient`.
//!
//! Backend: any OpenAI-compatible chat completions endpoint (Ollama serves one at
//! `http://localhost:11434/v1`, hosted providers at their own base URL).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

use prompts::JSON_ONLY_SYSTEM;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed completion response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model backend still failing after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Model returned empty content")]
    EmptyContent,
}

/// Sends one rendered prompt to a language model and returns its raw text.
///
/// `expect_json` is a hint: implementations ask the backend for a JSON document
/// when they can, but callers must still treat the text as untrusted.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        expect_json: bool,
    ) -> Result<String, GatewayError>;
}

/// Connection settings for `LlmClient`, built from `Config`.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Extra attempts for transient failures (transport, 429, 5xx).
    pub max_retries: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Extracts the text of the first choice, if it has any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// HTTP implementation of `ModelGateway`.
/// Wraps the chat completions API with a request timeout and bounded retries.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: GatewaySettings,
}

impl LlmClient {
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// Makes a raw call to the backend, returning the full response object.
    /// Retries transport errors, 429 and 5xx with exponential backoff.
    pub async fn call(
        &self,
        prompt: &str,
        temperature: f32,
        expect_json: bool,
    ) -> Result<ChatResponse, GatewayError> {
        let mut messages = Vec::with_capacity(2);
        if expect_json {
            messages.push(ChatMessage {
                role: "system",
                content: JSON_ONLY_SYSTEM,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request_body = ChatRequest {
            model: &self.settings.model,
            messages,
            temperature,
            response_format: expect_json.then_some(ResponseFormat {
                format_type: "json_object",
            }),
            stream: false,
        };

        let attempts = self.settings.max_retries + 1;
        let url = self.completions_url();
        let mut last_error: Option<GatewayError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1).min(5)));
                warn!(
                    "Model call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&url).json(&request_body);
            if let Some(key) = &self.settings.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!("Model backend unreachable: {e}");
                    last_error = Some(GatewayError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Model backend returned {}: {}", status, body);
                last_error = Some(GatewayError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            let body = response.text().await?;

            if !status.is_success() {
                let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(GatewayError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let chat_response: ChatResponse = serde_json::from_str(&body)?;

            if let Some(usage) = &chat_response.usage {
                debug!(
                    "Model call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            return Ok(chat_response);
        }

        Err(last_error.unwrap_or(GatewayError::Exhausted { attempts }))
    }
}

#[async_trait]
impl ModelGateway for LlmClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        expect_json: bool,
    ) -> Result<String, GatewayError> {
        let response = self.call(prompt, temperature, expect_json).await?;
        response
            .text()
            .map(str::to_owned)
            .ok_or(GatewayError::EmptyContent)
    }
}

/// Test doubles: a scripted in-process gateway and a loopback HTTP backend.
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::{GatewayError, ModelGateway};

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub prompt: String,
        pub temperature: f32,
        pub expect_json: bool,
    }

    #[derive(Default)]
    pub struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<String, String>>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedGateway {
        pub fn replying(replies: &[&str]) -> Self {
            let gateway = Self::default();
            for reply in replies {
                gateway.push_reply(reply);
            }
            gateway
        }

        pub fn failing(message: &str) -> Self {
            let gateway = Self::default();
            gateway.push_failure(message);
            gateway
        }

        pub fn push_reply(&self, reply: &str) {
            self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        }

        pub fn push_failure(&self, message: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn complete(
            &self,
            prompt: &str,
            temperature: f32,
            expect_json: bool,
        ) -> Result<String, GatewayError> {
            self.calls.lock().unwrap().push(RecordedCall {
                prompt: prompt.to_string(),
                temperature,
                expect_json,
            });
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(GatewayError::Api {
                    status: 503,
                    message,
                }),
                None => Err(GatewayError::EmptyContent),
            }
        }
    }

    /// Loopback HTTP backend that answers every request with one canned
    /// response and keeps the raw requests it received.
    pub struct StubBackend {
        pub base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubBackend {
        pub async fn start(status: u16, body: &'static str) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&requests);

            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let request = read_request(&mut socket).await;
                    seen.lock().unwrap().push(request);
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self {
                base_url: format!("http://{addr}/v1"),
                requests,
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Raw requests, headers included.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
