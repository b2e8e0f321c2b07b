//! OpenAI-compatible streaming transport.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/v1/chat/completions` with SSE streaming.
//!
//! Only the text channel of the API is used. Tool calls travel inside the
//! streamed text as tag-protocol elements, so the native function-calling
//! surface is never requested.

use async_trait::async_trait;
use futures::StreamExt;
use lorecall_core::{ModelTransport, StreamFragment, TransportError, TransportRequest, Usage};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// A transport for OpenAI-compatible `/chat/completions` endpoints.
pub struct SseTransport {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SseTransport {
    /// Create a transport against an OpenAI-compatible base URL.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenRouter transport (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI transport (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama transport (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

#[async_trait]
impl ModelTransport for SseTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamFragment, TransportError>>,
        TransportError,
    > {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(transport = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(TransportError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(TransportError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Transport streaming error");
            return Err(TransportError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let transport_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            // Raw bytes, decoded one complete line at a time: a multi-byte
            // character split across network chunks stays buffered until its
            // line arrives whole.
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(TransportError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                // Process complete lines
                while let Some(line) = next_line(&mut buffer) {
                    // Skip empty lines and SSE comments
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    // "[DONE]" signals end of stream
                    if data == "[DONE]" {
                        let _ = tx.send(Ok(StreamFragment::finished(None))).await;
                        return;
                    }

                    match serde_json::from_str::<ChunkResponse>(data) {
                        Ok(chunk) => {
                            if let Some(choice) = chunk.choices.first() {
                                let has_content =
                                    choice.delta.content.as_ref().is_some_and(|c| !c.is_empty());
                                if has_content {
                                    let fragment = StreamFragment {
                                        content: choice.delta.content.clone(),
                                        done: false,
                                        usage: None,
                                    };
                                    if tx.send(Ok(fragment)).await.is_err() {
                                        return; // receiver dropped
                                    }
                                }
                            }

                            // Usage arrives in a trailing chunk (stream_options)
                            if let Some(usage) = chunk.usage {
                                let _ = tx
                                    .send(Ok(StreamFragment::finished(Some(Usage {
                                        prompt_tokens: usage.prompt_tokens,
                                        completion_tokens: usage.completion_tokens,
                                        total_tokens: usage.total_tokens,
                                    }))))
                                    .await;
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(
                                transport = %transport_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(StreamFragment::finished(None))).await;
        });

        Ok(rx)
    }
}

/// Take the next complete line off the front of the buffer, stripping the
/// newline and any trailing `\r`. UTF-8 never puts a `\n` byte inside a
/// multi-byte sequence, so splitting here cannot cut a character in half;
/// only whole lines are ever decoded.
fn next_line(buffer: &mut Vec<u8>) -> Option<String> {
    let end = buffer.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=end).collect();
    let text = String::from_utf8_lossy(&line[..end]);
    Some(text.trim_end_matches('\r').to_string())
}

// --- SSE chunk types (internal) ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openrouter_constructor() {
        let transport = SseTransport::openrouter("sk-test");
        assert_eq!(transport.name(), "openrouter");
        assert!(transport.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let transport = SseTransport::ollama(None);
        assert_eq!(transport.name(), "ollama");
        assert!(transport.base_url.contains("localhost:11434"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = SseTransport::new("local", "http://localhost:8000/v1/", "key");
        assert_eq!(transport.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let transport = SseTransport::new("local", "http://localhost:8000/v1", "sk-secret");
        let rendered = format!("{transport:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
    }

    // --- Line buffering tests ---

    #[test]
    fn next_line_waits_for_the_newline() {
        let mut buffer = b"data: {\"partial\"".to_vec();
        assert_eq!(next_line(&mut buffer), None);

        buffer.extend_from_slice(b": 1}\nrest");
        assert_eq!(
            next_line(&mut buffer).as_deref(),
            Some("data: {\"partial\": 1}")
        );
        assert_eq!(buffer, b"rest");
    }

    #[test]
    fn multibyte_character_split_across_chunks_survives() {
        // "€" is E2 82 AC; the chunk boundary falls inside it.
        let mut buffer = b"data: \xE2\x82".to_vec();
        assert_eq!(next_line(&mut buffer), None);

        buffer.extend_from_slice(b"\xAC!\r\n");
        let line = next_line(&mut buffer).unwrap();
        assert_eq!(line, "data: €!");
        assert!(!line.contains('\u{FFFD}'));
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let parsed: ChunkResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn parse_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: ChunkResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn parse_usage_chunk() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: ChunkResponse = serde_json::from_str(data).unwrap();
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn parse_chunk_with_tag_markup_in_content() {
        // Tag elements ride the text channel untouched.
        let data = r#"{"choices":[{"delta":{"content":"<thinking>let"},"finish_reason":null}]}"#;
        let parsed: ChunkResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].delta.content.as_deref(),
            Some("<thinking>let")
        );
    }

    #[test]
    fn parse_empty_delta() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":null}]}"#;
        let parsed: ChunkResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());
    }
}
