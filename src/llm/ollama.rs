use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{LlmError, SummaryModel, TokenStream};

/// Ollama HTTP client for local summary generation.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// The client has a connect timeout only; generation may take minutes.
    pub fn new(base_url: &str, model: &str) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::Connection(self.base_url.clone())
        } else {
            LlmError::HttpClient(e.to_string())
        }
    }

    async fn post(&self, prompt: &str, max_tokens: u32, stream: bool) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: OllamaOptions {
                num_predict: max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

/// One response object. Streaming sends one per line.
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Parse one NDJSON line into a token. `Ok(None)` for blank lines and
/// the empty final record.
fn parse_line(line: &[u8]) -> Result<Option<(String, bool)>, LlmError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let parsed: OllamaGenerateResponse =
        serde_json::from_str(line).map_err(|e| LlmError::ResponseParsing(e.to_string()))?;
    if let Some(error) = parsed.error {
        return Err(LlmError::Model(error));
    }
    Ok(Some((parsed.response, parsed.done)))
}

/// Split a byte stream into NDJSON lines and yield the non-empty tokens.
fn ndjson_tokens<S>(bytes: S) -> TokenStream
where
    S: futures_util::Stream<Item = Result<Vec<u8>, LlmError>> + Send + 'static,
{
    struct Lines<S> {
        bytes: S,
        buffer: Vec<u8>,
        ready: std::collections::VecDeque<String>,
        /// Yielded once every token parsed before it has gone out.
        failed: Option<LlmError>,
        finished: bool,
    }

    let state = Lines {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        ready: std::collections::VecDeque::new(),
        failed: None,
        finished: false,
    };

    let stream = futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(token) = st.ready.pop_front() {
                return Some((Ok(token), st));
            }
            if let Some(e) = st.failed.take() {
                return Some((Err(e), st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(&chunk);
                    while let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = st.buffer.drain(..=pos).collect();
                        match parse_line(&line) {
                            Ok(Some((token, done))) => {
                                if !token.is_empty() {
                                    st.ready.push_back(token);
                                }
                                if done {
                                    st.finished = true;
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                st.finished = true;
                                st.failed = Some(e);
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.failed = Some(e);
                }
                None => {
                    st.finished = true;
                    let rest = std::mem::take(&mut st.buffer);
                    match parse_line(&rest) {
                        Ok(Some((token, _))) if !token.is_empty() => st.ready.push_back(token),
                        Ok(_) => {}
                        Err(e) => st.failed = Some(e),
                    }
                }
            }
        }
    });
    Box::pin(stream)
}

#[async_trait]
impl SummaryModel for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, prompt: &str, max_tokens: u32) -> Result<TokenStream, LlmError> {
        let response = self.post(prompt, max_tokens, true).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| LlmError::HttpClient(e.to_string())));
        Ok(ndjson_tokens(bytes))
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let response = self.post(prompt, max_tokens, false).await?;
        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;
        if let Some(error) = parsed.error {
            return Err(LlmError::Model(error));
        }
        Ok(parsed.response)
    }
}
