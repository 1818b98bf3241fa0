//! Gemini client.
//!
//! `generateContent` for one-shot calls and `streamGenerateContent?alt=sse`
//! for streamed turns. The SSE body is re-chunked into candidate text
//! fragments by [`SseTextStream`].

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::models::gemini::GenerateContentResponse;
use crate::provider::{GenerateRequest, GenerativeModel, ProviderError, TokenStream};

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    /// Applied to one-shot calls only; streams stay open as long as the model writes.
    timeout: Option<Duration>,
}

impl GeminiClient {
    /// Build a client; the key is read from `config.api_key_env` now.
    pub fn new(http: reqwest::Client, config: &ProviderConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} not set; provider calls will fail until it is configured",
                config.api_key_env
            );
        }
        Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            timeout: config.timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            self.model,
            method
        )
    }

    async fn post(
        &self,
        method: &str,
        query: &[(&str, &str)],
        req: &GenerateRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingApiKey(self.api_key_env.clone()))?;

        let url = self.endpoint(method);
        tracing::debug!(url = %url, turns = req.history.len(), "Calling provider");

        let mut rb = self
            .http
            .post(&url)
            .query(query)
            .header("x-goog-api-key", key)
            .json(&req.to_wire());
        if let Some(t) = timeout {
            rb = rb.timeout(t);
        }
        let resp = rb.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<String, ProviderError> {
        let resp = self
            .post("generateContent", &[], req, self.timeout)
            .await?;
        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if let Some(reason) = parsed.block_reason() {
            return Err(ProviderError::Blocked(reason.to_string()));
        }
        let text = parsed.text();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }

    async fn generate_stream(&self, req: &GenerateRequest) -> Result<TokenStream, ProviderError> {
        let resp = self
            .post("streamGenerateContent", &[("alt", "sse")], req, None)
            .await?;
        let bytes = Box::pin(resp.bytes_stream().map_err(ProviderError::from));
        Ok(TokenStream::new(SseTextStream::new(bytes)))
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|idx| idx + 1)
        .unwrap_or(start);
    &bytes[start..end]
}

/// Decode one SSE event into candidate text. `Ok(None)` for events without
/// data (comments, keep-alives) or a `[DONE]` marker.
fn decode_event(event: &[u8]) -> Result<Option<String>, ProviderError> {
    let mut data_segments: Vec<&[u8]> = Vec::new();
    for line in event.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if let Some(rest) = line.strip_prefix(b"data:") {
            let payload = trim_ascii(rest);
            if !payload.is_empty() {
                data_segments.push(payload);
            }
        }
    }
    if data_segments.is_empty() {
        return Ok(None);
    }

    let data = data_segments.join(&b'\n');
    if trim_ascii(&data) == b"[DONE]" {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_slice(&data).map_err(|e| ProviderError::Decode(e.to_string()))?;
    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(ProviderError::Stream(message));
    }

    let chunk: GenerateContentResponse =
        serde_json::from_value(value).map_err(|e| ProviderError::Decode(e.to_string()))?;
    if let Some(reason) = chunk.block_reason() {
        return Err(ProviderError::Blocked(reason.to_string()));
    }
    Ok(Some(chunk.text()))
}

/// Turns an SSE byte stream of `GenerateContentResponse` events into text chunks.
pub struct SseTextStream<S> {
    inner: S,
    buffer: Vec<u8>,
    done: bool,
}

impl<S> SseTextStream<S>
where
    S: Stream<Item = Result<Bytes, ProviderError>> + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            done: false,
        }
    }

    fn next_event(&mut self) -> Option<Vec<u8>> {
        let (pos, len) = find_event_boundary(&self.buffer)?;
        let mut event: Vec<u8> = self.buffer.drain(..pos + len).collect();
        event.truncate(pos);
        Some(event)
    }
}

impl<S> Stream for SseTextStream<S>
where
    S: Stream<Item = Result<Bytes, ProviderError>> + Unpin,
{
    type Item = Result<String, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            while let Some(event) = this.next_event() {
                match decode_event(&event) {
                    Ok(Some(text)) => return Poll::Ready(Some(Ok(text))),
                    Ok(None) => continue,
                    Err(e) => return Poll::Ready(Some(Err(e))),
                }
            }

            if this.done {
                if trim_ascii(&this.buffer).is_empty() {
                    return Poll::Ready(None);
                }
                // Last event without a terminating blank line
                let remaining = std::mem::take(&mut this.buffer);
                return match decode_event(&remaining) {
                    Ok(Some(text)) => Poll::Ready(Some(Ok(text))),
                    Ok(None) => Poll::Ready(None),
                    Err(e) => Poll::Ready(Some(Err(e))),
                };
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => {
                    this.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
