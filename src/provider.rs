//! Provider Module
//!
//! The generative model is an injected capability rather than a global
//! client: handlers hold an `Arc<dyn GenerativeModel>` so tests can swap in
//! scripted fakes.
//!
//! - `GenerativeModel`: one-shot `generate` and streaming `generate_stream`
//! - `GenerateRequest`: session history + the next user message + sampling settings
//! - `TokenStream`: lazy, pull-based chunk sequence with an explicit `close()`;
//!   dropping it also tears down the upstream call

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::models::gemini::{Content, GenerateContentRequest, GenerationConfig};

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing API key: set {0}")]
    MissingApiKey(String),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode upstream payload: {0}")]
    Decode(String),

    #[error("Prompt blocked by provider: {0}")]
    Blocked(String),

    #[error("Provider returned no candidate text")]
    EmptyResponse,

    #[error("Stream error: {0}")]
    Stream(String),
}

/// One provider call: a chat session seeded with `history`, then `prompt`
/// sent as the next user message.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub history: Vec<Content>,
    pub prompt: String,
    pub generation: GenerationConfig,
}

impl GenerateRequest {
    pub fn new(
        history: Vec<Content>,
        prompt: impl Into<String>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            history,
            prompt: prompt.into(),
            generation,
        }
    }

    /// History followed by the prompt as a user turn.
    pub fn contents(&self) -> Vec<Content> {
        let mut contents = self.history.clone();
        contents.push(Content::user(self.prompt.clone()));
        contents
    }

    pub fn to_wire(&self) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: self.contents(),
            generation_config: self.generation.clone(),
        }
    }
}

/// Generative model capability
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, for logs and `/status`.
    fn model_id(&self) -> &str;

    /// Whether credentials are available.
    fn is_configured(&self) -> bool {
        true
    }

    /// Generate the whole reply at once.
    async fn generate(&self, req: &GenerateRequest) -> Result<String, ProviderError>;

    /// Start a streamed reply. Errors returned here happen before any chunk.
    async fn generate_stream(&self, req: &GenerateRequest) -> Result<TokenStream, ProviderError>;
}

/// Text chunks from an in-flight generation.
///
/// Finite and not restartable. Chunk boundaries are whatever the provider
/// produced. `close()` (or drop) releases the upstream connection.
pub struct TokenStream {
    inner: Option<BoxStream<'static, Result<String, ProviderError>>>,
    exhausted: bool,
}

impl TokenStream {
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
    {
        Self {
            inner: Some(inner.boxed()),
            exhausted: false,
        }
    }

    /// Scripted stream of successful chunks.
    pub fn from_chunks<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let items: Vec<Result<String, ProviderError>> =
            chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(stream::iter(items))
    }

    /// Scripted stream that may fail part-way.
    pub fn from_results(items: Vec<Result<String, ProviderError>>) -> Self {
        Self::new(stream::iter(items))
    }

    /// Stop pulling and release the upstream. Idempotent.
    pub fn close(&mut self) {
        if self.inner.take().is_some() && !self.exhausted {
            tracing::debug!("token stream closed before completion; cancelling upstream generation");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for TokenStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                this.exhausted = true;
                this.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TokenStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStream")
            .field("closed", &self.is_closed())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
