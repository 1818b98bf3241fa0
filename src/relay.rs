//! Data-stream relay.
//!
//! Wire format, one frame per line:
//!
//! ```text
//! 0:"Hello"\n
//! 0:" world"\n
//! 0:"__DONE__"\n
//! ```
//!
//! Every non-empty provider chunk becomes a `0:` frame carrying the chunk as a
//! JSON string. After the source is exhausted exactly one terminal frame is
//! written and the body closes. A provider failure before the first frame is
//! folded into a fallback frame plus the terminal frame; a failure after that
//! aborts the body so the transport reports truncation.

use actix_web::HttpResponse;
use bytes::Bytes;
use futures_util::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::interview::END_INTERVIEW_MARKER;
use crate::provider::TokenStream;

/// Tag of text frames.
pub const TEXT_FRAME_TAG: &str = "0";

/// Terminal sentinel written as the last frame.
pub const DONE_SENTINEL: &str = "__DONE__";

/// Older terminal sentinel; consumers treat it the same way.
pub const LEGACY_DONE_SENTINEL: &str = "[DONE]";

/// Header identifying the framing version to the client library.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";

const DONE_FRAME: &[u8] = b"0:\"__DONE__\"\n";

/// Encode one text frame: `0:<json string>\n`.
pub fn encode_text_frame(text: &str) -> Bytes {
    let escaped = serde_json::Value::from(text).to_string();
    let mut out = Vec::with_capacity(escaped.len() + 3);
    out.extend_from_slice(TEXT_FRAME_TAG.as_bytes());
    out.push(b':');
    out.extend_from_slice(escaped.as_bytes());
    out.push(b'\n');
    Bytes::from(out)
}

/// The terminal frame, `0:"__DONE__"\n`.
pub fn done_frame() -> Bytes {
    Bytes::from_static(DONE_FRAME)
}

/// Decode a single text frame back into its text. Returns `None` for other
/// tags or malformed lines.
pub fn decode_frame(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (tag, payload) = line.split_once(':')?;
    if tag != TEXT_FRAME_TAG {
        return None;
    }
    serde_json::from_str::<String>(payload).ok()
}

/// True for the terminal frame in either sentinel spelling.
pub fn is_terminal_frame(line: &str) -> bool {
    matches!(
        decode_frame(line).as_deref(),
        Some(DONE_SENTINEL) | Some(LEGACY_DONE_SENTINEL)
    )
}

/// Concatenate the text of a complete body, stopping at the terminal frame.
pub fn collect_stream_text(body: &str) -> String {
    let mut out = String::new();
    for line in body.lines() {
        if is_terminal_frame(line) {
            break;
        }
        if let Some(text) = decode_frame(line) {
            out.push_str(&text);
        }
    }
    out
}

/// Remove both sentinel spellings, bare and JSON-quoted, then trim.
pub fn strip_sentinels(text: &str) -> String {
    let quoted_done = format!("\"{DONE_SENTINEL}\"");
    let quoted_legacy = format!("\"{LEGACY_DONE_SENTINEL}\"");
    text.replace(&quoted_legacy, "")
        .replace(&quoted_done, "")
        .replace(LEGACY_DONE_SENTINEL, "")
        .replace(DONE_SENTINEL, "")
        .trim()
        .to_string()
}

pub fn contains_end_interview(text: &str) -> bool {
    text.contains(END_INTERVIEW_MARKER)
}

/// Display form of a streamed message: end-of-interview marker and sentinels removed.
pub fn strip_end_interview(text: &str) -> String {
    strip_sentinels(&text.replace(END_INTERVIEW_MARKER, ""))
}

/// Wraps a [`TokenStream`] into framed body bytes.
pub struct FrameRelay {
    inner: TokenStream,
    fallback: String,
    frames_emitted: usize,
    pending: Option<Bytes>,
    done: bool,
}

impl FrameRelay {
    /// `fallback` is sent if the provider fails before the first frame.
    pub fn new(inner: TokenStream, fallback: impl Into<String>) -> Self {
        Self {
            inner,
            fallback: fallback.into(),
            frames_emitted: 0,
            pending: None,
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.inner.close();
    }
}

impl Stream for FrameRelay {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(frame) = this.pending.take() {
            return Poll::Ready(Some(Ok(frame)));
        }
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    this.frames_emitted += 1;
                    return Poll::Ready(Some(Ok(encode_text_frame(&chunk))));
                }
                Poll::Ready(Some(Err(err))) => {
                    this.finish();
                    if this.frames_emitted == 0 {
                        tracing::error!(error = %err, "Upstream failed before first chunk; sending fallback");
                        this.pending = Some(done_frame());
                        return Poll::Ready(Some(Ok(encode_text_frame(&this.fallback))));
                    }
                    tracing::warn!(
                        error = %err,
                        frames = this.frames_emitted,
                        "Upstream failed mid-stream; aborting response"
                    );
                    return Poll::Ready(Some(Err(std::io::Error::other(err.to_string()))));
                }
                Poll::Ready(None) => {
                    this.finish();
                    tracing::debug!(frames = this.frames_emitted, "Stream complete");
                    return Poll::Ready(Some(Ok(done_frame())));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// The two-frame body used when the provider call fails outright.
pub fn fallback_stream(
    text: impl Into<String>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    let text = text.into();
    async_stream::stream! {
        yield Ok(encode_text_frame(&text));
        yield Ok(done_frame());
    }
}

/// Streaming response with the data-stream protocol headers.
pub fn data_stream_response<S>(body: S) -> HttpResponse
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + 'static,
{
    HttpResponse::Ok()
        .insert_header(("content-type", "text/event-stream"))
        .insert_header(("cache-control", "no-cache"))
        .insert_header(("connection", "keep-alive"))
        .insert_header((DATA_STREAM_HEADER, DATA_STREAM_VERSION))
        .streaming(body)
}
