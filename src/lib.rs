#![forbid(unsafe_code)]
#![doc = r#"
Interview Relay

Relay between a browser interview chat UI and a Gemini model. Chat turns are
streamed back in the line-framed data-stream format; evaluation requests are
answered with one structured JSON assessment.

Crate highlights
- Library: pure conversation shaping via `interview::dispatch(&[Message])`.
- HTTP server (in `server`): `POST /api/chat`, `GET /status`, `GET /health`.
- Provider capability: `provider::GenerativeModel`, implemented by `gemini::GeminiClient`.

Modules
- `models`: Chat request, Gemini wire and evaluation data structures.
- `conversion`: Chat messages → provider turns, persona preamble.
- `interview`: Prompts, exchange counter and mode dispatcher.
- `relay`: `0:<json>` framing, terminal sentinel and display helpers.
- `evaluation`: Tolerant extraction of the evaluation JSON.
- `server`: Actix-web handlers.
- `util`: Shared helpers (tracing, env, HTTP client, CORS, app state).
"#]

pub mod config;
pub mod conversion;
pub mod evaluation;
pub mod gemini;
pub mod interview;
pub mod models;
pub mod provider;
pub mod relay;
pub mod server;
pub mod util;

pub use crate::config::{ConfigError, ProviderConfig, RelayConfig};
pub use crate::evaluation::parse_evaluation;
pub use crate::gemini::GeminiClient;
pub use crate::interview::{dispatch, InterviewMode};
pub use crate::provider::{GenerateRequest, GenerativeModel, ProviderError, TokenStream};
pub use crate::relay::{collect_stream_text, strip_end_interview, strip_sentinels, FrameRelay};

// Re-export model namespaces for convenience (downstream users can do `use interview_relay::chat`).
pub use crate::models::{chat, evaluation as evaluation_models, gemini as gemini_models};
