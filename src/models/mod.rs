//! Wire models.
//!
//! - `chat`: what the browser posts (`{ messages: [...] }`).
//! - `gemini`: the provider's `generateContent` request/response shapes.
//! - `evaluation`: the structured candidate assessment returned in evaluation mode.

pub mod chat;
pub mod evaluation;
pub mod gemini;
