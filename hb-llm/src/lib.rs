//! Client for the local generation endpoint (Ollama-compatible `/api/generate`).
//!
//! Pure HTTP client plus the best-effort decoder for enumerated model output.

mod client;
mod error;
mod routine;
mod types;

pub use client::{DEFAULT_GENERATION_TIMEOUT, DEFAULT_GENERATION_URL, DEFAULT_MODEL, GenerationClient};
pub use error::{LlmError, Result};
pub use routine::{MAX_ROUTINE_ITEMS, parse_routine};
pub use types::{GenerateRequest, GenerateResponse};
