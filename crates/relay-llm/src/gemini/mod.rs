//! Google Gemini completion backend.

pub mod provider;
pub mod types;

pub use provider::{GeminiBackend, DEFAULT_BASE_URL};
