//! # relay-llm
//!
//! Remote completion backends and the machinery that turns them into a
//! conversational relay:
//!
//! - [`GeminiBackend`], [`GroqBackend`], [`PerplexityBackend`]: stateless HTTP
//!   clients for each remote API.
//! - [`ConversationClient`]: gives a backend its own bounded history and
//!   recovers from size rejections by shrinking it.
//! - [`FallbackChain`]: tries providers in priority order and always ends on
//!   the mandatory one.
//! - [`ProviderFactory`]: wires all of the above from settings.

pub mod chat;
pub mod client;
pub mod error_parsing;
pub mod factory;
pub mod fallback;
pub mod gemini;
pub mod groq;
pub mod http;
pub mod perplexity;

pub mod mock;

pub use client::ConversationClient;
pub use factory::ProviderFactory;
pub use fallback::FallbackChain;
pub use gemini::GeminiBackend;
pub use groq::GroqBackend;
pub use perplexity::PerplexityBackend;
