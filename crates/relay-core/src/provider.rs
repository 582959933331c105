use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{ProviderError, RemoteError};
use crate::turn::ConversationTurn;

/// Generation parameters sent with every remote call.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            max_output_tokens: 1000,
        }
    }
}

/// Whether a provider runs web search as part of completion.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Completion,
    SearchCompletion,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completion => f.write_str("completion"),
            Self::SearchCompletion => f.write_str("search_completion"),
        }
    }
}

/// A search result the remote reported alongside its answer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    pub title: Option<String>,
    pub url: String,
}

/// Raw result of one remote call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    /// `None` (or empty) when the remote answered without content.
    pub text: Option<String>,
    pub references: Vec<Reference>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            references: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_references(mut self, references: Vec<Reference>) -> Self {
        self.references = references;
        self
    }
}

/// One remote completion API. Stateless: the caller owns the conversation and
/// hands in an immutable snapshot per call.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn kind(&self) -> ProviderKind;

    async fn complete(
        &self,
        turns: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> Result<Completion, RemoteError>;
}

/// A conversational provider: owns its history and turns user text into a
/// formatted reply.
///
/// `submit` takes `&mut self`, so one provider instance handles one request at
/// a time. Callers that share a provider across tasks must serialize access.
#[async_trait]
pub trait ProviderClient: Send {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn kind(&self) -> ProviderKind;

    /// Live history turns held, preamble excluded.
    fn history_len(&self) -> usize;

    /// Forget the conversation, keeping only the preamble.
    fn reset(&mut self);

    async fn submit(&mut self, user_text: &str) -> Result<String, ProviderError>;
}
