//! Wire types shared by OpenAI-compatible chat completion APIs (Groq, Perplexity).

use serde::{Deserialize, Serialize};

use relay_core::turn::ConversationTurn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// Borrow the conversation as chat messages. Role names already match.
pub fn to_chat_messages(turns: &[ConversationTurn]) -> Vec<ChatMessage<'_>> {
    turns
        .iter()
        .map(|t| ChatMessage {
            role: t.role().as_str(),
            content: t.content(),
        })
        .collect()
}

/// A `{title, url}` pair as reported by search-backed models.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
}

impl From<SearchResult> for relay_core::Reference {
    fn from(result: SearchResult) -> Self {
        Self {
            title: result.title,
            url: result.url,
        }
    }
}
