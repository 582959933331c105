//! API keys discovered from the environment at startup.

use relay_core::ApiKey;
use tracing::debug;

use crate::types::ProviderId;

/// One optional key per provider. Empty values count as absent.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    gemini: Option<ApiKey>,
    groq: Option<ApiKey>,
    perplexity: Option<ApiKey>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (tests, alternate sources).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |id: ProviderId| {
            let key = lookup(id.env_var())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(ApiKey::new);
            debug!(provider = %id, present = key.is_some(), "credential lookup");
            key
        };
        Self {
            gemini: read(ProviderId::Gemini),
            groq: read(ProviderId::Groq),
            perplexity: read(ProviderId::Perplexity),
        }
    }

    pub fn with(mut self, id: ProviderId, key: ApiKey) -> Self {
        *self.slot_mut(id) = Some(key);
        self
    }

    pub fn get(&self, id: ProviderId) -> Option<&ApiKey> {
        match id {
            ProviderId::Gemini => self.gemini.as_ref(),
            ProviderId::Groq => self.groq.as_ref(),
            ProviderId::Perplexity => self.perplexity.as_ref(),
        }
    }

    fn slot_mut(&mut self, id: ProviderId) -> &mut Option<ApiKey> {
        match id {
            ProviderId::Gemini => &mut self.gemini,
            ProviderId::Groq => &mut self.groq,
            ProviderId::Perplexity => &mut self.perplexity,
        }
    }
}
