//! Settings types. Field names are camelCase in the JSON file.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The remote providers the relay knows how to talk to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    Groq,
    Perplexity,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [Self::Gemini, Self::Groq, Self::Perplexity];

    /// The provider of last resort. Startup fails without it.
    pub const MANDATORY: ProviderId = Self::Gemini;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Groq => "groq",
            Self::Perplexity => "perplexity",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Gemini => "GOOGLE_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::Perplexity => "PERPLEXITY_API_KEY",
        }
    }

    pub fn is_mandatory(&self) -> bool {
        *self == Self::MANDATORY
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            "perplexity" => Ok(Self::Perplexity),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Root settings object.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RelaySettings {
    /// Optional providers in priority order. The mandatory provider always
    /// runs last and is ignored here.
    pub chain: Vec<ProviderId>,
    pub providers: ProvidersSettings,
    pub formatter: FormatterSettings,
    pub logging: LoggingSettings,
    /// Whole-request timeout for remote calls. `None` keeps the HTTP client default.
    pub request_timeout_secs: Option<u64>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            chain: vec![ProviderId::Groq],
            providers: ProvidersSettings::default(),
            formatter: FormatterSettings::default(),
            logging: LoggingSettings::default(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersSettings {
    pub gemini: ProviderSettings,
    pub groq: ProviderSettings,
    pub perplexity: ProviderSettings,
}

impl ProvidersSettings {
    pub fn get(&self, id: ProviderId) -> &ProviderSettings {
        match id {
            ProviderId::Gemini => &self.gemini,
            ProviderId::Groq => &self.groq,
            ProviderId::Perplexity => &self.perplexity,
        }
    }

    pub fn get_mut(&mut self, id: ProviderId) -> &mut ProviderSettings {
        match id {
            ProviderId::Gemini => &mut self.gemini,
            ProviderId::Groq => &mut self.groq,
            ProviderId::Perplexity => &mut self.perplexity,
        }
    }
}

impl Default for ProvidersSettings {
    fn default() -> Self {
        Self {
            gemini: ProviderSettings {
                model: "gemini-flash-latest".into(),
                base_url: "https://generativelanguage.googleapis.com".into(),
                ..ProviderSettings::base()
            },
            groq: ProviderSettings {
                model: "groq/compound-mini".into(),
                base_url: "https://api.groq.com".into(),
                search_country: Some("japan".into()),
                ..ProviderSettings::base()
            },
            perplexity: ProviderSettings {
                model: "sonar".into(),
                base_url: "https://api.perplexity.ai".into(),
                max_turns: 2,
                preamble: Some(
                    "You are a search assistant that provides accurate information. \
                     Answer concisely in the language of the question."
                        .into(),
                ),
                ..ProviderSettings::base()
            },
        }
    }
}

/// Per-provider knobs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    /// History turns kept after the preamble.
    pub max_turns: usize,
    pub base_url: String,
    /// Persona / system text pinned at the head of the conversation.
    pub preamble: Option<String>,
    /// Scripted reply to the preamble, for providers that model it as an exchange.
    pub acknowledgement: Option<String>,
    /// Country hint for providers that search the web.
    pub search_country: Option<String>,
}

impl ProviderSettings {
    fn base() -> Self {
        Self {
            model: String::new(),
            temperature: 1.0,
            max_output_tokens: 1000,
            max_turns: 20,
            base_url: String::new(),
            preamble: None,
            acknowledgement: None,
            search_country: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatterSettings {
    pub char_limit: usize,
    pub quote_limit: usize,
}

impl Default for FormatterSettings {
    fn default() -> Self {
        Self {
            char_limit: relay_core::format::TRANSPORT_CHAR_LIMIT,
            quote_limit: relay_core::format::DEFAULT_QUOTE_LIMIT,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Per-module level overrides, e.g. `{"relay_llm": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}
