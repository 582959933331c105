//! Builds the provider chain from settings and discovered credentials.
//!
//! The mandatory provider must construct or startup fails. Optional providers
//! that cannot be built (missing key, bad settings) are logged and left out.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Client;
use tracing::{error, info, warn};

use relay_core::conversation::Preamble;
use relay_core::errors::ConfigError;
use relay_core::provider::{CompletionBackend, CompletionOptions, ProviderClient};
use relay_settings::{Credentials, ProviderId, ProviderSettings, RelaySettings};

use crate::client::ConversationClient;
use crate::fallback::FallbackChain;
use crate::gemini::GeminiBackend;
use crate::groq::GroqBackend;
use crate::http::build_http_client;
use crate::perplexity::PerplexityBackend;

/// Scripted reply to a persona prompt for providers without a system role.
pub const DEFAULT_ACKNOWLEDGEMENT: &str = "Understood.";

pub struct ProviderFactory<'a> {
    settings: &'a RelaySettings,
    credentials: &'a Credentials,
    client: Client,
}

impl<'a> ProviderFactory<'a> {
    pub fn new(settings: &'a RelaySettings, credentials: &'a Credentials) -> Result<Self, ConfigError> {
        let client = build_http_client(settings.request_timeout_secs.map(Duration::from_secs))?;
        Ok(Self {
            settings,
            credentials,
            client,
        })
    }

    /// Build one provider with its own empty conversation.
    pub fn build(&self, id: ProviderId) -> Result<Box<dyn ProviderClient>, ConfigError> {
        let key = self
            .credentials
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::MissingCredential {
                provider: id.to_string(),
                env_var: id.env_var(),
            })?;
        let cfg = self.settings.providers.get(id);
        if cfg.max_turns < 2 {
            return Err(ConfigError::InvalidValue(format!(
                "{id}: maxTurns must be at least 2"
            )));
        }

        let client = self.client.clone();
        let provider = match id {
            ProviderId::Gemini => self.wrap(
                GeminiBackend::new(client, key, &cfg.model).with_base_url(&cfg.base_url),
                exchange_preamble(cfg),
                cfg,
            ),
            ProviderId::Groq => self.wrap(
                GroqBackend::new(client, key, &cfg.model)
                    .with_base_url(&cfg.base_url)
                    .with_search_country(cfg.search_country.clone()),
                system_preamble(cfg),
                cfg,
            ),
            ProviderId::Perplexity => self.wrap(
                PerplexityBackend::new(client, key, &cfg.model).with_base_url(&cfg.base_url),
                system_preamble(cfg),
                cfg,
            ),
        };
        Ok(provider)
    }

    fn wrap<B: CompletionBackend + 'static>(
        &self,
        backend: B,
        preamble: Preamble,
        cfg: &ProviderSettings,
    ) -> Box<dyn ProviderClient> {
        let options = CompletionOptions {
            temperature: cfg.temperature,
            max_output_tokens: cfg.max_output_tokens,
        };
        let formatter = &self.settings.formatter;
        Box::new(
            ConversationClient::new(backend, preamble, cfg.max_turns, options)
                .with_formatter_limits(formatter.char_limit, formatter.quote_limit),
        )
    }

    /// Optional providers in configured order, then the mandatory one.
    /// Perplexity, when its key is present, also serves direct searches.
    pub fn build_chain(&self) -> Result<FallbackChain, ConfigError> {
        let mandatory = self.build(ProviderId::MANDATORY).inspect_err(|e| {
            error!(provider = %ProviderId::MANDATORY, error = %e, "mandatory provider unavailable");
        })?;
        info!(provider = mandatory.name(), model = mandatory.model(), "mandatory provider ready");
        let mut chain = FallbackChain::new(mandatory);

        let mut seen = BTreeSet::new();
        for &id in &self.settings.chain {
            if id.is_mandatory() || !seen.insert(id) {
                continue;
            }
            match self.build(id) {
                Ok(provider) => {
                    info!(provider = provider.name(), model = provider.model(), "provider enabled");
                    chain = chain.with_provider(provider);
                }
                Err(e) => warn!(provider = %id, error = %e, "provider disabled"),
            }
        }

        if self.credentials.get(ProviderId::Perplexity).is_some() {
            match self.build(ProviderId::Perplexity) {
                Ok(provider) => chain = chain.with_search(provider),
                Err(e) => warn!(error = %e, "search provider disabled"),
            }
        }

        Ok(chain)
    }
}

fn exchange_preamble(cfg: &ProviderSettings) -> Preamble {
    match &cfg.preamble {
        Some(prompt) => Preamble::Exchange {
            prompt: prompt.clone(),
            acknowledgement: cfg
                .acknowledgement
                .clone()
                .unwrap_or_else(|| DEFAULT_ACKNOWLEDGEMENT.to_string()),
        },
        None => Preamble::None,
    }
}

fn system_preamble(cfg: &ProviderSettings) -> Preamble {
    cfg.preamble
        .clone()
        .map_or(Preamble::None, Preamble::System)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::ApiKey;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds(ids: &[ProviderId]) -> Credentials {
        ids.iter()
            .fold(Credentials::default(), |c, &id| c.with(id, ApiKey::new("k")))
    }

    fn names(chain: &FallbackChain) -> Vec<String> {
        chain.providers().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn missing_mandatory_key_is_fatal() {
        let settings = RelaySettings::default();
        let credentials = creds(&[ProviderId::Groq]);
        let factory = ProviderFactory::new(&settings, &credentials).unwrap();

        match factory.build_chain() {
            Err(ConfigError::MissingCredential { provider, env_var }) => {
                assert_eq!(provider, "gemini");
                assert_eq!(env_var, "GOOGLE_API_KEY");
            }
            Err(other) => panic!("expected MissingCredential, got {other:?}"),
            Ok(_) => panic!("expected MissingCredential"),
        }
    }

    #[test]
    fn missing_optional_key_skips_provider() {
        let settings = RelaySettings::default();
        let credentials = creds(&[ProviderId::Gemini]);
        let chain = ProviderFactory::new(&settings, &credentials)
            .unwrap()
            .build_chain()
            .unwrap();
        assert_eq!(names(&chain), ["gemini"]);
        assert!(chain.search_provider().is_none());
    }

    #[test]
    fn chain_follows_configured_order_and_skips_duplicates() {
        let mut settings = RelaySettings::default();
        settings.chain = vec![
            ProviderId::Perplexity,
            ProviderId::Gemini,
            ProviderId::Groq,
            ProviderId::Perplexity,
        ];
        let credentials = creds(&ProviderId::ALL);
        let chain = ProviderFactory::new(&settings, &credentials)
            .unwrap()
            .build_chain()
            .unwrap();
        assert_eq!(names(&chain), ["perplexity", "groq", "gemini"]);
        assert_eq!(chain.search_provider().unwrap().name(), "perplexity");
    }

    #[test]
    fn preambles_follow_provider_shape() {
        let mut cfg = RelaySettings::default().providers.gemini;
        assert_eq!(exchange_preamble(&cfg), Preamble::None);

        cfg.preamble = Some("be a cat".into());
        assert_eq!(
            exchange_preamble(&cfg),
            Preamble::Exchange {
                prompt: "be a cat".into(),
                acknowledgement: DEFAULT_ACKNOWLEDGEMENT.into(),
            }
        );
        assert_eq!(system_preamble(&cfg), Preamble::System("be a cat".into()));
    }

    #[test]
    fn perplexity_starts_with_system_preamble() {
        let settings = RelaySettings::default();
        let credentials = creds(&[ProviderId::Perplexity]);
        let factory = ProviderFactory::new(&settings, &credentials).unwrap();
        let provider = factory.build(ProviderId::Perplexity).unwrap();
        // preamble is not history
        assert_eq!(provider.history_len(), 0);
        assert_eq!(provider.model(), "sonar");
    }

    #[tokio::test]
    async fn optional_failure_falls_back_to_gemini_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-flash-latest:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "from gemini"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = RelaySettings::default();
        settings.providers.gemini.base_url = server.uri();
        settings.providers.groq.base_url = server.uri();
        let credentials = creds(&[ProviderId::Gemini, ProviderId::Groq]);
        let mut chain = ProviderFactory::new(&settings, &credentials)
            .unwrap()
            .build_chain()
            .unwrap();

        let reply = chain.send("hello").await.unwrap();
        assert_eq!(reply, "> hello\n\nfrom gemini\n-# gemini · gemini-flash-latest");

        let histories: Vec<usize> = chain.providers().map(|p| p.history_len()).collect();
        assert_eq!(histories, [0, 2]);
    }
}
