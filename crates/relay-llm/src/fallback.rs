//! Priority fallback across providers.
//!
//! Optional providers are tried in order; the first success wins and no
//! further provider is contacted. The mandatory provider runs last and is
//! always called once the optional ones are exhausted. Only its failure
//! reaches the caller.

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use relay_core::errors::{AllProvidersFailed, SearchError};
use relay_core::provider::ProviderClient;

pub struct FallbackChain {
    providers: Vec<Box<dyn ProviderClient>>,
    mandatory: Box<dyn ProviderClient>,
    search: Option<Box<dyn ProviderClient>>,
}

impl FallbackChain {
    pub fn new(mandatory: Box<dyn ProviderClient>) -> Self {
        Self {
            providers: Vec::new(),
            mandatory,
            search: None,
        }
    }

    /// Append an optional provider. Earlier additions have higher priority.
    pub fn with_provider(mut self, provider: Box<dyn ProviderClient>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Provider used for explicit search requests.
    pub fn with_search(mut self, provider: Box<dyn ProviderClient>) -> Self {
        self.search = Some(provider);
        self
    }

    /// Every chat provider in priority order, mandatory last.
    pub fn providers(&self) -> impl Iterator<Item = &dyn ProviderClient> {
        self.providers
            .iter()
            .chain(std::iter::once(&self.mandatory))
            .map(|p| p.as_ref())
    }

    pub fn search_provider(&self) -> Option<&dyn ProviderClient> {
        self.search.as_deref()
    }

    /// Route one user message through the chain.
    #[instrument(skip_all, fields(exchange_id = %Uuid::now_v7()))]
    pub async fn send(&mut self, user_text: &str) -> Result<String, AllProvidersFailed> {
        let mut attempted = Vec::with_capacity(self.providers.len() + 1);

        for provider in &mut self.providers {
            attempted.push(provider.name().to_string());
            match provider.submit(user_text).await {
                Ok(reply) => {
                    info!(provider = provider.name(), model = provider.model(), "reply served");
                    return Ok(reply);
                }
                Err(err) => {
                    warn!(
                        provider = provider.name(),
                        error_kind = err.error_kind(),
                        recovery_attempts = err.recovery_attempts,
                        error = %err,
                        "provider failed, falling back"
                    );
                }
            }
        }

        attempted.push(self.mandatory.name().to_string());
        match self.mandatory.submit(user_text).await {
            Ok(reply) => {
                info!(
                    provider = self.mandatory.name(),
                    model = self.mandatory.model(),
                    fallbacks = attempted.len() - 1,
                    "reply served"
                );
                Ok(reply)
            }
            Err(err) => {
                error!(
                    provider = self.mandatory.name(),
                    error_kind = err.error_kind(),
                    error = %err,
                    "mandatory provider failed"
                );
                Err(AllProvidersFailed {
                    attempted,
                    source: err,
                })
            }
        }
    }

    /// Send straight to the search provider, bypassing the chain.
    #[instrument(skip_all, fields(exchange_id = %Uuid::now_v7()))]
    pub async fn search(&mut self, query: &str) -> Result<String, SearchError> {
        let provider = self.search.as_mut().ok_or(SearchError::Unavailable)?;
        match provider.submit(query).await {
            Ok(reply) => {
                info!(provider = provider.name(), "search served");
                Ok(reply)
            }
            Err(err) => {
                warn!(provider = provider.name(), error = %err, "search failed");
                Err(err.into())
            }
        }
    }

    /// Clear every provider's history, preambles kept.
    pub fn reset_all(&mut self) {
        for provider in self
            .providers
            .iter_mut()
            .chain(std::iter::once(&mut self.mandatory))
            .chain(self.search.as_mut())
        {
            provider.reset();
        }
    }
}
