//! Perplexity Sonar: search-grounded chat completions.
//!
//! Newer responses carry `search_results` with titles; older ones only a bare
//! `citations` URL list. Titled results win when both are present.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use relay_core::errors::RemoteError;
use relay_core::provider::{
    Completion, CompletionBackend, CompletionOptions, ProviderKind, Reference,
};
use relay_core::security::ApiKey;
use relay_core::turn::ConversationTurn;

use crate::chat::{to_chat_messages, ChatMessage, SearchResult};
use crate::http::send_json;

pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

#[derive(Serialize)]
struct PerplexityRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct PerplexityResponse {
    #[serde(default, deserialize_with = "crate::http::null_as_default")]
    choices: Vec<PerplexityChoice>,
    #[serde(default, deserialize_with = "crate::http::null_as_default")]
    search_results: Vec<SearchResult>,
    #[serde(default, deserialize_with = "crate::http::null_as_default")]
    citations: Vec<String>,
}

#[derive(Deserialize)]
struct PerplexityChoice {
    message: PerplexityMessage,
}

#[derive(Deserialize)]
struct PerplexityMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct PerplexityBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl PerplexityBackend {
    pub fn new(client: Client, api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for PerplexityBackend {
    fn name(&self) -> &str {
        "perplexity"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::SearchCompletion
    }

    #[instrument(skip_all, fields(provider = "perplexity", model = %self.model))]
    async fn complete(
        &self,
        turns: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> Result<Completion, RemoteError> {
        let body = PerplexityRequest {
            model: &self.model,
            messages: to_chat_messages(turns),
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
        };
        debug!(messages = body.messages.len(), "chat completion");

        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose())
            .json(&body);
        let response: PerplexityResponse = send_json(request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::MalformedResponse("response has no choices".into()))?
            .message
            .content;

        let references = if response.search_results.is_empty() {
            response
                .citations
                .into_iter()
                .map(|url| Reference { title: None, url })
                .collect()
        } else {
            response
                .search_results
                .into_iter()
                .map(Reference::from)
                .collect()
        };

        Ok(Completion { text, references })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> PerplexityBackend {
        PerplexityBackend::new(Client::new(), ApiKey::new("pplx-test"), "sonar")
            .with_base_url(server.uri())
    }

    fn turns() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::system("You are a search assistant."),
            ConversationTurn::user("rust 2024 edition release date"),
        ]
    }

    #[tokio::test]
    async fn complete_prefers_titled_search_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer pplx-test"))
            .and(body_partial_json(json!({
                "model": "sonar",
                "messages": [
                    {"role": "system", "content": "You are a search assistant."},
                    {"role": "user", "content": "rust 2024 edition release date"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "February 2025."}}],
                "citations": ["https://blog.rust-lang.org/"],
                "search_results": [
                    {"title": "Announcing Rust 1.85.0", "url": "https://blog.rust-lang.org/2025/02/20/Rust-1.85.0.html"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = backend(&server)
            .complete(&turns(), &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.text.as_deref(), Some("February 2025."));
        assert_eq!(completion.references.len(), 1);
        assert_eq!(
            completion.references[0].title.as_deref(),
            Some("Announcing Rust 1.85.0")
        );
    }

    #[tokio::test]
    async fn citations_used_without_search_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Answer."}}],
                "citations": ["https://a.example/x", "https://b.example/y"]
            })))
            .mount(&server)
            .await;

        let completion = backend(&server)
            .complete(&turns(), &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.references.len(), 2);
        assert!(completion.references.iter().all(|r| r.title.is_none()));
        assert_eq!(completion.references[1].url, "https://b.example/y");
    }

    #[tokio::test]
    async fn null_reference_fields_are_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Answer."}}],
                "search_results": null,
                "citations": null
            })))
            .mount(&server)
            .await;

        let completion = backend(&server)
            .complete(&turns(), &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.text.as_deref(), Some("Answer."));
        assert!(completion.references.is_empty());
    }

    #[tokio::test]
    async fn null_search_results_fall_back_to_citations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Answer."}}],
                "search_results": null,
                "citations": ["https://a.example/x"]
            })))
            .mount(&server)
            .await;

        let completion = backend(&server)
            .complete(&turns(), &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.references.len(), 1);
        assert_eq!(completion.references[0].url, "https://a.example/x");
    }

    #[tokio::test]
    async fn server_error_is_not_a_size_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .complete(&turns(), &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::ServerError { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
