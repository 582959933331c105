//! Groq compound models: chat completions with built-in web search.
//!
//! Search hits come back in `choices[0].message.executed_tools[*].search_results`
//! and are surfaced as [`Reference`]s.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use relay_core::errors::RemoteError;
use relay_core::provider::{
    Completion, CompletionBackend, CompletionOptions, ProviderKind, Reference,
};
use relay_core::security::ApiKey;
use relay_core::turn::ConversationTurn;

use crate::chat::{to_chat_messages, ChatMessage, SearchResult};
use crate::http::send_json;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com";

#[derive(Serialize)]
struct GroqRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_settings: Option<SearchSettings<'a>>,
}

#[derive(Serialize)]
struct SearchSettings<'a> {
    country: &'a str,
}

#[derive(Deserialize)]
struct GroqResponse {
    #[serde(default, deserialize_with = "crate::http::null_as_default")]
    choices: Vec<GroqChoice>,
}

#[derive(Deserialize)]
struct GroqChoice {
    message: GroqMessage,
}

#[derive(Deserialize)]
struct GroqMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, deserialize_with = "crate::http::null_as_default")]
    executed_tools: Vec<ExecutedTool>,
}

#[derive(Deserialize)]
struct ExecutedTool {
    #[serde(default)]
    search_results: Option<SearchResults>,
}

#[derive(Deserialize)]
struct SearchResults {
    #[serde(default, deserialize_with = "crate::http::null_as_default")]
    results: Vec<SearchResult>,
}

pub struct GroqBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    search_country: Option<String>,
}

impl GroqBackend {
    pub fn new(client: Client, api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            search_country: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Bias web search toward one country, e.g. `japan`.
    pub fn with_search_country(mut self, country: Option<String>) -> Self {
        self.search_country = country;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/openai/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionBackend for GroqBackend {
    fn name(&self) -> &str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::SearchCompletion
    }

    #[instrument(skip_all, fields(provider = "groq", model = %self.model))]
    async fn complete(
        &self,
        turns: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> Result<Completion, RemoteError> {
        let body = GroqRequest {
            model: &self.model,
            messages: to_chat_messages(turns),
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
            search_settings: self
                .search_country
                .as_deref()
                .map(|country| SearchSettings { country }),
        };
        debug!(messages = body.messages.len(), "chat completion");

        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose())
            .json(&body);
        let response: GroqResponse = send_json(request).await?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| RemoteError::MalformedResponse("response has no choices".into()))?;

        if message.content.is_none() {
            warn!("groq returned a null message");
        }

        let references: Vec<Reference> = message
            .executed_tools
            .into_iter()
            .filter_map(|tool| tool.search_results)
            .flat_map(|sr| sr.results)
            .map(Reference::from)
            .collect();

        Ok(Completion {
            text: message.content,
            references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PATH: &str = "/openai/v1/chat/completions";

    fn backend(server: &MockServer) -> GroqBackend {
        GroqBackend::new(Client::new(), ApiKey::new("gsk_test"), "groq/compound-mini")
            .with_base_url(server.uri())
            .with_search_country(Some("japan".into()))
    }

    #[tokio::test]
    async fn complete_parses_content_and_search_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(json!({
                "model": "groq/compound-mini",
                "max_tokens": 1000,
                "search_settings": {"country": "japan"},
                "messages": [{"role": "user", "content": "weather in tokyo?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": "Sunny.",
                        "executed_tools": [{
                            "type": "search",
                            "search_results": {"results": [
                                {"title": "Tokyo forecast", "url": "https://weather.example/tokyo", "score": 0.9},
                                {"url": "https://news.example/tokyo"}
                            ]}
                        }]
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = backend(&server)
            .complete(
                &[ConversationTurn::user("weather in tokyo?")],
                &CompletionOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(completion.text.as_deref(), Some("Sunny."));
        assert_eq!(completion.references.len(), 2);
        assert_eq!(
            completion.references[0].title.as_deref(),
            Some("Tokyo forecast")
        );
        assert!(completion.references[1].title.is_none());
    }

    #[tokio::test]
    async fn null_content_is_an_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let completion = backend(&server)
            .complete(&[ConversationTurn::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();
        assert!(completion.text.is_none());
        assert!(completion.references.is_empty());
    }

    #[tokio::test]
    async fn null_executed_tools_is_a_plain_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": "No search needed.",
                    "executed_tools": null
                }}]
            })))
            .mount(&server)
            .await;

        let completion = backend(&server)
            .complete(&[ConversationTurn::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.text.as_deref(), Some("No search needed."));
        assert!(completion.references.is_empty());
    }

    #[tokio::test]
    async fn null_search_result_list_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "content": "ok",
                    "executed_tools": [
                        {"type": "search", "search_results": {"results": null}},
                        {"type": "search", "search_results": null}
                    ]
                }}]
            })))
            .mount(&server)
            .await;

        let completion = backend(&server)
            .complete(&[ConversationTurn::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();
        assert!(completion.references.is_empty());
    }

    #[tokio::test]
    async fn no_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = backend(&server)
            .complete(&[ConversationTurn::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn request_too_large_code_is_size_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "message": "Request too large for model",
                    "type": "invalid_request_error",
                    "code": "request_too_large"
                }
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .complete(&[ConversationTurn::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_size_rejection());
    }

    #[tokio::test]
    async fn unauthorized_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API Key", "code": "invalid_api_key"}
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .complete(&[ConversationTurn::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn search_settings_omitted_without_country() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let backend = GroqBackend::new(Client::new(), ApiKey::new("k"), "groq/compound-mini")
            .with_base_url(server.uri());
        backend
            .complete(&[ConversationTurn::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("search_settings").is_none());
    }
}
