use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use relay_core::errors::RemoteError;
use relay_core::provider::{Completion, CompletionBackend, CompletionOptions, ProviderKind};
use relay_core::security::ApiKey;
use relay_core::turn::{ConversationTurn, Role};

use super::types::{
    default_safety_settings, GeminiContent, GeminiPart, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, SafetySetting,
};
use crate::http::send_json;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini has no system role in `contents`; system turns go to `systemInstruction`.
pub struct GeminiBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    safety_settings: Vec<SafetySetting>,
}

impl GeminiBackend {
    pub fn new(client: Client, api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            safety_settings: default_safety_settings(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = settings;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_request(
        &self,
        turns: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> GenerateContentRequest {
        let system: Vec<GeminiPart> = turns
            .iter()
            .filter(|t| t.role() == Role::System)
            .map(|t| GeminiPart::text(t.content()))
            .collect();

        let contents = turns
            .iter()
            .filter_map(|t| {
                let role = match t.role() {
                    Role::System => return None,
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                Some(GeminiContent {
                    role: Some(role.to_string()),
                    parts: vec![GeminiPart::text(t.content())],
                })
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: (!system.is_empty()).then(|| GeminiContent {
                role: None,
                parts: system,
            }),
            generation_config: GenerationConfig {
                candidate_count: 1,
                max_output_tokens: options.max_output_tokens,
                temperature: options.temperature,
            },
            safety_settings: self.safety_settings.clone(),
        }
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Completion
    }

    #[instrument(skip_all, fields(provider = "gemini", model = %self.model))]
    async fn complete(
        &self,
        turns: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> Result<Completion, RemoteError> {
        let body = self.build_request(turns, options);
        debug!(contents = body.contents.len(), "generateContent");

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body);
        let response: GenerateContentResponse = send_json(request).await?;

        let text = response.first_text();
        if text.is_none() {
            let finish_reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref());
            let block_reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref());
            warn!(?finish_reason, ?block_reason, "gemini returned no text");
        }

        Ok(Completion {
            text,
            references: Vec::new(),
        })
    }
}
