//! Scripted backends and providers for deterministic tests without network calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use relay_core::errors::{ProviderError, RemoteError};
use relay_core::provider::{
    Completion, CompletionBackend, CompletionOptions, ProviderClient, ProviderKind,
};
use relay_core::turn::ConversationTurn;

/// Pre-programmed outcome of one backend call.
#[derive(Clone, Debug)]
pub enum MockResponse {
    Reply(Completion),
    Error(RemoteError),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::Reply(Completion::text(text))
    }

    pub fn empty() -> Self {
        Self::Reply(Completion::empty())
    }

    /// HTTP 413 rejection.
    pub fn too_large() -> Self {
        Self::Error(RemoteError::PayloadTooLarge {
            status: 413,
            message: "Request Entity Too Large".into(),
        })
    }

    pub fn server_error() -> Self {
        Self::Error(RemoteError::ServerError {
            status: 500,
            message: "internal".into(),
        })
    }
}

/// Every snapshot a [`MockBackend`] received, shareable after the backend moves.
#[derive(Clone, Debug, Default)]
pub struct RecordedCalls(Arc<Mutex<Vec<Vec<ConversationTurn>>>>);

impl RecordedCalls {
    pub fn count(&self) -> usize {
        self.0.lock().len()
    }

    pub fn get(&self, idx: usize) -> Option<Vec<ConversationTurn>> {
        self.0.lock().get(idx).cloned()
    }

    pub fn last(&self) -> Option<Vec<ConversationTurn>> {
        self.0.lock().last().cloned()
    }

    fn record(&self, turns: &[ConversationTurn]) {
        self.0.lock().push(turns.to_vec());
    }
}

/// Backend that returns pre-programmed responses in sequence.
pub struct MockBackend {
    name: String,
    model: String,
    kind: ProviderKind,
    responses: Vec<MockResponse>,
    call_count: AtomicUsize,
    calls: RecordedCalls,
}

impl MockBackend {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            name: "mock".into(),
            model: "mock-model".into(),
            kind: ProviderKind::Completion,
            responses,
            call_count: AtomicUsize::new(0),
            calls: RecordedCalls::default(),
        }
    }

    pub fn named(mut self, name: &str, model: &str) -> Self {
        self.name = name.into();
        self.model = model.into();
        self
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Handle to the recorded snapshots.
    pub fn calls(&self) -> RecordedCalls {
        self.calls.clone()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(
        &self,
        turns: &[ConversationTurn],
        _options: &CompletionOptions,
    ) -> Result<Completion, RemoteError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls.record(turns);

        let Some(response) = self.responses.get(idx) else {
            return Err(RemoteError::InvalidRequest {
                status: 400,
                message: format!("MockBackend: no response configured for call {idx}"),
                code: None,
            });
        };
        match response {
            MockResponse::Reply(completion) => Ok(completion.clone()),
            MockResponse::Error(e) => Err(e.clone()),
        }
    }
}

/// Provider stand-in for orchestration tests. Replies are returned verbatim.
pub struct MockProvider {
    name: String,
    kind: ProviderKind,
    script: VecDeque<Result<String, RemoteError>>,
    submissions: Arc<AtomicUsize>,
    history: usize,
}

impl MockProvider {
    pub fn new(name: &str, script: Vec<Result<String, RemoteError>>) -> Self {
        Self {
            name: name.into(),
            kind: ProviderKind::Completion,
            script: script.into(),
            submissions: Arc::new(AtomicUsize::new(0)),
            history: 0,
        }
    }

    /// Always answers with `reply`.
    pub fn replying(name: &str, reply: &str) -> Self {
        Self::new(name, vec![Ok(reply.to_string()); 16])
    }

    /// Always fails with `error`.
    pub fn failing(name: &str, error: RemoteError) -> Self {
        Self::new(name, vec![Err(error); 16])
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Shared counter of `submit` calls, readable after the provider is boxed.
    pub fn submissions(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.submissions)
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn history_len(&self) -> usize {
        self.history
    }

    fn reset(&mut self) {
        self.history = 0;
    }

    async fn submit(&mut self, _user_text: &str) -> Result<String, ProviderError> {
        let idx = self.submissions.fetch_add(1, Ordering::Relaxed);
        match self.script.pop_front() {
            Some(Ok(reply)) => {
                self.history += 2;
                Ok(reply)
            }
            Some(Err(e)) => Err(ProviderError::new(self.name.clone(), e)),
            None => Err(ProviderError::new(
                self.name.clone(),
                RemoteError::InvalidRequest {
                    status: 400,
                    message: format!("MockProvider: no response configured for call {idx}"),
                    code: None,
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_responses_and_recorded_snapshots() {
        let mock = MockBackend::new(vec![MockResponse::text("first"), MockResponse::too_large()]);
        let calls = mock.calls();
        let opts = CompletionOptions::default();

        let first = mock
            .complete(&[ConversationTurn::user("a")], &opts)
            .await
            .unwrap();
        assert_eq!(first.text.as_deref(), Some("first"));

        let second = mock
            .complete(
                &[ConversationTurn::user("a"), ConversationTurn::user("b")],
                &opts,
            )
            .await;
        assert!(second.unwrap_err().is_size_rejection());

        assert_eq!(mock.call_count(), 2);
        assert_eq!(calls.count(), 2);
        assert_eq!(calls.last().unwrap().len(), 2);
        assert_eq!(calls.get(0).unwrap()[0].content(), "a");
    }

    #[tokio::test]
    async fn exhausted_script_is_an_error() {
        let mock = MockBackend::new(vec![]);
        let err = mock
            .complete(&[], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no response configured for call 0"));
    }

    #[tokio::test]
    async fn mock_provider_counts_submissions() {
        let mut provider = MockProvider::new(
            "p",
            vec![Ok("one".into()), Err(RemoteError::NetworkError("down".into()))],
        );
        let submissions = provider.submissions();

        assert_eq!(provider.submit("x").await.unwrap(), "one");
        assert_eq!(provider.history_len(), 2);
        let err = provider.submit("y").await.unwrap_err();
        assert_eq!(err.provider, "p");
        assert!(provider.submit("z").await.is_err());
        assert_eq!(submissions.load(Ordering::Relaxed), 3);

        provider.reset();
        assert_eq!(provider.history_len(), 0);
    }
}
