//! Stateful provider client: one backend plus its own bounded conversation.
//!
//! Each `submit` appends the user turn, calls the backend with a snapshot of
//! the buffer, and on success records the reply and prunes. A size rejection
//! halves the history and retries, at most `ceil(log2(len))` times. Any other
//! failure, or running out of shrinks, rolls the user turn back so the buffer
//! looks as if the request never happened. History dropped by a shrink is only
//! given up when the failure is still a size rejection; an ordinary failure
//! after a shrink restores it.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use relay_core::conversation::{ConversationBuffer, Preamble};
use relay_core::errors::ProviderError;
use relay_core::format::{append_references, ResponseFormatter};
use relay_core::provider::{
    Completion, CompletionBackend, CompletionOptions, ProviderClient, ProviderKind,
};
use relay_core::turn::ConversationTurn;

/// Body used when the remote answers successfully but with no text.
pub const EMPTY_REPLY: &str = "no answer could be generated";

pub struct ConversationClient<B> {
    backend: B,
    buffer: ConversationBuffer,
    options: CompletionOptions,
    formatter: ResponseFormatter,
}

impl<B: CompletionBackend> ConversationClient<B> {
    pub fn new(backend: B, preamble: Preamble, max_turns: usize, options: CompletionOptions) -> Self {
        let formatter = ResponseFormatter::new(backend.name(), backend.model());
        Self {
            buffer: ConversationBuffer::new(&preamble, max_turns),
            backend,
            options,
            formatter,
        }
    }

    pub fn with_formatter_limits(mut self, char_limit: usize, quote_limit: usize) -> Self {
        self.formatter = self.formatter.with_limits(char_limit, quote_limit);
        self
    }

    pub fn buffer(&self) -> &ConversationBuffer {
        &self.buffer
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Call the backend until it accepts the buffer or recovery is exhausted.
    /// Leaves the pending user turn in place either way.
    async fn complete_with_recovery(&mut self) -> Result<Completion, ProviderError> {
        let budget = self.buffer.overflow_recovery_budget();
        let mut attempts = 0u32;
        // Buffer as it was before the first shrink.
        let mut unshrunk: Option<ConversationBuffer> = None;

        loop {
            let result = self
                .backend
                .complete(self.buffer.turns(), &self.options)
                .await;

            let err = match result {
                Ok(completion) => {
                    if attempts > 0 {
                        info!(attempts, turns = self.buffer.len(), "request accepted after shrinking history");
                    }
                    return Ok(completion);
                }
                Err(err) => err,
            };

            if !err.is_size_rejection() {
                warn!(error_kind = err.error_kind(), error = %err, "remote call failed");
                if let Some(saved) = unshrunk.take() {
                    debug!(restored = saved.len() - self.buffer.len(), "restoring shrunk history");
                    self.buffer = saved;
                }
                return Err(ProviderError::new(self.backend.name(), err)
                    .with_recovery_attempts(attempts));
            }

            warn!(
                error = %err,
                turns = self.buffer.len(),
                attempts,
                budget,
                "remote rejected request as too large"
            );

            if attempts >= budget {
                return Err(ProviderError::new(self.backend.name(), err)
                    .with_recovery_attempts(attempts));
            }
            if unshrunk.is_none() {
                unshrunk = Some(self.buffer.clone());
            }
            let Some(removed) = self.buffer.shrink_for_overflow() else {
                warn!("history cannot shrink further");
                return Err(ProviderError::new(self.backend.name(), err)
                    .with_recovery_attempts(attempts));
            };
            attempts += 1;
            info!(removed, kept = self.buffer.len(), attempt = attempts, "shrunk history, retrying");
        }
    }
}

#[async_trait]
impl<B: CompletionBackend> ProviderClient for ConversationClient<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn model(&self) -> &str {
        self.backend.model()
    }

    fn kind(&self) -> ProviderKind {
        self.backend.kind()
    }

    fn history_len(&self) -> usize {
        self.buffer.history_len()
    }

    fn reset(&mut self) {
        let removed = self.buffer.clear_history();
        info!(provider = self.backend.name(), removed, "conversation reset");
    }

    #[instrument(skip_all, fields(provider = %self.backend.name(), model = %self.backend.model()))]
    async fn submit(&mut self, user_text: &str) -> Result<String, ProviderError> {
        self.buffer.push(ConversationTurn::user(user_text));
        debug!(turns = self.buffer.len(), "submitting");

        let completion = match self.complete_with_recovery().await {
            Ok(completion) => completion,
            Err(err) => {
                self.buffer.rollback_pending();
                return Err(err);
            }
        };

        let body = match completion.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                warn!("remote returned an empty reply");
                EMPTY_REPLY.to_string()
            }
        };

        self.buffer.push(ConversationTurn::assistant(body.clone()));
        let removed = self.buffer.prune();
        if !removed.is_empty() {
            debug!(removed = removed.len(), turns = self.buffer.len(), "pruned oldest exchange");
        }

        let reply = append_references(&body, &completion.references);
        Ok(self.formatter.format(user_text, &reply))
    }
}
