//! Bounded per-provider conversation state.
//!
//! A [`ConversationBuffer`] holds an optional fixed preamble followed by the
//! live history. The preamble is never evicted. Two shrink policies exist:
//!
//! - [`ConversationBuffer::prune`]: ordinary pruning after a completed exchange.
//!   Drops the oldest user/assistant pair until the history fits `max_turns`.
//! - [`ConversationBuffer::shrink_for_overflow`]: emergency resize after the
//!   remote rejected the request as too large. Keeps roughly the newest half.
//!
//! `max_turns` counts history turns only; preamble slots are extra.

use crate::turn::ConversationTurn;

/// Fixed leading turns that establish persona or system behavior.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Preamble {
    #[default]
    None,
    /// A single system turn (providers with a native system role).
    System(String),
    /// A user prompt plus the assistant's acknowledgement (providers without one).
    Exchange {
        prompt: String,
        acknowledgement: String,
    },
}

impl Preamble {
    pub fn turns(&self) -> Vec<ConversationTurn> {
        match self {
            Self::None => Vec::new(),
            Self::System(text) => vec![ConversationTurn::system(text.clone())],
            Self::Exchange {
                prompt,
                acknowledgement,
            } => vec![
                ConversationTurn::user(prompt.clone()),
                ConversationTurn::assistant(acknowledgement.clone()),
            ],
        }
    }

    /// Number of buffer slots the preamble occupies.
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::System(_) => 1,
            Self::Exchange { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Ordered, length-bounded turn sequence owned by one provider client.
#[derive(Clone, Debug)]
pub struct ConversationBuffer {
    turns: Vec<ConversationTurn>,
    preamble_len: usize,
    max_turns: usize,
}

impl ConversationBuffer {
    pub fn new(preamble: &Preamble, max_turns: usize) -> Self {
        Self {
            turns: preamble.turns(),
            preamble_len: preamble.len(),
            max_turns,
        }
    }

    /// Immutable snapshot of every turn, preamble first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The live history after the preamble.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.turns[self.preamble_len..]
    }

    pub fn preamble(&self) -> &[ConversationTurn] {
        &self.turns[..self.preamble_len]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.turns.len() - self.preamble_len
    }

    pub fn preamble_len(&self) -> usize {
        self.preamble_len
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.history().last()
    }

    pub fn is_over_limit(&self) -> bool {
        self.history_len() > self.max_turns
    }

    /// Remove the oldest history pair until the buffer is within `max_turns`.
    ///
    /// Returns the removed turns, oldest first. A no-op on a compliant buffer.
    pub fn prune(&mut self) -> Vec<ConversationTurn> {
        let mut removed = Vec::new();
        while self.is_over_limit() {
            let end = self.preamble_len + self.history_len().min(2);
            removed.extend(self.turns.drain(self.preamble_len..end));
        }
        removed
    }

    /// Emergency resize after a size rejection.
    ///
    /// Keeps the preamble plus the newest `ceil(h / 2)` history turns, where `h`
    /// is the current history length, and drops a leading assistant turn so the
    /// kept history starts on a user turn. Returns the number of removed turns,
    /// or `None` when the history is a single turn and cannot shrink further.
    pub fn shrink_for_overflow(&mut self) -> Option<usize> {
        let history = self.history_len();
        if history <= 1 {
            return None;
        }

        let keep = history.div_ceil(2);
        let mut start = self.turns.len() - keep;
        if keep > 1 && self.turns[start].is_assistant() {
            start += 1;
        }

        let removed = start - self.preamble_len;
        self.turns.drain(self.preamble_len..start);
        Some(removed)
    }

    /// Upper bound on [`shrink_for_overflow`](Self::shrink_for_overflow) calls
    /// before the history is down to one turn: `ceil(log2(len))`, at least 1.
    pub fn overflow_recovery_budget(&self) -> u32 {
        let len = self.turns.len().max(2);
        usize::BITS - (len - 1).leading_zeros()
    }

    /// Remove the trailing user turn appended for a request that failed.
    pub fn rollback_pending(&mut self) -> Option<ConversationTurn> {
        if self.last().is_some_and(ConversationTurn::is_user) {
            self.turns.pop()
        } else {
            None
        }
    }

    /// Drop all history, keeping the preamble. Returns the number of removed turns.
    pub fn clear_history(&mut self) -> usize {
        let removed = self.history_len();
        self.turns.truncate(self.preamble_len);
        removed
    }
}
