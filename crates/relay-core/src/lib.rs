pub mod conversation;
pub mod errors;
pub mod format;
pub mod provider;
pub mod security;
pub mod turn;

pub use conversation::{ConversationBuffer, Preamble};
pub use errors::{AllProvidersFailed, ConfigError, ProviderError, RemoteError, SearchError};
pub use format::ResponseFormatter;
pub use provider::{
    Completion, CompletionBackend, CompletionOptions, ProviderClient, ProviderKind, Reference,
};
pub use security::ApiKey;
pub use turn::{ConversationTurn, Role};
