use std::time::Duration;

/// Error codes that providers use for "request body / context too large".
const SIZE_REJECTION_CODES: &[&str] = &[
    "request_too_large",
    "payload_too_large",
    "request_entity_too_large",
    "context_length_exceeded",
];

/// Typed failure of a single remote completion call.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("payload too large ({status}): {message}")]
    PayloadTooLarge { status: u16, message: String },
    #[error("invalid request ({status}): {message}")]
    InvalidRequest {
        status: u16,
        message: String,
        code: Option<String>,
    },
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },
    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RemoteError {
    /// Classify an HTTP failure from its status and the parsed error envelope.
    pub fn from_status(status: u16, message: String, code: Option<String>) -> Self {
        if status == 413 || code.as_deref().is_some_and(is_size_rejection_code) {
            return Self::PayloadTooLarge { status, message };
        }
        match status {
            401 | 403 => Self::AuthenticationFailed(message),
            429 => Self::RateLimited {
                retry_after: None,
                message,
            },
            500..=599 => Self::ServerError { status, message },
            _ => Self::InvalidRequest {
                status,
                message,
                code,
            },
        }
    }

    /// The remote refused the request because it was too large.
    pub fn is_size_rejection(&self) -> bool {
        matches!(self, Self::PayloadTooLarge { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ServerError { .. } | Self::NetworkError(_)
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

fn is_size_rejection_code(code: &str) -> bool {
    SIZE_REJECTION_CODES
        .iter()
        .any(|marker| code.eq_ignore_ascii_case(marker))
}

/// A provider gave up on a request, after any local overflow recovery.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{provider} failed: {source}")]
pub struct ProviderError {
    pub provider: String,
    pub source: RemoteError,
    /// How many overflow shrinks were tried before giving up.
    pub recovery_attempts: u32,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, source: RemoteError) -> Self {
        Self {
            provider: provider.into(),
            source,
            recovery_attempts: 0,
        }
    }

    pub fn with_recovery_attempts(mut self, attempts: u32) -> Self {
        self.recovery_attempts = attempts;
        self
    }

    pub fn is_size_rejection(&self) -> bool {
        self.source.is_size_rejection()
    }

    pub fn error_kind(&self) -> &'static str {
        self.source.error_kind()
    }
}

/// Startup configuration problems. Fatal only for the mandatory provider.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{provider} requires the {env_var} environment variable")]
    MissingCredential {
        provider: String,
        env_var: &'static str,
    },
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("invalid configuration: {0}")]
    InvalidValue(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Every provider in the fallback chain failed, the mandatory one included.
#[derive(Clone, Debug, thiserror::Error)]
#[error("all providers failed ({}); last error: {source}", .attempted.join(" -> "))]
pub struct AllProvidersFailed {
    /// Provider names in the order they were tried.
    pub attempted: Vec<String>,
    /// The terminal cause, from the mandatory provider.
    pub source: ProviderError,
}

/// Direct search was requested but no search provider is configured.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SearchError {
    #[error("web search is not available")]
    Unavailable,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
