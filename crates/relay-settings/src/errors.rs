//! Why a settings load was refused.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProviderId;

#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not JSON.
    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Valid JSON whose values have the wrong type, e.g. `"maxTurns": "ten"`.
    #[error("settings have the wrong shape: {0}")]
    Schema(#[from] serde_json::Error),
    /// A history window that cannot hold one exchange.
    #[error("providers.{provider}.maxTurns must be at least 2 (got {got})")]
    MaxTurnsTooSmall { provider: ProviderId, got: usize },
    #[error("providers.{provider}.temperature must be within 0..=2 (got {got})")]
    TemperatureOutOfRange { provider: ProviderId, got: f64 },
    #[error("providers.{provider}.model must not be empty")]
    EmptyModel { provider: ProviderId },
    /// No room for even the signature.
    #[error("formatter.charLimit must be positive")]
    ZeroCharLimit,
}

impl SettingsError {
    /// The provider a validation failure is about, if any.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::MaxTurnsTooSmall { provider, .. }
            | Self::TemperatureOutOfRange { provider, .. }
            | Self::EmptyModel { provider } => Some(*provider),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;
