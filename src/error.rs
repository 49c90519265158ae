//! Error taxonomy.
//!
//! Geometry contract violations are caller bugs and panic at the boundary
//! (`Viewport::new`); everything on the async volume pipeline is a value.

/// Malformed geometry input: non-finite viewport, invalid counts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("contract violation: {0}")]
pub struct ContractViolation(pub String);

/// Failure raised by an adapter while producing a raw manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the store/navigation bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no adapter registered for volume '{0}'")]
    UnknownVolume(String),

    #[error("manifest load failed for volume '{volume}': {source}")]
    ManifestLoad {
        volume: String,
        #[source]
        source: ManifestError,
    },

    #[error("manifest validation failed for volume '{volume}': {}", errors.join("; "))]
    ManifestValidation { volume: String, errors: Vec<String> },

    #[error("deep link '{token}' could not be resolved: {reason}")]
    DeepLinkResolution { token: String, reason: String },

    #[error("no volume loaded")]
    NoVolume,

    #[error("item '{0}' not found in current volume")]
    UnknownItem(String),

    #[error("dimension '{name}' has no value '{value}'")]
    UnknownDimension { name: String, value: String },
}

impl BridgeError {
    /// Short tag used in telemetry payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownVolume(_) => "unknown-volume",
            Self::ManifestLoad { .. } => "manifest-load",
            Self::ManifestValidation { .. } => "manifest-validation",
            Self::DeepLinkResolution { .. } => "deep-link-resolution",
            Self::NoVolume => "no-volume",
            Self::UnknownItem(_) => "unknown-item",
            Self::UnknownDimension { .. } => "unknown-dimension",
        }
    }
}

/// Configuration file problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
