//! Error types for Memoria operations

/// Result type for Memoria operations
pub type Result<T> = std::result::Result<T, MemoriaError>;

/// Error types for the Memoria client
#[derive(Debug, thiserror::Error)]
pub enum MemoriaError {
    /// Configuration error (unknown model or memory id, invalid settings)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model service could not be reached or answered with a failure status
    #[error("Transport error: {0}")]
    Transport(String),

    /// Saved session could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML encoding error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for MemoriaError {
    fn from(s: String) -> Self {
        MemoriaError::Other(s)
    }
}

impl From<&str> for MemoriaError {
    fn from(s: &str) -> Self {
        MemoriaError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for MemoriaError {
    fn from(err: anyhow::Error) -> Self {
        MemoriaError::Other(err.to_string())
    }
}
