//! Error types for CodeCloak

use crate::engine::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodeCloakError>;

#[derive(Error, Debug)]
pub enum CodeCloakError {
    /// Unknown preset, malformed configuration document or an option value
    /// the engine refuses.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The source text could not be parsed by the engine.
    #[error("Transformation error: {0}")]
    Transformation(#[source] EngineError),
}

impl CodeCloakError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, CodeCloakError::Configuration(_))
    }
}

impl From<EngineError> for CodeCloakError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidOption { .. } => CodeCloakError::Configuration(err.to_string()),
            other => CodeCloakError::Transformation(other),
        }
    }
}
