// Error handling for the C3D codec

use crate::core::constants::Processor;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, C3dError>;

#[derive(Error, Debug)]
pub enum C3dError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic byte: expected {expected}, got {got}")]
    InvalidMagic { expected: u8, got: u8 },

    #[error("Unsupported processor: {0}, only Intel files can be read")]
    UnsupportedProcessor(Processor),

    #[error("Malformed record: {0}")]
    Format(String),

    #[error("Inconsistent {field}: {header} header != {parameter} parameter")]
    InconsistentMetadata {
        field: &'static str,
        header: f64,
        parameter: f64,
    },

    #[error("{name}: cannot get value as {view}")]
    Shape { name: String, view: &'static str },

    #[error("Parameter not found: {0}")]
    NotFound(String),

    #[error("Duplicate group: {0}")]
    DuplicateGroup(String),

    #[error("Invalid UTF-8 string")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl C3dError {
    /// True for the errors that reject a file outright.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            C3dError::InvalidMagic { .. } | C3dError::UnsupportedProcessor(_) | C3dError::Format(_)
        )
    }
}
