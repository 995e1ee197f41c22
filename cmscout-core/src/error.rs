use cmscout_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
