use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("In-page evaluation failed on {url}: {reason}")]
    Evaluation { url: String, reason: String },

    #[error("Browser session error: {0}")]
    Browser(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        ScanError::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn evaluation(url: &str, reason: impl ToString) -> Self {
        ScanError::Evaluation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
