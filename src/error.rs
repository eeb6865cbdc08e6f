use thiserror::Error;

/// Failures raised by the places web service capability itself.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("places service returned {status}: {message}")]
    Status { status: String, message: String },

    #[error("could not decode places response: {0}")]
    Decode(String),

    #[error("API key is missing or blank")]
    InvalidCredential,

    #[error("invalid API endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Reasons the transformer rejects a payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("payload has no place_id")]
    MissingPlaceId,

    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API failure: {0}")]
    Api(#[from] ApiError),

    #[error("Detail fetch failed for {place_id}: {reason}")]
    DetailFetch { place_id: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScraperError {
    /// True for the failures that abort a run: bad configuration and list/construct API errors.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScraperError::Config(_) | ScraperError::Api(_))
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
pub type ApiResult<T> = std::result::Result<T, ApiError>;
