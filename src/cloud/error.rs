use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("Not allowed to upload results to the cloud; check your access token")]
    NotAuthorized,

    #[cfg(feature = "http-client")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Cloud API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CloudError {
    /// Message worth showing the user verbatim in the collector's status line.
    ///
    /// Returns `None` for errors that should collapse into the generic
    /// failure text.
    pub fn status_text(&self) -> Option<String> {
        match self {
            CloudError::NotAuthorized => Some(self.to_string()),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "http-client")]
            CloudError::HttpError(_) => true,
            CloudError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
