use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the weather fetch paths.
///
/// Every variant is terminal for the fetch that produced it: there are no
/// retries anywhere in the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// No API key configured. Fatal to all fetch paths.
    #[error(
        "No weather API key configured.\n\
         Hint: run `skywatch configure` or set SKYWATCH_API_KEY."
    )]
    MissingApiKey,

    /// The API could not resolve the requested city.
    #[error("City not found: '{city}'")]
    NotFound { city: String },

    /// The API answered with a non-success status.
    #[error("Weather request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Transport-level failure before any HTTP status was received.
    #[error("Failed to reach the weather API: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected schema.
    #[error("Failed to parse weather API response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures of the location resolver.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    Denied,
    #[error("Location service unavailable")]
    Unavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}
