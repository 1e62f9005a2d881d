use thiserror::Error;

/// Aggregates every failure mode exposed by the Hatz client.
///
/// Each variant renders as a single descriptive string so a user interface can show
/// it directly and let the user re-trigger the action. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum HatzError {
    /// No response was received, or the body could not be read.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The service answered with a status outside `200..=299`.
    ///
    /// `message` is the response body when it is non-empty UTF-8, otherwise a
    /// generic `HTTP {status}` line.
    #[error("{message}")]
    Status {
        /// HTTP status code returned by the service.
        status: u16,
        /// Body text or synthetic status line.
        message: String,
    },
    /// The response body did not match the expected JSON shape.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
    /// Local validation failed before any request was sent.
    #[error("{message}")]
    Validation { message: String },
    /// Raised when building or validating configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
    /// The session has no API key, so no client is available.
    #[error("no API key configured")]
    MissingApiKey,
}

impl HatzError {
    /// Creates a [`HatzError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::error::HatzError;
    ///
    /// let err = HatzError::transport("dns lookup failed");
    /// assert!(matches!(err, HatzError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a [`HatzError::Validation`] from a textual description.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a [`HatzError::Decode`] from a textual description.
    pub fn decode<T: Into<String>>(message: T) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Builds the error for a non-2xx response from its raw body bytes.
    ///
    /// The body text becomes the message verbatim when it decodes as UTF-8 and is not
    /// empty; otherwise the message falls back to `HTTP {status}`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::error::HatzError;
    ///
    /// let err = HatzError::from_status(401, b"invalid api key");
    /// assert_eq!(err.to_string(), "invalid api key");
    ///
    /// let err = HatzError::from_status(502, b"");
    /// assert_eq!(err.to_string(), "HTTP 502");
    /// ```
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = match std::str::from_utf8(body) {
            Ok(text) if !text.is_empty() => text.to_string(),
            _ => format!("HTTP {status}"),
        };
        Self::Status { status, message }
    }

    /// Returns the HTTP status code for [`HatzError::Status`] errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
