//! Error types for the GroundChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all GroundChat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Search provider errors ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    // --- Context window errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider returned no reply")]
    EmptyResponse,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Search authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed search document: {0}")]
    MalformedDocument(String),

    #[error("Search client not configured: {0}")]
    NotConfigured(String),

    #[error("Search timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// No exact profile and no family rule covers this identifier.
    #[error(
        "Token counting is not implemented for model '{model}'; \
         see https://github.com/openai/openai-python/blob/main/chatml.md for how messages are converted to tokens"
    )]
    UnsupportedModel { model: String },

    #[error("Tokenizer {name} could not be loaded: {reason}")]
    Tokenizer { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn unsupported_model_names_the_model() {
        let err = Error::from(ContextError::UnsupportedModel {
            model: "davinci-002".into(),
        });
        assert!(err.to_string().contains("davinci-002"));
    }

    #[test]
    fn search_error_converts_into_domain_error() {
        let err: Error = SearchError::Network("connection refused".into()).into();
        assert!(matches!(err, Error::Search(SearchError::Network(_))));
        assert!(err.to_string().starts_with("Search error"));
    }
}
