use beacon_sdk::SdkError;
use thiserror::Error;

/// Errors that can occur while building the OTLP exporters.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The collector endpoint is not a valid URI.
    #[error("invalid URI {0}. Reason {1}")]
    InvalidUri(String, String),

    /// Wrapped error from the tonic transport layer.
    #[error("transport error {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The channel was built outside of a tokio runtime.
    #[error("no tokio runtime is running: {0}")]
    NoRuntime(String),

    /// The configuration needs a crate feature that is not enabled.
    #[error("feature '{0}' is required to use {1}")]
    FeatureRequired(&'static str, &'static str),
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Error::InvalidUri(err.to_string(), "invalid collector endpoint".to_string())
    }
}

impl From<Error> for SdkError {
    fn from(err: Error) -> Self {
        SdkError::Configuration(err.to_string())
    }
}
