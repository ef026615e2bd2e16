//! Errors returned by the emission core.
//!
//! Startup-time wiring errors ([`SdkError::Configuration`],
//! [`SdkError::DuplicateInstrument`]) are meant to abort process start.
//! Everything else is raised in steady state and is absorbed by the pipelines:
//! it is logged and the affected record or batch is dropped.
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;

/// Errors raised by the telemetry emission core.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SdkError {
    /// Invalid configuration: bad endpoint, malformed attributes, invalid
    /// instrument name or unit.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An instrument with the same name and unit was already registered.
    #[error("Instrument `{name}` with unit `{unit}` is already registered")]
    DuplicateInstrument {
        /// Name of the rejected instrument.
        name: String,
        /// Unit of the rejected instrument.
        unit: String,
    },

    /// A recorded value was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The sink could not be reached or rejected the batch.
    #[error("Export failed: {0}")]
    ExportFailure(String),

    /// A flush or shutdown did not complete in its time budget.
    #[error("Operation timed out after {0:?}")]
    ShutdownTimeout(Duration),

    /// The component was already shut down.
    #[error("Already shut down")]
    AlreadyShutdown,

    /// An unexpected internal failure, such as a poisoned lock or a dead worker
    /// thread.
    #[error("Internal failure: {0}")]
    InternalFailure(String),
}

impl<T> From<PoisonError<T>> for SdkError {
    fn from(err: PoisonError<T>) -> Self {
        SdkError::InternalFailure(format!("lock poisoned: {}", err))
    }
}

/// Folds the errors of several components into one result.
pub(crate) fn combine_errors(mut errors: Vec<SdkError>) -> SdkResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(SdkError::InternalFailure(format!("errors: {errors:?}"))),
    }
}
