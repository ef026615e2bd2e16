//! Pieces shared by the trace and metric export pipelines.
//!
//! Both [`BatchSpanProcessor`] and [`PeriodicReader`] own a dedicated worker
//! thread that moves data to an exporter. Their lifecycle is reported as a
//! [`PipelineState`] and failed exports are retried according to a
//! [`RetryPolicy`].
//!
//! [`BatchSpanProcessor`]: crate::trace::BatchSpanProcessor
//! [`PeriodicReader`]: crate::metrics::PeriodicReader
use std::sync::atomic::{AtomicU8, Ordering};

mod retry;

pub use retry::RetryPolicy;
pub(crate) use retry::retry_with_exponential_backoff;

/// Lifecycle of an export pipeline.
///
/// Transitions only move forward:
/// `Initialized -> Running -> ShuttingDown -> Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    /// Created, worker thread not yet processing.
    Initialized,
    /// Accepting data and flushing on schedule.
    Running,
    /// Shutdown requested; the final flush is in progress.
    ShuttingDown,
    /// Worker has exited. Nothing more is exported.
    Stopped,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Initialized,
            1 => PipelineState::Running,
            2 => PipelineState::ShuttingDown,
            _ => PipelineState::Stopped,
        }
    }
}

/// Atomic holder for a [`PipelineState`] shared between a pipeline handle and
/// its worker thread.
#[derive(Debug)]
pub(crate) struct AtomicPipelineState(AtomicU8);

impl AtomicPipelineState {
    pub(crate) fn new() -> Self {
        AtomicPipelineState(AtomicU8::new(PipelineState::Initialized as u8))
    }

    pub(crate) fn load(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless the pipeline is already at or past it.
    ///
    /// Returns the state observed before the call.
    pub(crate) fn advance(&self, next: PipelineState) -> PipelineState {
        PipelineState::from_u8(self.0.fetch_max(next as u8, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_only_moves_forward() {
        let state = AtomicPipelineState::new();
        assert_eq!(state.load(), PipelineState::Initialized);

        assert_eq!(state.advance(PipelineState::Running), PipelineState::Initialized);
        assert_eq!(state.advance(PipelineState::Stopped), PipelineState::Running);
        assert_eq!(state.advance(PipelineState::Running), PipelineState::Stopped);
        assert_eq!(state.load(), PipelineState::Stopped);
    }
}
