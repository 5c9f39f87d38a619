use thiserror::Error;

use crate::engine::route::Route;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("invalid polar data: {0}")]
    InvalidPolarData(String),

    #[error("fatal configuration error: {0}")]
    FatalConfiguration(String),

    /// Normal termination signal: no route reached the destination in time.
    #[error("destination unreachable after {steps} steps")]
    DestinationUnreachable { steps: u32 },

    /// Cooperative cancellation, carrying the best routes found so far.
    #[error("routing cancelled after {steps} steps")]
    Cancelled { steps: u32, best_partial: Vec<Route> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RoutingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::FatalConfiguration(msg.into())
    }

    pub fn polar(msg: impl Into<String>) -> Self {
        Self::InvalidPolarData(msg.into())
    }
}
