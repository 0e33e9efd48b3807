// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the PSTH engine
//!
//! None of these cross a producer thread boundary: the broadcast entry points
//! log them and carry on.

use thiserror::Error;

/// Result type alias using EngineError
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors reported by the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Control message matched a known prefix but had the wrong shape
    #[error("Malformed control message '{message}': {reason}")]
    MalformedMessage { message: String, reason: String },

    /// Trial-type id was never registered by an AddCondition message
    #[error("Unmapped trial type: {0}")]
    UnmappedTrialType(String),

    /// Plot request string could not be parsed
    #[error("Malformed plot request '{0}'")]
    MalformedPlotRequest(String),

    /// Host parameter could not be applied
    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// Bin configuration rejected (zero bins or zero width)
    #[error("Invalid binning: n_bins={n_bins}, bin_size={bin_size}")]
    InvalidBinning { n_bins: usize, bin_size: i64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    pub(crate) fn malformed(message: &str, reason: impl Into<String>) -> Self {
        EngineError::MalformedMessage {
            message: message.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors counted as malformed input
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedMessage { .. }
                | EngineError::MalformedPlotRequest(_)
                | EngineError::InvalidParameter { .. }
                | EngineError::InvalidBinning { .. }
        )
    }
}
