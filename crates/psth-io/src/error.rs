// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use psth_transports::TransportError;
use thiserror::Error;

pub type ListenerResult<T> = Result<T, ListenerError>;

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Failed to bind control listener on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("Invalid listener configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn listener thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Listener thread panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Transport(#[from] TransportError),
}
