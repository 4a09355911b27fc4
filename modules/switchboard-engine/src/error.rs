//! Errors surfaced by `send` and JSON construction.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediatorError {
    #[error("Modifier failed for event {event}: {source}")]
    Modifier {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Middleware #{index} failed for event {event}: {source}")]
    Middleware {
        event: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Listener on {key} failed for event {event}: {source}")]
    Listener {
        event: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Context must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
