//! Error types for fetchq.

use thiserror::Error;

use crate::middleware::Stage;

/// Boxed error produced by middleware and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Field url is required in request")]
    MissingUrl,

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("{stage} middleware failed: {source}")]
    Middleware {
        stage: Stage,
        #[source]
        source: BoxError,
    },

    #[error("request abandoned before it was settled")]
    Abandoned,

    #[error("no async runtime available: {0}")]
    Runtime(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn middleware(stage: Stage, source: BoxError) -> Self {
        Self::Middleware { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
