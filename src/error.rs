//! Error types for barbershop.

use thiserror::Error;

use crate::model::{ItemId, Score};

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("item {0} is already indexed")]
    DuplicateKey(ItemId),

    /// The identity index and the score pools disagree. Fatal for the engine.
    #[error("internal consistency violation: {0}")]
    Inconsistent(String),

    /// Refusing work after an earlier consistency violation.
    #[error("engine poisoned by earlier consistency violation: {0}")]
    Poisoned(String),

    #[error("score overflow for item {id}: {score} + {delta}")]
    ScoreOverflow {
        id: ItemId,
        score: Score,
        delta: Score,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that a client caused and can correct by re-sending.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::ScoreOverflow { .. } | Error::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
