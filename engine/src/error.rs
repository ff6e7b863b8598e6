use lore_protocol::SessionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] lore_retrieval::RetrievalError),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Composition failed: {0}")]
    Composition(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
