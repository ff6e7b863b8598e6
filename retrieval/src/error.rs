use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Limit must be greater than zero")]
    ZeroLimit,
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
