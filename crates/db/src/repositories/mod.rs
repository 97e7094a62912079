use thiserror::Error;

pub mod event;

pub use event::SqlEventSink;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not encode event meta: {0}")]
    Encode(String),
}
