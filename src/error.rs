use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or contradictory user input (period selection, project form).
    #[error("Invalid selection: {0}")]
    Validation(String),

    /// Unknown source identifier or malformed lookup table. Indicates a
    /// deployment defect rather than a user mistake.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Analytics API error: {0}")]
    Analytics(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Analytics(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for Error {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        Error::Notification(e.to_string())
    }
}

impl From<lettre::error::Error> for Error {
    fn from(e: lettre::error::Error) -> Self {
        Error::Notification(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
