//! Unified application error type.
//! All modules (db, core, adapters, cli) return AppError to keep the error
//! handling consistent and easy to manage.

use crate::adapters::AdapterError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Database-related
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Database migration error: {0}")]
    Migration(String),

    // ---------------------------
    // Serialization
    // ---------------------------
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTime(String),

    #[error("Invalid change source: {0}")]
    InvalidSource(String),

    #[error("Invalid source row state: {0}")]
    InvalidRowState(String),

    #[error("Invalid change type: {0}")]
    InvalidChangeType(String),

    // ---------------------------
    // Sync errors
    // ---------------------------
    #[error("External source failure: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Safety abort: {0}")]
    SafetyAbort(String),

    #[error("State violation: {0}")]
    StateViolation(String),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

pub type AppResult<T> = Result<T, AppError>;
