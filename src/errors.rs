// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only *configuration* problems surface as errors. Anything that goes wrong
//! with an individual run (non-zero exit, signal, failed spawn) is reported
//! as data on its [`ExitResult`](crate::exec::ExitResult) instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No workspace declares script '{script}'")]
    ScriptNotFound { script: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WsrunError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        WsrunError::ConfigError(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WsrunError>;
