//! Error types for wordshard
//!
//! Provides a unified error type for all operations.

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::Stage;

/// Result type alias using WordShardError
pub type Result<T> = std::result::Result<T, WordShardError>;

/// Unified error type for wordshard operations
#[derive(Debug, Error)]
pub enum WordShardError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Engine is shut down")]
    ShutDown,

    #[error("Shutdown already requested")]
    AlreadyShutDown,

    #[error("Engine was cancelled")]
    Cancelled,

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    #[error("Pipeline disconnected: {0}")]
    Disconnected(String),

    #[error("{stage} worker {index} panicked")]
    WorkerPanicked { stage: Stage, index: usize },
}
