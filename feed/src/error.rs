//! Pipeline error type.
//!
//! Only startup can fail loudly. Once the threads are running, problems
//! are absorbed into counters and, at worst, the engine's health flag.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),

    #[error("thread spawn failed: {0}")]
    Thread(#[source] io::Error),

    #[error("operation requires a stopped pipeline")]
    AlreadyRunning,
}
