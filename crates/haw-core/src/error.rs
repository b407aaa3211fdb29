//! Error types for haw

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HawError {
    #[error("Invalid pitch: {0:?}")]
    InvalidPitch(String),
    #[error("Invalid note duration: {0:?}")]
    InvalidDuration(String),
}

pub type Result<T> = std::result::Result<T, HawError>;
