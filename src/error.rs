//! Error types for hyb

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{what} {value} exceeds the u32 range")]
    IntegerRange { what: &'static str, value: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Index corruption: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, Error>;
