//! Error types for loading and parsing ELF images.
//!
//! Parsing an in-memory buffer only ever fails with [`ElfError`]. Loading from
//! a path can additionally fail in the I/O layer; [`Error`] joins the two.

use thiserror::Error;

use crate::elf::types::ElfError;
use crate::io::error::IoError;

/// Main error type for path-based construction.
#[derive(Debug, Error)]
pub enum Error {
    /// The file could not be loaded
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The file was loaded but is not a well-formed ELF image
    #[error("Invalid ELF image: {0}")]
    Elf(#[from] ElfError),
}

/// Result type alias for path-based construction
pub type Result<T> = std::result::Result<T, Error>;
