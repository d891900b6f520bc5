//! Error types for Mach-O patching and injection.
//!
//! Every failure surfaced by the core is a typed variant here; presentation
//! is left to the caller. The injector's "already injected" outcome is not an
//! error and is reported through [`crate::injector::InjectOutcome`] instead.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for patch and inject operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short read at offset {offset:#x}: wanted {wanted} bytes")]
    ShortRead { offset: u64, wanted: usize },

    // ==================== Format Errors ====================
    #[error("not a 64-bit Mach-O (magic: {magic:#x})")]
    NotMach64 { magic: u32 },

    #[error("load command at offset {offset:#x}: {reason}")]
    MalformedCommand { offset: u64, reason: String },

    // ==================== Lookup Failures ====================
    #[error("virtual address {addr:#x} not found in any {arch} segment")]
    VaNotFound { arch: String, addr: u64 },

    #[error("no architecture in the binary matches any configured entry")]
    NoArchMatched,

    // ==================== Capacity Failures ====================
    #[error("no space for load command (available: {available}, required: {required})")]
    NoCommandSpace { available: i64, required: usize },

    // ==================== Decode Errors ====================
    #[error("invalid hex string: {reason}")]
    HexDecode { reason: String },

    #[error("failed to load config '{path}': {reason}")]
    ConfigLoad { path: PathBuf, reason: String },
}

/// A specialized Result type for patch and inject operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a malformed load command error with a formatted message.
    #[inline]
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Error::MalformedCommand {
            offset,
            reason: reason.into(),
        }
    }
}
