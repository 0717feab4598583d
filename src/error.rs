//! Error taxonomy for the scanner.
//!
//! `NotFound` is deliberately not a variant here: a completed-but-empty
//! sweep is a quiet, non-erroring outcome, so it's the `None` arm of the
//! scanner's `Result<ScanReport, ScanError>` return type instead.
//! Near-miss diagnostics are data (`crate::scanner::NearMiss`), not
//! errors.

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Bad CLI arguments, device cannot be opened.
    #[error("configuration error: {0}")]
    Config(String),

    /// Superblock missing, magic mismatch, unsupported feature/checksum
    /// algorithm.
    #[error("format error: {0}")]
    Format(String),

    /// Underlying read failed, or returned an unexpected short count on
    /// the first stride of the sweep.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Chunk mapper refused an offset that should have been resolvable
    /// below the sweep bound.
    #[error("mapping error: {0}")]
    Mapping(String),
}
