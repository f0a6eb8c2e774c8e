//! Error Types for warcmill
//!
//! This module defines all error types that can occur while decoding and
//! parallelizing WARC streams.
//!
//! ## Error Categories
//!
//! ### I/O Errors
//! - File and pipe operations; always fatal at the top of the driver.
//!
//! ### Decode Faults (recoverable)
//! - `Gzip`, `Bzip2`, `Xz`: the codec library rejected its input
//! - `Corrupt`: everything else wrong with the compressed byte stream
//!   (uncompressed data where a chained member was required, no usable
//!   jump target in an offset index, a member cut off mid-stream)
//!
//! These are recovered by resynchronization: the reader scans forward for the
//! next codec magic (or jumps to a sidecar offset) and the parser reports the
//! gap as a skip record.
//!
//! ### Framing Faults (recoverable)
//! - `Frame`: a WARC record violated its framing (bad version line, missing
//!   or duplicate `Content-Length`, missing trailing CRLF CRLF, end of input
//!   inside a record)
//!
//! Recovered by scanning forward for the next `WARC/1.0` header.
//!
//! ### Configuration and Child Errors (fatal)
//! - `Template`: an output file name template without placeholders
//! - `Child`: a worker child process could not be launched or managed
//!
//! ## Usage
//! All fallible functions return `Result<T>`, aliased to
//! `Result<T, Error>`, so `?` propagates everywhere. The WARC parsing loop
//! uses `is_decode_fault()` / `is_frame_fault()` to decide which recovery to
//! run; anything else bubbles up.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gzip error: {0}")]
    Gzip(String),

    #[error("bzip2 error: {0}")]
    Bzip2(String),

    #[error("xz error: {0}")]
    Xz(String),

    #[error("corrupt compressed stream: {0}")]
    Corrupt(String),

    #[error("WARC framing error: {0}")]
    Frame(String),

    #[error("bad file name template: {0}")]
    Template(String),

    #[error("child process error: {0}")]
    Child(String),
}

impl Error {
    /// True for faults in the compressed byte stream, recovered by
    /// resynchronizing to the next codec member.
    pub fn is_decode_fault(&self) -> bool {
        matches!(
            self,
            Error::Gzip(_) | Error::Bzip2(_) | Error::Xz(_) | Error::Corrupt(_)
        )
    }

    /// True for faults in WARC record framing, recovered by scanning for the
    /// next record header.
    pub fn is_frame_fault(&self) -> bool {
        matches!(self, Error::Frame(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
