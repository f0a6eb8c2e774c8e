//! Record Data Structure
//!
//! This module defines the core `Record` type - one WARC record as it moves
//! through the pipeline.
//!
//! ## What is a Record?
//! The verbatim bytes of a single WARC record: the `WARC/1.0` version line,
//! the header lines, the blank separator line, exactly `Content-Length`
//! bytes of content, and the trailing `\r\n\r\n`. The pipeline never parses
//! the content; records are opaque byte blobs framed by their headers.
//!
//! ## Skip Records
//! When the reader has to resynchronize (a corrupt compressed member, a
//! mangled record header), it reports the gap as a *skip record*: an empty
//! body and a non-zero `skipped` count of source bytes that were passed
//! over. Exactly one of the two is ever populated:
//! - normal record: non-empty `body`, `skipped == 0`
//! - skip record: empty `body`, `skipped > 0`
//!
//! ## Allocation Reuse
//! Readers fill records by swapping buffers rather than allocating per
//! record: the caller keeps handing the same `Record` back to
//! `WarcReader::read`, which moves the previous allocation into its scratch
//! space. Use `take_body` to move a body out (e.g. onto a queue) while
//! leaving a reusable empty buffer behind.

use bytes::BytesMut;

/// One WARC record (or a skip marker) produced by a reader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Source bytes discarded by resynchronization immediately before this
    /// record; 0 under normal reads
    pub skipped: u64,

    /// Verbatim record bytes (headers + content + trailing CRLF CRLF);
    /// empty for a skip record
    pub body: BytesMut,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if this record only marks skipped input rather than data.
    pub fn is_skip(&self) -> bool {
        self.body.is_empty() && self.skipped > 0
    }

    /// Move the body out, leaving an empty buffer in place.
    pub fn take_body(&mut self) -> BytesMut {
        std::mem::take(&mut self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty() {
        let rec = Record::new();
        assert_eq!(rec.skipped, 0);
        assert!(rec.body.is_empty());
        assert!(!rec.is_skip());
    }

    #[test]
    fn test_skip_record() {
        let rec = Record {
            skipped: 1024,
            body: BytesMut::new(),
        };
        assert!(rec.is_skip());
    }

    #[test]
    fn test_normal_record_is_not_skip() {
        let rec = Record {
            skipped: 0,
            body: BytesMut::from(&b"WARC/1.0\r\n"[..]),
        };
        assert!(!rec.is_skip());
    }

    #[test]
    fn test_take_body_leaves_empty() {
        let mut rec = Record {
            skipped: 0,
            body: BytesMut::from(&b"payload"[..]),
        };
        let body = rec.take_body();
        assert_eq!(&body[..], b"payload");
        assert!(rec.body.is_empty());
    }
}
