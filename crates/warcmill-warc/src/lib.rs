//! WARC Record Parsing
//!
//! Layers a record parser on top of [`warcmill_codec::CompressedReader`].
//! [`WarcReader`] yields verbatim records framed by `WARC/1.0` headers and
//! `Content-Length`, and converts decode and framing faults into skip
//! records by resynchronizing.

pub mod index;
pub mod reader;

pub use reader::WarcReader;
