//! Streaming Multi-Codec Decompression
//!
//! This crate reads concatenated gzip, bzip2, xz, and uncompressed data as a
//! single byte stream, and provides the gzip encoder used on the output side
//! of the pipeline.
//!
//! ## Layout
//! - [`backend`]: thin adapters giving gzip/bzip2/xz decoders one uniform
//!   buffer-stepping contract
//! - [`reader`]: [`CompressedReader`], which detects each member's codec by
//!   magic bytes, chains members, and resynchronizes past corrupt ones
//! - [`encode`]: [`gz_compress`], one independent gzip member per call

pub mod backend;
pub mod encode;
pub mod reader;

pub use backend::{detect_codec, is_compressed_magic, Codec, MAGIC_LEN};
pub use encode::gz_compress;
pub use reader::CompressedReader;
