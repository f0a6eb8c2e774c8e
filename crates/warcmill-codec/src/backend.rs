//! Codec Backends
//!
//! Thin adapters around the gzip, bzip2, and xz stream decoders so the
//! reader can drive all three through one contract:
//!
//! ```text
//! step(input, output, input_done) -> (consumed, produced, outcome)
//! ```
//!
//! Each call decodes as much of `input` into `output` as the library will
//! take in one pass. `consumed`/`produced` report how far each buffer
//! advanced; `outcome` says whether the current member wants more input or
//! has ended. `input_done` tells the backend the source is exhausted, which
//! for xz switches `lzma_code` from `Run` to `Finish`.
//!
//! Library status codes map onto the shared error taxonomy: data errors
//! become decode faults the reader can resynchronize past, everything else
//! bubbles up as-is.

use warcmill_core::{Error, Result};

/// Magic probe length; long enough for the xz signature, the longest of the
/// three.
pub const MAGIC_LEN: usize = 6;

pub(crate) const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub(crate) const BZIP2_MAGIC: [u8; 3] = *b"BZh";
pub(crate) const XZ_MAGIC: [u8; 6] = [0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// The compressed formats a member can be wrapped in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Bzip2,
    Xz,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Bzip2 => "bzip2",
            Codec::Xz => "xz",
        }
    }
}

/// Identify the codec of a member from its leading bytes, if any.
pub fn detect_codec(header: &[u8]) -> Option<Codec> {
    if header.len() >= GZIP_MAGIC.len() && header[..GZIP_MAGIC.len()] == GZIP_MAGIC {
        return Some(Codec::Gzip);
    }
    if header.len() >= BZIP2_MAGIC.len() && header[..BZIP2_MAGIC.len()] == BZIP2_MAGIC {
        return Some(Codec::Bzip2);
    }
    if header.len() >= XZ_MAGIC.len() && header[..XZ_MAGIC.len()] == XZ_MAGIC {
        return Some(Codec::Xz);
    }
    None
}

/// True if the buffer starts with any known compression magic.
pub fn is_compressed_magic(header: &[u8]) -> bool {
    detect_codec(header).is_some()
}

/// What a decode step reported about the current member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The member continues; feed more input or drain more output
    MoreWanted,
    /// The member ended cleanly; unconsumed input belongs to the next one
    MemberEnd,
}

/// One decoder instance for one compressed member
pub enum Backend {
    Gzip(flate2::Decompress),
    Bzip2(bzip2::Decompress),
    Xz(xz2::stream::Stream),
}

impl Backend {
    pub fn new(codec: Codec) -> Result<Self> {
        match codec {
            // Maximum window; the reader only routes data here after seeing
            // the gzip magic, so no zlib auto-detection is needed.
            Codec::Gzip => Ok(Backend::Gzip(flate2::Decompress::new_gzip(15))),
            Codec::Bzip2 => Ok(Backend::Bzip2(bzip2::Decompress::new(false))),
            Codec::Xz => xz2::stream::Stream::new_stream_decoder(u64::MAX, 0)
                .map(Backend::Xz)
                .map_err(|e| Error::Xz(format!("failed to initialize decoder: {e:?}"))),
        }
    }

    pub fn codec(&self) -> Codec {
        match self {
            Backend::Gzip(_) => Codec::Gzip,
            Backend::Bzip2(_) => Codec::Bzip2,
            Backend::Xz(_) => Codec::Xz,
        }
    }

    /// Decode one buffer's worth. Returns `(consumed, produced, outcome)`.
    pub fn step(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        input_done: bool,
    ) -> Result<(usize, usize, StepOutcome)> {
        match self {
            Backend::Gzip(inner) => {
                let (in_before, out_before) = (inner.total_in(), inner.total_out());
                let status = inner
                    .decompress(input, output, flate2::FlushDecompress::None)
                    .map_err(|e| Error::Gzip(e.to_string()))?;
                let consumed = (inner.total_in() - in_before) as usize;
                let produced = (inner.total_out() - out_before) as usize;
                let outcome = match status {
                    flate2::Status::StreamEnd => StepOutcome::MemberEnd,
                    flate2::Status::Ok | flate2::Status::BufError => StepOutcome::MoreWanted,
                };
                Ok((consumed, produced, outcome))
            }
            Backend::Bzip2(inner) => {
                let (in_before, out_before) = (inner.total_in(), inner.total_out());
                let status = inner.decompress(input, output).map_err(|e| match e {
                    bzip2::Error::Data => Error::Bzip2("detected a corrupt stream".into()),
                    bzip2::Error::DataMagic => {
                        Error::Bzip2("bad magic bytes, perhaps not a bzip2 stream after all".into())
                    }
                    other => Error::Bzip2(format!("{other:?}")),
                })?;
                let consumed = (inner.total_in() - in_before) as usize;
                let produced = (inner.total_out() - out_before) as usize;
                let outcome = match status {
                    bzip2::Status::StreamEnd => StepOutcome::MemberEnd,
                    _ => StepOutcome::MoreWanted,
                };
                Ok((consumed, produced, outcome))
            }
            Backend::Xz(inner) => {
                let action = if input_done {
                    xz2::stream::Action::Finish
                } else {
                    xz2::stream::Action::Run
                };
                let (in_before, out_before) = (inner.total_in(), inner.total_out());
                let status = inner.process(input, output, action).map_err(|e| match e {
                    xz2::stream::Error::Data => Error::Xz("stream is corrupt".into()),
                    xz2::stream::Error::Format => Error::Xz("file format not recognized".into()),
                    other => Error::Xz(format!("{other:?}")),
                })?;
                let consumed = (inner.total_in() - in_before) as usize;
                let produced = (inner.total_out() - out_before) as usize;
                let outcome = match status {
                    xz2::stream::Status::StreamEnd => StepOutcome::MemberEnd,
                    _ => StepOutcome::MoreWanted,
                };
                Ok((consumed, produced, outcome))
            }
        }
    }
}
