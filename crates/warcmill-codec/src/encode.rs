//! Output-Side GZip Encoding
//!
//! Encodes one byte slice as one self-contained gzip member. The parallel
//! driver uses this to wrap each output record independently, so the
//! resulting file is a valid multi-member gzip stream that any decoder (and
//! [`crate::CompressedReader`]) can read end to end.
//!
//! The output buffer grows in 4 KiB steps whenever remaining capacity drops
//! below the 6 bytes zlib needs to finish a stream cleanly in one call.

use flate2::{Compress, Compression, FlushCompress, Status};
use warcmill_core::{Error, Result};

const GROW_INCREMENT: usize = 4096;

/// zlib wants at least this much output room when finishing, or it reports
/// it needs to be called again.
const FLUSH_RESERVE: usize = 6;

/// Compress `input` into `out` as a single gzip member. `out` is cleared
/// first and holds exactly the member afterwards.
pub fn gz_compress(input: &[u8], out: &mut Vec<u8>, level: Compression) -> Result<()> {
    out.clear();
    out.resize(GROW_INCREMENT, 0);
    let mut enc = Compress::new_gzip(level, 15);

    while (enc.total_in() as usize) < input.len() {
        ensure_output(&enc, out);
        let consumed = enc.total_in() as usize;
        let written = enc.total_out() as usize;
        enc.compress(&input[consumed..], &mut out[written..], FlushCompress::None)
            .map_err(|e| Error::Gzip(e.to_string()))?;
    }
    loop {
        ensure_output(&enc, out);
        let written = enc.total_out() as usize;
        let status = enc
            .compress(&[], &mut out[written..], FlushCompress::Finish)
            .map_err(|e| Error::Gzip(e.to_string()))?;
        if matches!(status, Status::StreamEnd) {
            break;
        }
    }
    out.truncate(enc.total_out() as usize);
    Ok(())
}

fn ensure_output(enc: &Compress, out: &mut Vec<u8>) {
    let remaining = out.len() - enc.total_out() as usize;
    if remaining < FLUSH_RESERVE {
        out.resize(out.len() + GROW_INCREMENT, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompressedReader;
    use std::io::{Cursor, Read};

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    fn gunzip(member: &[u8]) -> Vec<u8> {
        let mut dec = flate2::read::GzDecoder::new(member);
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        out
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut state: u64 = 0x2545f4914f6cdd1d;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Round trips
    // ---------------------------------------------------------------

    #[test]
    fn test_roundtrip_small() {
        let mut out = Vec::new();
        gz_compress(b"hello gzip", &mut out, Compression::default()).unwrap();
        assert_eq!(gunzip(&out), b"hello gzip");
    }

    #[test]
    fn test_roundtrip_empty_input() {
        let mut out = Vec::new();
        gz_compress(b"", &mut out, Compression::default()).unwrap();
        assert!(!out.is_empty()); // header + empty deflate + trailer
        assert_eq!(gunzip(&out), b"");
    }

    #[test]
    fn test_roundtrip_incompressible_forces_growth() {
        // Incompressible input inflates past the initial 4 KiB buffer.
        let payload = noise(64 * 1024);
        let mut out = Vec::new();
        gz_compress(&payload, &mut out, Compression::default()).unwrap();
        assert!(out.len() > GROW_INCREMENT);
        assert_eq!(gunzip(&out), payload);
    }

    #[test]
    fn test_roundtrip_best_and_fast_levels() {
        let payload = b"levels levels levels ".repeat(500);
        for level in [Compression::fast(), Compression::best()] {
            let mut out = Vec::new();
            gz_compress(&payload, &mut out, level).unwrap();
            assert_eq!(gunzip(&out), payload);
        }
    }

    #[test]
    fn test_output_reused_across_calls() {
        let mut out = Vec::new();
        gz_compress(b"first", &mut out, Compression::default()).unwrap();
        let first = out.clone();
        gz_compress(b"second", &mut out, Compression::default()).unwrap();
        assert_ne!(first, out);
        assert_eq!(gunzip(&out), b"second");
    }

    // ---------------------------------------------------------------
    // Members concatenate into a stream our own reader accepts
    // ---------------------------------------------------------------

    #[test]
    fn test_members_chain_through_compressed_reader() {
        let mut stream = Vec::new();
        let mut member = Vec::new();
        for part in [&b"alpha "[..], b"beta ", b"gamma"] {
            gz_compress(part, &mut member, Compression::default()).unwrap();
            stream.extend_from_slice(&member);
        }
        let mut reader = CompressedReader::new(Cursor::new(stream)).unwrap();
        let mut decoded = Vec::new();
        let mut chunk = [0u8; 32];
        loop {
            let got = reader.read(&mut chunk).unwrap();
            if got == 0 {
                break;
            }
            decoded.extend_from_slice(&chunk[..got]);
        }
        assert_eq!(decoded, b"alpha beta gamma");
    }
}
