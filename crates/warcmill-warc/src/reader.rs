//! WarcReader - Record Framing over Decompressed Input
//!
//! This module implements `WarcReader`, which pulls one WARC record at a
//! time out of a [`CompressedReader`].
//!
//! ## Record Framing
//!
//! A record is framed entirely by its textual header:
//!
//! ```text
//! WARC/1.0\r\n
//! Name: value\r\n            (any number of header lines)
//! Content-Length: N\r\n      (exactly one, case-insensitive)
//! \r\n
//! <N bytes of content>
//! \r\n\r\n
//! ```
//!
//! `read` returns the record verbatim - header bytes, content, and the
//! trailing CRLF CRLF - so a downstream child process sees exactly what was
//! in the input.
//!
//! ## Read Protocol
//!
//! 1. The caller's previous buffer is swapped in as scratch space and seeded
//!    with the previous call's overhang, so steady-state reading does not
//!    allocate per record.
//! 2. Header lines are pulled through a 4 KiB line reader; the blank line
//!    ends the header and `Content-Length` fixes the total record length.
//! 3. Bytes the line reader pulled in past the record's end move to the
//!    overhang buffer for the next call.
//! 4. A record longer than `size_limit` is discarded instead of stored: the
//!    result is a *skip record* with `skipped` set to the full framed
//!    length. The trailing CRLF CRLF is not verified on this path.
//!
//! ## Fault Recovery
//!
//! - **Framing faults** (bad version line, bad/missing/duplicate
//!   `Content-Length`, missing trailing CRLF CRLF, input ending inside a
//!   record) scan forward for the next `WARC/1.0` and reparse from there.
//! - **Decode faults** from the compressed layer jump to the next offset in
//!   the sidecar index when one was loaded, and otherwise scan for the next
//!   member magic.
//!
//! Both produce a skip record; the pipeline drops those and keeps going.
//!
//! ## Thread Safety
//!
//! WarcReader is NOT thread-safe. Parallelism comes from one reader per
//! input (and per child) as in the worker pool.

use std::mem;
use std::path::Path;

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};
use warcmill_codec::CompressedReader;
use warcmill_core::{Error, Record, Result};

use crate::index;

/// Refill granularity of the header line reader.
const LINE_REFILL: usize = 4096;

/// Refill granularity of the record-header resync scan.
const SCAN_REFILL: usize = 4096;

/// Scratch size while discarding an oversize record.
const DISCARD_CHUNK: usize = 32 * 1024;

/// Reads WARC records, one per call, with skip-record fault recovery
pub struct WarcReader {
    reader: CompressedReader,
    /// Bytes read past the previous record's end, parsed first on the next
    /// call
    overhang: BytesMut,
    /// Raw-stream member offsets from the sidecar index, if one was found
    offsets: Vec<u64>,
}

enum Parsed {
    /// Clean end of input at a record boundary
    Eof,
    /// A complete record is in the caller's buffer
    Record,
    /// The record exceeded `size_limit` and was discarded; holds its full
    /// framed length
    Oversize(u64),
}

impl WarcReader {
    pub fn new(reader: CompressedReader) -> Self {
        Self {
            reader,
            overhang: BytesMut::new(),
            offsets: Vec::new(),
        }
    }

    /// Wrap an arbitrary byte source (a pipe, stdin).
    pub fn from_source(source: Box<dyn std::io::Read + Send>) -> Result<Self> {
        Ok(Self::new(CompressedReader::from_source(source)?))
    }

    /// Open a file, and load its offset-index sidecar when the name looks
    /// like `<stem>.warc.<ext>` and `<stem>.txt` exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut warc = Self::new(CompressedReader::open(path)?);
        if let Some(sidecar) = index::sidecar_path(path) {
            match index::load_offsets(&sidecar) {
                Ok(offsets) => {
                    debug!(
                        count = offsets.len(),
                        sidecar = %sidecar.display(),
                        "loaded offset index"
                    );
                    warc.offsets = offsets;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(sidecar = %sidecar.display(), "no offset index sidecar");
                }
                Err(e) => {
                    warn!(
                        sidecar = %sidecar.display(),
                        error = %e,
                        "ignoring unreadable offset index"
                    );
                }
            }
        }
        Ok(warc)
    }

    /// Read the next record into `out`, reusing its allocation. Returns
    /// `Ok(false)` on clean end of input. Recoverable faults return
    /// `Ok(true)` with a skip record (empty body, non-zero `skipped`).
    pub fn read(&mut self, out: &mut Record, size_limit: u64) -> Result<bool> {
        mem::swap(&mut self.overhang, &mut out.body);
        self.overhang.clear();
        out.skipped = 0;
        match self.parse_record(out, size_limit) {
            Ok(Parsed::Eof) => Ok(false),
            Ok(Parsed::Record) => Ok(true),
            Ok(Parsed::Oversize(total)) => {
                out.body.clear();
                out.skipped = total;
                Ok(true)
            }
            Err(e) if e.is_frame_fault() => {
                warn!(error = %e, "framing fault; scanning for the next record header");
                self.skip_record(out)?;
                Ok(true)
            }
            Err(e) if e.is_decode_fault() => {
                warn!(error = %e, "decode fault; resynchronizing the compressed stream");
                let skipped = self.skip_section()?;
                out.body.clear();
                out.skipped = skipped;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Parse one record into `out.body`. On success the buffer holds exactly
    /// the record (or was used as discard scratch for `Oversize`).
    fn parse_record(&mut self, out: &mut Record, size_limit: u64) -> Result<Parsed> {
        let buf = &mut out.body;
        let mut cursor = HeaderCursor { consumed: 0 };

        let Some((start, end)) = cursor.line(&mut self.reader, buf)? else {
            return Ok(Parsed::Eof);
        };
        if &buf[start..end] != b"WARC/1.0" {
            return Err(Error::Frame(format!(
                "expected WARC/1.0 but got `{}`",
                String::from_utf8_lossy(&buf[start..end])
            )));
        }

        const NAME: &[u8] = b"content-length:";
        let mut content_length: Option<u64> = None;
        loop {
            let Some((start, end)) = cursor.line(&mut self.reader, buf)? else {
                return Err(Error::Frame("record ended inside its header".into()));
            };
            let line = &buf[start..end];
            if line.is_empty() {
                break;
            }
            if line.len() >= NAME.len() && line[..NAME.len()].eq_ignore_ascii_case(NAME) {
                if content_length.is_some() {
                    return Err(Error::Frame(
                        "two Content-Length headers in one record".into(),
                    ));
                }
                let rest = std::str::from_utf8(&line[NAME.len()..])
                    .map_err(|_| Error::Frame("Content-Length value is not text".into()))?;
                let value = rest.trim_start().parse::<u64>().map_err(|_| {
                    Error::Frame(format!("Content-Length parse error in `{}`", rest.trim()))
                })?;
                content_length = Some(value);
            }
        }
        let content_length = content_length
            .ok_or_else(|| Error::Frame("no Content-Length header in record".into()))?;
        // The trailing CRLF CRLF after the content counts toward the frame.
        let total_len = (cursor.consumed as u64)
            .checked_add(content_length)
            .and_then(|v| v.checked_add(4))
            .ok_or_else(|| Error::Frame("Content-Length overflows the record length".into()))?;

        if (buf.len() as u64) > total_len {
            // Line reads pulled in bytes of the next record; save them.
            self.overhang = buf.split_off(total_len as usize);
            Ok(Parsed::Record)
        } else if total_len > size_limit {
            warn!(
                total = total_len,
                limit = size_limit,
                "skipping record longer than the size limit"
            );
            let mut remaining = total_len - buf.len() as u64;
            buf.resize(DISCARD_CHUNK, 0);
            while remaining > 0 {
                let want = remaining.min(buf.len() as u64) as usize;
                let got = self.reader.read(&mut buf[..want])?;
                if got == 0 {
                    return Err(Error::Frame(format!(
                        "unexpected end of input while discarding an oversize record of {total_len} bytes"
                    )));
                }
                remaining -= got as u64;
            }
            Ok(Parsed::Oversize(total_len))
        } else {
            let start = buf.len();
            buf.resize(total_len as usize, 0);
            let mut filled = start;
            while filled < buf.len() {
                let got = self.reader.read(&mut buf[filled..])?;
                if got == 0 {
                    buf.truncate(filled);
                    return Err(Error::Frame(format!(
                        "unexpected end of input inside record content of {content_length} bytes"
                    )));
                }
                filled += got;
            }
            if &buf[buf.len() - 4..] != b"\r\n\r\n" {
                return Err(Error::Frame("record missing its trailing CRLF CRLF".into()));
            }
            Ok(Parsed::Record)
        }
    }

    /// Framing-fault recovery: scan forward for the next `WARC/1.0`, stash
    /// everything from there on as overhang, and report the gap in `out`.
    fn skip_record(&mut self, out: &mut Record) -> Result<()> {
        const NEEDLE: &[u8] = b"WARC/1.0";
        let mut buf = out.take_body();
        // The failed parse may have moved next-record bytes to the overhang
        // already; scan them too.
        buf.unsplit(mem::take(&mut self.overhang));
        let mut discarded: u64 = 0;
        // Start one byte in so the scan cannot rematch the failed header.
        if !buf.is_empty() {
            buf.advance(1);
            discarded += 1;
        }
        loop {
            if let Some(at) = find(&buf, NEEDLE) {
                discarded += at as u64;
                buf.advance(at);
                self.overhang = buf;
                out.skipped = discarded;
                warn!(skipped = discarded, "resynchronized to the next record header");
                return Ok(());
            }
            // Keep a tail in case the header spans this refill.
            let keep = (NEEDLE.len() - 1).min(buf.len());
            let dropped = buf.len() - keep;
            buf.advance(dropped);
            discarded += dropped as u64;
            let had = buf.len();
            buf.resize(had + SCAN_REFILL, 0);
            let got = match self.reader.read(&mut buf[had..]) {
                Ok(got) => got,
                Err(e) if e.is_decode_fault() => {
                    warn!(error = %e, "decode fault during header scan; resynchronizing");
                    discarded += had as u64;
                    discarded += self.skip_section()?;
                    out.skipped = discarded;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            buf.truncate(had + got);
            if got == 0 {
                discarded += buf.len() as u64;
                out.skipped = discarded;
                warn!(skipped = discarded, "input ended during header scan");
                return Ok(());
            }
        }
    }

    /// Decode-fault recovery: jump by offset index when available, scan for
    /// member magic otherwise.
    fn skip_section(&mut self) -> Result<u64> {
        if self.offsets.is_empty() {
            self.reader.skip()
        } else {
            self.reader.skip_to(&self.offsets)
        }
    }
}

/// Line scanner over the scratch buffer, refilling from the reader
struct HeaderCursor {
    /// Bytes of the buffer consumed by whole lines so far
    consumed: usize,
}

impl HeaderCursor {
    /// Next `\n`-terminated line as a `(start, end)` range into `buf`, with
    /// any trailing `\r` excluded. `None` means clean end of input before
    /// any data.
    fn line(
        &mut self,
        reader: &mut CompressedReader,
        buf: &mut BytesMut,
    ) -> Result<Option<(usize, usize)>> {
        let start = self.consumed;
        let mut search_from = start;
        loop {
            if let Some(at) = buf[search_from..].iter().position(|&b| b == b'\n') {
                let newline = search_from + at;
                let mut end = newline;
                if end > start && buf[end - 1] == b'\r' {
                    end -= 1;
                }
                self.consumed = newline + 1;
                return Ok(Some((start, end)));
            }
            search_from = buf.len();
            if !read_more(reader, buf)? {
                return Ok(None);
            }
        }
    }
}

/// Pull another chunk into the scratch buffer. Clean end of input with an
/// empty buffer returns `Ok(false)`; end of input with partial data is a
/// framing fault.
fn read_more(reader: &mut CompressedReader, buf: &mut BytesMut) -> Result<bool> {
    let had = buf.len();
    buf.resize(had + LINE_REFILL, 0);
    let got = reader.read(&mut buf[had..])?;
    buf.truncate(had + got);
    if got == 0 {
        if had > 0 {
            return Err(Error::Frame(
                "unexpected end of input inside a record header".into(),
            ));
        }
        return Ok(false);
    }
    Ok(true)
}

fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}
