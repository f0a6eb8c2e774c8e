//! CompressedReader - Transparent Decompression with Member Chaining
//!
//! This module implements `CompressedReader`, which turns a source of
//! concatenated gzip/bzip2/xz/uncompressed members into one continuous
//! decoded byte stream.
//!
//! ## What Does CompressedReader Do?
//!
//! 1. **Probes the magic bytes** of the source to pick a codec (or none)
//! 2. **Streams each member** through its backend with a 16 KiB input buffer
//! 3. **Chains members**: when a member ends with input left over, the next
//!    member is detected and decoding continues seamlessly
//! 4. **Counts raw input**: `raw_bytes_read()` is the position in the
//!    *compressed* source, which the offset index refers to
//! 5. **Resynchronizes** past corrupt members, either by scanning for the
//!    next codec magic (`skip`) or by jumping to a known member start from a
//!    sidecar index (`skip_to`)
//!
//! ## Reader States
//!
//! The reader is a tagged state machine; exactly one state is active and
//! transitions replace it in place:
//!
//! ```text
//! Complete                 all members drained; read returns 0
//! Uncompressed             plain pass-through from the source
//! UncompressedWithHeader   replays probed bytes, then becomes Uncompressed
//! Streaming                a codec backend plus the shared input buffer
//! Faulted                  a decode fault was reported; only skip/skip_to
//!                          may follow
//! ```
//!
//! A member ending mid-`read` triggers the next member's detection
//! immediately. If that produced no output yet, the call is delegated to the
//! successor so callers never mistake a member boundary for end of input.
//!
//! In a chained-member position, uncompressed data is an error rather than a
//! silent switch to pass-through; that is how truncated multi-member files
//! get caught.
//!
//! ## Resynchronization
//!
//! `skip` steps one byte past the fault, then scans buffered input (refilling
//! as needed, keeping an 8-byte tail so a signature spanning two reads is
//! still found) for the next gzip/bzip2/xz magic and restarts detection
//! there. The returned count of skipped source bytes is approximate: rescanned
//! tail bytes can be counted twice.
//!
//! `skip_to` instead jumps to the first sidecar offset past the current
//! source position, seeking within the buffer when possible and otherwise
//! reading and discarding.
//!
//! ## Thread Safety
//!
//! CompressedReader is NOT thread-safe; give each thread its own reader.

use std::io::Read;
use std::mem;
use std::path::Path;

use tracing::debug;
use warcmill_core::{Error, Result};

use crate::backend::{detect_codec, Backend, StepOutcome, BZIP2_MAGIC, GZIP_MAGIC, MAGIC_LEN, XZ_MAGIC};

/// Size of the shared input buffer between the source and a backend.
const INPUT_BUFFER: usize = 16 * 1024;

/// Bytes retained across refills while scanning for a magic sequence.
const SCAN_TAIL: usize = 8;

/// The byte source a reader decodes from.
pub type Source = Box<dyn Read + Send>;

/// Reads a stream of concatenated compressed members as decoded bytes
pub struct CompressedReader {
    state: State,
    raw_read: u64,
}

enum State {
    /// All input consumed
    Complete,
    /// Pass-through of an uncompressed source
    Uncompressed(Source),
    /// Replay probed bytes that turned out to be uncompressed, then
    /// hand the source to `Uncompressed`
    UncompressedWithHeader {
        prefix: Vec<u8>,
        pos: usize,
        source: Source,
    },
    /// Actively decoding one compressed member
    Streaming(Box<Streaming>),
    /// A decode fault was surfaced; holds the input so `skip`/`skip_to`
    /// can still move forward
    Faulted(MemberInput),
}

struct Streaming {
    input: MemberInput,
    backend: Backend,
    /// Raw source position where this member's magic begins
    member_start: u64,
    /// Whether this member has decoded any output yet; a member that faults
    /// before producing anything is counted as skipped from its start
    produced_any: bool,
}

/// The source plus the 16 KiB input buffer shared across member transitions
struct MemberInput {
    source: Source,
    buf: Vec<u8>,
    /// `buf[pos..]` is unconsumed input
    pos: usize,
    /// The source returned 0 on its last read
    eof: bool,
}

enum ReadStep {
    Produced(usize),
    MemberEnd { produced: usize },
}

enum NextMember {
    State(State),
    /// Detection failed in a position that required a compressed member
    NotCompressed(MemberInput),
}

impl MemberInput {
    fn fresh(source: Source) -> Self {
        Self {
            source,
            buf: Vec::with_capacity(INPUT_BUFFER),
            pos: 0,
            eof: false,
        }
    }

    fn unconsumed(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn consume(&mut self, n: usize) {
        self.pos += n;
        debug_assert!(self.pos <= self.buf.len());
    }

    /// Replace the (fully consumed) buffer with a fresh read from the source.
    fn refill(&mut self, raw_read: &mut u64) -> Result<usize> {
        debug_assert!(self.unconsumed().is_empty());
        self.buf.resize(INPUT_BUFFER, 0);
        let got = self.source.read(&mut self.buf)?;
        self.buf.truncate(got);
        self.pos = 0;
        *raw_read += got as u64;
        if got == 0 {
            self.eof = true;
        }
        Ok(got)
    }

    /// Refill, but first move the last `tail` bytes of the old buffer to the
    /// front so a magic sequence spanning two reads can still match.
    fn refill_keeping_tail(&mut self, tail: usize, raw_read: &mut u64) -> Result<usize> {
        debug_assert!(self.unconsumed().is_empty());
        let keep = tail.min(self.buf.len());
        let start = self.buf.len() - keep;
        self.buf.copy_within(start.., 0);
        self.buf.resize(INPUT_BUFFER, 0);
        let got = self.source.read(&mut self.buf[keep..])?;
        self.buf.truncate(keep + got);
        self.pos = 0;
        *raw_read += got as u64;
        if got == 0 {
            self.eof = true;
        }
        Ok(got)
    }

    /// Read more behind the unconsumed bytes without discarding them.
    fn top_off(&mut self, raw_read: &mut u64) -> Result<usize> {
        if self.eof {
            return Ok(0);
        }
        if self.pos > 0 {
            self.buf.copy_within(self.pos.., 0);
            let len = self.buf.len() - self.pos;
            self.buf.truncate(len);
            self.pos = 0;
        }
        let have = self.buf.len();
        self.buf.resize(INPUT_BUFFER, 0);
        let got = self.source.read(&mut self.buf[have..])?;
        self.buf.truncate(have + got);
        *raw_read += got as u64;
        if got == 0 {
            self.eof = true;
        }
        Ok(got)
    }

    /// Read and throw away source bytes until `raw_read` reaches `target`
    /// (or the source ends).
    fn discard_until(&mut self, target: u64, raw_read: &mut u64) -> Result<()> {
        debug_assert!(self.unconsumed().is_empty());
        self.buf.clear();
        self.pos = 0;
        while *raw_read < target && !self.eof {
            let want = INPUT_BUFFER.min((target - *raw_read) as usize);
            self.buf.resize(want, 0);
            let got = self.source.read(&mut self.buf)?;
            *raw_read += got as u64;
            if got == 0 {
                self.eof = true;
            }
        }
        self.buf.clear();
        self.pos = 0;
        Ok(())
    }
}

impl Streaming {
    /// Decode into `dst` until something is produced or the member ends.
    fn read_step(&mut self, dst: &mut [u8], raw_read: &mut u64) -> Result<ReadStep> {
        let mut produced_total = 0;
        loop {
            if self.input.unconsumed().is_empty() && !self.input.eof {
                self.input.refill(raw_read)?;
            }
            let input_done = self.input.eof && self.input.unconsumed().is_empty();
            let (consumed, produced, outcome) = self.backend.step(
                self.input.unconsumed(),
                &mut dst[produced_total..],
                input_done,
            )?;
            self.input.consume(consumed);
            produced_total += produced;
            if produced > 0 {
                self.produced_any = true;
            }
            match outcome {
                StepOutcome::MemberEnd => {
                    return Ok(ReadStep::MemberEnd {
                        produced: produced_total,
                    })
                }
                StepOutcome::MoreWanted => {
                    if produced_total > 0 {
                        return Ok(ReadStep::Produced(produced_total));
                    }
                    if input_done && consumed == 0 && produced == 0 {
                        return Err(Error::Corrupt(format!(
                            "unexpected end of input inside a {} member",
                            self.backend.codec().name()
                        )));
                    }
                }
            }
        }
    }
}

/// Probe the next member's magic and build the matching reader state.
///
/// `require_compressed` is set for every member after the first; finding
/// uncompressed bytes there usually means a truncated multi-member file, so
/// it is reported instead of silently switching to pass-through.
fn make_member(
    mut input: MemberInput,
    require_compressed: bool,
    raw_read: &mut u64,
) -> Result<NextMember> {
    while input.unconsumed().len() < MAGIC_LEN && !input.eof {
        input.top_off(raw_read)?;
    }
    let head = input.unconsumed();
    if head.is_empty() {
        return Ok(NextMember::State(State::Complete));
    }
    match detect_codec(head) {
        Some(codec) => {
            let member_start = *raw_read - head.len() as u64;
            debug!(codec = codec.name(), offset = member_start, "starting member");
            let backend = Backend::new(codec)?;
            Ok(NextMember::State(State::Streaming(Box::new(Streaming {
                input,
                backend,
                member_start,
                produced_any: false,
            }))))
        }
        None if require_compressed => Ok(NextMember::NotCompressed(input)),
        None => {
            let prefix = input.unconsumed().to_vec();
            Ok(NextMember::State(State::UncompressedWithHeader {
                prefix,
                pos: 0,
                source: input.source,
            }))
        }
    }
}

/// Earliest offset in `hay` where any member magic begins.
fn find_member_magic(hay: &[u8]) -> Option<usize> {
    (0..hay.len()).find(|&i| {
        let rest = &hay[i..];
        rest.starts_with(&GZIP_MAGIC)
            || rest.starts_with(&BZIP2_MAGIC)
            || rest.starts_with(&XZ_MAGIC)
    })
}

impl CompressedReader {
    /// Build a reader over any byte source, probing its magic immediately.
    pub fn new<R: Read + Send + 'static>(source: R) -> Result<Self> {
        Self::from_source(Box::new(source))
    }

    /// Build a reader over an already-boxed source.
    pub fn from_source(source: Source) -> Result<Self> {
        let mut raw_read = 0u64;
        let input = MemberInput::fresh(source);
        let state = match make_member(input, false, &mut raw_read)? {
            NextMember::State(state) => state,
            // Only chained members require compression.
            NextMember::NotCompressed(input) => State::Faulted(input),
        };
        Ok(Self { state, raw_read })
    }

    /// Open a file and build a reader over it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(std::fs::File::open(path)?)
    }

    /// Total raw source bytes consumed so far. This is a position in the
    /// compressed stream, the same coordinate space as an offset index.
    pub fn raw_bytes_read(&self) -> u64 {
        self.raw_read
    }

    /// Read up to `dst.len()` decoded bytes. Returns 0 only at the end of
    /// all chained members.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        loop {
            match &mut self.state {
                State::Complete => return Ok(0),
                State::Uncompressed(source) => {
                    let got = source.read(dst)?;
                    self.raw_read += got as u64;
                    return Ok(got);
                }
                State::UncompressedWithHeader { prefix, pos, .. } => {
                    let remain = prefix.len() - *pos;
                    let n = remain.min(dst.len());
                    dst[..n].copy_from_slice(&prefix[*pos..*pos + n]);
                    *pos += n;
                    let drained = *pos == prefix.len();
                    if drained {
                        if let State::UncompressedWithHeader { source, .. } =
                            mem::replace(&mut self.state, State::Complete)
                        {
                            self.state = State::Uncompressed(source);
                        }
                    }
                    return Ok(n);
                }
                State::Streaming(streaming) => {
                    let step = streaming.read_step(dst, &mut self.raw_read)?;
                    match step {
                        ReadStep::Produced(n) => return Ok(n),
                        ReadStep::MemberEnd { produced } => {
                            let input = match mem::replace(&mut self.state, State::Complete) {
                                State::Streaming(s) => s.input,
                                _ => unreachable!("state checked above"),
                            };
                            match make_member(input, true, &mut self.raw_read)? {
                                NextMember::State(state) => self.state = state,
                                NextMember::NotCompressed(input) => {
                                    self.state = State::Faulted(input);
                                    return Err(Error::Corrupt(
                                        "uncompressed data after a compressed member".into(),
                                    ));
                                }
                            }
                            if produced > 0 {
                                return Ok(produced);
                            }
                            // Nothing was produced this call; delegate to the
                            // successor so callers don't mistake a member
                            // boundary for end of input.
                        }
                    }
                }
                State::Faulted(_) => {
                    return Err(Error::Corrupt(
                        "reader is faulted; resynchronize with skip or skip_to".into(),
                    ))
                }
            }
        }
    }

    /// `read` until `dst` is full or the stream ends. Returns bytes filled.
    pub fn read_or_eof(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            let got = self.read(&mut dst[filled..])?;
            if got == 0 {
                break;
            }
            filled += got;
        }
        Ok(filled)
    }

    /// Recover from a decode fault by scanning forward for the next member
    /// magic and restarting detection there. Returns the (approximate) count
    /// of source bytes passed over.
    pub fn skip(&mut self) -> Result<u64> {
        let (mut input, member_start) = match mem::replace(&mut self.state, State::Complete) {
            State::Streaming(s) => {
                let start = (!s.produced_any).then_some(s.member_start);
                (s.input, start)
            }
            State::Faulted(input) => (input, None),
            other => {
                self.state = other;
                return Err(Error::Corrupt(
                    "cannot resynchronize an uncompressed stream".into(),
                ));
            }
        };
        // A member that never produced output is discarded whole: bytes its
        // failed decode consumed count as skipped too.
        let pos = self.raw_read - input.unconsumed().len() as u64;
        let mut skipped: u64 = match member_start {
            Some(start) => pos - start,
            None => 0,
        };
        // Step past the fault position so a magic sequence right under the
        // cursor cannot loop without making progress.
        if !input.unconsumed().is_empty() {
            input.consume(1);
            skipped += 1;
        }
        loop {
            let hay = input.unconsumed();
            if hay.is_empty() {
                if input.eof {
                    break;
                }
                input.refill(&mut self.raw_read)?;
                continue;
            }
            match find_member_magic(hay) {
                Some(offset) => {
                    skipped += offset as u64;
                    input.consume(offset);
                    break;
                }
                None => {
                    let len = hay.len();
                    skipped += len as u64;
                    input.consume(len);
                    if input.eof {
                        break;
                    }
                    // Retained tail bytes get rescanned and recounted.
                    input.refill_keeping_tail(SCAN_TAIL, &mut self.raw_read)?;
                }
            }
        }
        debug!(skipped, "resynchronized by magic scan");
        self.install_member(input)?;
        Ok(skipped)
    }

    /// Seek to the first offset in `offsets` past the current source
    /// position and restart member detection there. Offsets index the raw
    /// compressed stream.
    pub fn skip_to(&mut self, offsets: &[u64]) -> Result<u64> {
        let mut input = match mem::replace(&mut self.state, State::Complete) {
            State::Streaming(s) => s.input,
            State::Faulted(input) => input,
            other => {
                self.state = other;
                return Err(Error::Corrupt(
                    "cannot resynchronize an uncompressed stream".into(),
                ));
            }
        };
        let pos = self.raw_read - input.unconsumed().len() as u64;
        let Some(target) = offsets.iter().copied().find(|&o| o > pos) else {
            self.state = State::Faulted(input);
            return Err(Error::Corrupt(format!(
                "no jump target beyond {pos} in the offset index"
            )));
        };
        if target < self.raw_read {
            // The target is already inside the input buffer.
            input.consume((target - pos) as usize);
        } else {
            let len = input.unconsumed().len();
            input.consume(len);
            input.discard_until(target, &mut self.raw_read)?;
        }
        let new_pos = self.raw_read - input.unconsumed().len() as u64;
        debug!(from = pos, to = new_pos, "resynchronized by offset index");
        self.install_member(input)?;
        Ok(new_pos - pos)
    }

    fn install_member(&mut self, input: MemberInput) -> Result<()> {
        match make_member(input, true, &mut self.raw_read)? {
            NextMember::State(state) => {
                self.state = state;
                Ok(())
            }
            NextMember::NotCompressed(input) => {
                self.state = State::Faulted(input);
                Err(Error::Corrupt(
                    "resynchronization target is not a compressed member".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    // ---------------------------------------------------------------
    // Fixture helpers
    // ---------------------------------------------------------------

    fn gz(data: &[u8]) -> Vec<u8> {
        let mut enc =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn bz(data: &[u8]) -> Vec<u8> {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut enc = xz2::write::XzEncoder::new(Vec::new(), 6);
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn reader(bytes: Vec<u8>) -> CompressedReader {
        CompressedReader::new(Cursor::new(bytes)).unwrap()
    }

    fn read_all(reader: &mut CompressedReader) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 113];
        loop {
            let got = reader.read(&mut chunk).unwrap();
            if got == 0 {
                return out;
            }
            out.extend_from_slice(&chunk[..got]);
        }
    }

    /// Deterministic incompressible-ish bytes so members exceed the input
    /// buffer when needed.
    fn noise(len: usize) -> Vec<u8> {
        let mut state: u64 = 0x9e3779b97f4a7c15;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 32) as u8
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Pass-through and detection
    // ---------------------------------------------------------------

    #[test]
    fn test_uncompressed_passthrough() {
        let mut r = reader(b"hello plain world".to_vec());
        assert_eq!(read_all(&mut r), b"hello plain world");
        assert_eq!(r.raw_bytes_read(), 17);
    }

    #[test]
    fn test_short_uncompressed_input() {
        // Shorter than the magic probe
        let mut r = reader(b"abc".to_vec());
        assert_eq!(read_all(&mut r), b"abc");
    }

    #[test]
    fn test_empty_input_is_complete() {
        let mut r = reader(Vec::new());
        let mut chunk = [0u8; 8];
        assert_eq!(r.read(&mut chunk).unwrap(), 0);
        assert_eq!(r.read(&mut chunk).unwrap(), 0);
    }

    #[test]
    fn test_single_gzip_member() {
        let payload = b"gzip payload".repeat(100);
        let mut r = reader(gz(&payload));
        assert_eq!(read_all(&mut r), payload);
    }

    #[test]
    fn test_single_bzip2_member() {
        let payload = b"bzip2 payload".repeat(100);
        let mut r = reader(bz(&payload));
        assert_eq!(read_all(&mut r), payload);
    }

    #[test]
    fn test_single_xz_member() {
        let payload = b"xz payload".repeat(100);
        let mut r = reader(xz(&payload));
        assert_eq!(read_all(&mut r), payload);
    }

    // ---------------------------------------------------------------
    // Member chaining
    // ---------------------------------------------------------------

    #[test]
    fn test_concatenated_gzip_members() {
        let mut data = gz(b"first ");
        data.extend_from_slice(&gz(b"second"));
        let mut r = reader(data);
        assert_eq!(read_all(&mut r), b"first second");
    }

    #[test]
    fn test_mixed_codec_chain() {
        let mut data = gz(b"one ");
        data.extend_from_slice(&bz(b"two "));
        data.extend_from_slice(&xz(b"three "));
        data.extend_from_slice(&gz(b"four"));
        let mut r = reader(data);
        assert_eq!(read_all(&mut r), b"one two three four");
    }

    #[test]
    fn test_large_chain_is_byte_exact() {
        let a = noise(50_000);
        let b = noise(70_000);
        let mut data = gz(&a);
        data.extend_from_slice(&xz(&b));
        let mut r = reader(data);
        let mut expected = a;
        expected.extend_from_slice(&b);
        assert_eq!(read_all(&mut r), expected);
    }

    #[test]
    fn test_raw_bytes_read_tracks_source() {
        let data = gz(&noise(40_000));
        let total = data.len() as u64;
        let mut r = reader(data);
        read_all(&mut r);
        assert_eq!(r.raw_bytes_read(), total);
    }

    // ---------------------------------------------------------------
    // Chained-member error cases
    // ---------------------------------------------------------------

    #[test]
    fn test_uncompressed_after_member_faults() {
        let mut data = gz(b"good");
        data.extend_from_slice(b"this is definitely not compressed");
        let mut r = reader(data);
        let mut collected = Vec::new();
        let mut chunk = [0u8; 64];
        let err = loop {
            match r.read(&mut chunk) {
                Ok(0) => panic!("expected a decode fault, got clean EOF"),
                Ok(n) => collected.extend_from_slice(&chunk[..n]),
                Err(e) => break e,
            }
        };
        assert!(err.is_decode_fault(), "got {err}");
        assert!(b"good".starts_with(collected.as_slice()));
    }

    #[test]
    fn test_truncated_second_member_faults() {
        let mut data = gz(b"complete");
        let second = gz(b"cut short");
        data.extend_from_slice(&second[..second.len() / 2]);
        let mut r = reader(data);
        let mut chunk = [0u8; 256];
        let err = loop {
            match r.read(&mut chunk) {
                Ok(0) => panic!("expected a decode fault, got clean EOF"),
                Ok(_) => {}
                Err(e) => break e,
            }
        };
        assert!(err.is_decode_fault(), "got {err}");
    }

    #[test]
    fn test_read_after_fault_stays_faulted() {
        let mut data = gz(b"good");
        data.extend_from_slice(b"garbage garbage garbage");
        let mut r = reader(data);
        let mut chunk = [0u8; 64];
        while r.read(&mut chunk).is_ok() {}
        assert!(r.read(&mut chunk).is_err());
    }

    // ---------------------------------------------------------------
    // skip: magic-scan resynchronization
    // ---------------------------------------------------------------

    #[test]
    fn test_skip_finds_next_xz_member() {
        let mut data = gz(b"before");
        data.extend_from_slice(b"################ filler without magic ################");
        let garbage_len = data.len() - gz(b"before").len();
        data.extend_from_slice(&xz(b"after"));
        let mut r = reader(data);
        let mut chunk = [0u8; 64];
        // Drain until the fault from the garbage section.
        let err = loop {
            match r.read(&mut chunk) {
                Ok(0) => panic!("expected fault"),
                Ok(_) => {}
                Err(e) => break e,
            }
        };
        assert!(err.is_decode_fault());
        let skipped = r.skip().unwrap();
        assert!(skipped >= garbage_len as u64 - 1, "skipped {skipped}");
        assert_eq!(read_all(&mut r), b"after");
    }

    #[test]
    fn test_skip_finds_next_gzip_member() {
        // A flipped magic byte makes the middle member undetectable; the
        // scan must land on the third (gzip) member.
        let first = gz(b"first");
        let mut middle = gz(b"middle");
        middle[1] ^= 0xff;
        let last = gz(b"last");

        let mut data = first.clone();
        data.extend_from_slice(&middle);
        data.extend_from_slice(&last);
        let mut r = reader(data);

        let mut chunk = [0u8; 64];
        let mut collected = Vec::new();
        let mut total_skipped = 0u64;
        let mut faults = 0;
        loop {
            match r.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => collected.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    assert!(e.is_decode_fault(), "got {e}");
                    faults += 1;
                    assert!(faults < 100, "resynchronization is not converging");
                    total_skipped += r.skip().unwrap();
                }
            }
        }
        assert!(String::from_utf8_lossy(&collected).contains("last"));
        assert!(
            total_skipped >= middle.len() as u64,
            "skipped {total_skipped} < {}",
            middle.len()
        );
    }

    #[test]
    fn test_skip_at_eof_reaches_complete() {
        let mut data = gz(b"only");
        data.extend_from_slice(b"trailing junk with no member after it");
        let mut r = reader(data);
        let mut chunk = [0u8; 64];
        while r.read(&mut chunk).is_ok() {}
        let skipped = r.skip().unwrap();
        assert!(skipped > 0);
        assert_eq!(r.read(&mut chunk).unwrap(), 0);
    }

    #[test]
    fn test_skip_on_uncompressed_is_error() {
        let mut r = reader(b"plain old text here".to_vec());
        assert!(r.skip().is_err());
    }

    // ---------------------------------------------------------------
    // skip_to: offset-index resynchronization
    // ---------------------------------------------------------------

    #[test]
    fn test_skip_to_within_buffer() {
        let first = gz(b"first member ");
        let second = gz(b"second member");
        let offsets = vec![first.len() as u64];
        let mut data = first;
        data.extend_from_slice(&second);
        let mut r = reader(data);

        // Pull one decoded byte so the member is mid-stream.
        let mut one = [0u8; 1];
        assert_eq!(r.read(&mut one).unwrap(), 1);

        let skipped = r.skip_to(&offsets).unwrap();
        assert!(skipped > 0);
        assert_eq!(read_all(&mut r), b"second member");
    }

    #[test]
    fn test_skip_to_beyond_buffer() {
        // First member larger than the 16 KiB input buffer forces the
        // read-and-discard path.
        let first = gz(&noise(60_000));
        let second = gz(b"tail member");
        let boundary = first.len() as u64;
        let offsets = vec![boundary];
        let mut data = first;
        data.extend_from_slice(&second);
        let mut r = reader(data);

        let mut one = [0u8; 1];
        assert_eq!(r.read(&mut one).unwrap(), 1);
        let pos = r.raw_bytes_read()
            - match &r.state {
                State::Streaming(s) => s.input.unconsumed().len() as u64,
                _ => 0,
            };
        let skipped = r.skip_to(&offsets).unwrap();
        assert_eq!(skipped, boundary - pos);
        assert_eq!(read_all(&mut r), b"tail member");
    }

    #[test]
    fn test_skip_to_without_target_is_error() {
        let mut data = gz(b"alpha");
        data.extend_from_slice(&gz(b"beta"));
        let mut r = reader(data);
        let mut one = [0u8; 1];
        r.read(&mut one).unwrap();
        // Every offset is at or before the current position.
        let err = r.skip_to(&[0]).unwrap_err();
        assert!(err.is_decode_fault(), "got {err}");
    }

    // ---------------------------------------------------------------
    // read_or_eof
    // ---------------------------------------------------------------

    #[test]
    fn test_read_or_eof_fills_exactly() {
        let payload = b"0123456789".repeat(10);
        let mut r = reader(gz(&payload));
        let mut dst = vec![0u8; 40];
        assert_eq!(r.read_or_eof(&mut dst).unwrap(), 40);
        assert_eq!(&dst, &payload[..40]);
    }

    #[test]
    fn test_read_or_eof_stops_at_end() {
        let mut r = reader(gz(b"short"));
        let mut dst = vec![0u8; 64];
        assert_eq!(r.read_or_eof(&mut dst).unwrap(), 5);
        assert_eq!(&dst[..5], b"short");
    }
}
