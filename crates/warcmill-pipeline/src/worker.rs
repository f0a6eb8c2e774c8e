//! Per-Worker Child I/O
//!
//! Each worker is one child process plus two threads: one feeding records
//! from the shared queue into the child's stdin, one parsing the child's
//! stdout back into records and writing them to the shared sink.
//!
//! The input side treats an empty record as a poison pill: it closes the
//! child's stdin (by dropping it) so the child sees EOF and exits. The
//! output side runs until the child closes its stdout.
//!
//! `read_input` is the producer end: it parses one input file (or stdin)
//! and pushes every non-empty record onto the queue. Skip records are
//! dropped here; the gap was already logged when it was detected.

use std::io::Write;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use bytes::BytesMut;
use crossbeam_channel::{Receiver, Sender};
use flate2::Compression;
use tracing::{debug, error};
use warcmill_codec::gz_compress;
use warcmill_core::{Error, Record, Result};
use warcmill_warc::WarcReader;

use crate::Sink;

/// Input records longer than this are skipped rather than queued.
pub const INPUT_SIZE_LIMIT: u64 = 20 * 1024 * 1024;

/// Spawn the child command with piped stdin/stdout and take both pipes.
pub(crate) fn launch(command: &[String]) -> Result<(Child, ChildStdin, ChildStdout)> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| Error::Child("no child command given".into()))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Child(format!("failed to launch `{program}`: {e}")))?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::Child("child has no stdin pipe".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Child("child has no stdout pipe".into()))?;
    Ok((child, stdin, stdout))
}

/// Pop records off the queue and write them raw to the child. An empty
/// record is the shutdown signal; returning drops (closes) the stdin pipe.
pub(crate) fn input_to_child(records: Receiver<BytesMut>, mut stdin: ChildStdin) {
    while let Ok(body) = records.recv() {
        if body.is_empty() {
            return;
        }
        if let Err(e) = stdin.write_all(&body) {
            // Usually the child exited early; the reaper decides whether
            // that is fatal.
            error!(error = %e, "failed writing a record to a child");
            return;
        }
    }
}

/// Parse the child's stdout as WARC and write each record, optionally as
/// its own gzip member, to the shared sink.
pub(crate) fn output_from_child(stdout: ChildStdout, sink: Sink, compress: bool) {
    let mut reader = match WarcReader::from_source(Box::new(stdout)) {
        Ok(reader) => reader,
        Err(e) => {
            error!(error = %e, "failed opening a child's output");
            return;
        }
    };
    let mut record = Record::new();
    let mut encoded = Vec::new();
    loop {
        match reader.read(&mut record, u64::MAX) {
            Ok(true) => {
                if record.body.is_empty() {
                    continue;
                }
                let payload: &[u8] = if compress {
                    if let Err(e) = gz_compress(&record.body, &mut encoded, Compression::default())
                    {
                        error!(error = %e, "failed gzip-encoding an output record");
                        std::process::abort();
                    }
                    &encoded
                } else {
                    &record.body
                };
                let mut out = match sink.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Err(e) = out.write_all(payload) {
                    // The sink is shared by every worker; a failed write
                    // means output is already lost.
                    error!(error = %e, "failed writing to the output sink");
                    std::process::abort();
                }
            }
            Ok(false) => return,
            Err(e) => {
                error!(error = %e, "unrecoverable error reading a child's output");
                return;
            }
        }
    }
}

/// Parse one input and push its records onto the queue. Does not poison the
/// queue; the pool does that once every input is drained.
pub fn read_input(mut reader: WarcReader, label: &str, records: &Sender<BytesMut>) {
    let mut record = Record::new();
    loop {
        match reader.read(&mut record, INPUT_SIZE_LIMIT) {
            Ok(true) => {
                if record.body.is_empty() {
                    debug!(input = label, skipped = record.skipped, "dropped a skip record");
                    continue;
                }
                if records.send(record.take_body()).is_err() {
                    return; // the pool went away
                }
            }
            Ok(false) => return,
            Err(e) => {
                error!(input = label, error = %e, "failed reading input");
                return;
            }
        }
    }
}
