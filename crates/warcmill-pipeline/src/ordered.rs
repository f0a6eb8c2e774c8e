//! Ordered Line-Parallel Variant
//!
//! Fans *lines* out to the same kind of child pool as the WARC driver, but
//! reassembles the output in input order. Every line gets a single-use
//! response slot; slots enter a global queue in input order, workers fill
//! them as they finish, and one writer drains the queue front to back, so
//! output order always matches input order regardless of which worker was
//! fastest.
//!
//! ```text
//! input ──▶ bounded task queue ──▶ worker stdin ─▶ child ─▶ worker stdout
//!    │                                  │ (slot sender follows the line)
//!    └──▶ in-order slot queue ──────────┴──────▶ writer ──▶ output
//! ```
//!
//! Children are assumed line-deterministic: one output line per input line,
//! in order, the way `cat`, `sed`, or a per-line scorer behaves.

use std::io::{BufRead, BufReader, Write};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::error;
use warcmill_core::{Error, Result};

use crate::pool::reap_children;
use crate::worker::launch;

struct Task {
    line: String,
    respond: Sender<String>,
}

/// Run `command` in `workers` child processes over the lines of `input`,
/// writing their outputs to `output` in input order.
pub fn run<R, W>(workers: usize, input: R, output: W, command: &[String]) -> Result<()>
where
    R: BufRead,
    W: Write + Send,
{
    let workers = workers.max(1);
    let (task_tx, task_rx) = bounded::<Task>(workers);
    let (slot_tx, slot_rx) = unbounded::<Receiver<String>>();

    let mut children = Vec::with_capacity(workers);
    let mut io_threads = Vec::with_capacity(workers * 2);
    for n in 0..workers {
        let (child, stdin, stdout) = launch(command)?;
        children.push(child);

        let tasks = task_rx.clone();
        let (pending_tx, pending_rx) = unbounded::<Sender<String>>();
        io_threads.push(
            thread::Builder::new()
                .name(format!("line-in-{n}"))
                .spawn(move || {
                    let mut stdin = stdin;
                    while let Ok(task) = tasks.recv() {
                        if let Err(e) = writeln!(stdin, "{}", task.line) {
                            error!(error = %e, "failed writing a line to a child");
                            return;
                        }
                        if pending_tx.send(task.respond).is_err() {
                            return;
                        }
                    }
                    // Dropping stdin closes the child's input.
                })?,
        );
        io_threads.push(
            thread::Builder::new()
                .name(format!("line-out-{n}"))
                .spawn(move || {
                    let mut lines = BufReader::new(stdout);
                    while let Ok(respond) = pending_rx.recv() {
                        let mut line = String::new();
                        match lines.read_line(&mut line) {
                            Ok(0) => {
                                error!("child closed its output with lines still pending");
                                return;
                            }
                            Ok(_) => {
                                if line.ends_with('\n') {
                                    line.pop();
                                }
                                if respond.send(line).is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                error!(error = %e, "failed reading a line from a child");
                                return;
                            }
                        }
                    }
                })?,
        );
    }
    drop(task_rx);

    let reaper = thread::Builder::new()
        .name("line-reaper".into())
        .spawn(move || reap_children(children))?;

    thread::scope(|scope| -> Result<()> {
        let writer = scope.spawn(move || -> Result<()> {
            let mut output = output;
            for slot in slot_rx.iter() {
                let line = slot
                    .recv()
                    .map_err(|_| Error::Child("a worker dropped a pending line".into()))?;
                output.write_all(line.as_bytes())?;
                output.write_all(b"\n")?;
            }
            output.flush()?;
            Ok(())
        });

        for line in input.lines() {
            let line = line?;
            let (respond, slot) = bounded::<String>(1);
            if slot_tx.send(slot).is_err() {
                break;
            }
            task_tx
                .send(Task { line, respond })
                .map_err(|_| Error::Child("task queue closed unexpectedly".into()))?;
        }
        drop(task_tx);
        drop(slot_tx);
        writer
            .join()
            .map_err(|_| Error::Child("the ordered writer panicked".into()))?
    })?;

    for handle in io_threads {
        handle
            .join()
            .map_err(|_| Error::Child("a worker I/O thread panicked".into()))?;
    }
    reaper
        .join()
        .map_err(|_| Error::Child("the child reaper panicked".into()))?;
    Ok(())
}
