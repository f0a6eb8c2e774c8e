//! Worker Pool
//!
//! Owns the bounded record queue, the per-worker I/O threads, and the child
//! reaper.
//!
//! ## Lifecycle
//!
//! 1. `new` launches one child per worker and spawns its two I/O threads;
//!    the queue capacity equals the worker count, which is all the
//!    back-pressure the readers need.
//! 2. Producers push records through clones of `sender()`.
//! 3. `join` pushes one empty record (poison pill) per worker, then joins
//!    the I/O threads and finally the reaper.
//!
//! ## Failure Policy
//!
//! A child that exits non-zero or dies on a signal aborts the whole
//! process from the reaper thread: the output is already incomplete, and
//! continuing would silently drop records.

use std::process::Child;
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use crossbeam_channel::{bounded, Sender};
use tracing::{debug, error};
use warcmill_core::{Error, Result};

use crate::worker::{input_to_child, launch, output_from_child};
use crate::Sink;

/// A pool of child processes consuming records from a shared queue
pub struct WorkerPool {
    records: Sender<BytesMut>,
    io_threads: Vec<JoinHandle<()>>,
    reaper: JoinHandle<()>,
    workers: usize,
}

impl WorkerPool {
    /// Launch `workers` children running `command` and wire their I/O to
    /// the queue and `sink`.
    pub fn new(workers: usize, sink: Sink, compress: bool, command: &[String]) -> Result<Self> {
        let workers = workers.max(1);
        let (records, queue) = bounded::<BytesMut>(workers);
        let mut children = Vec::with_capacity(workers);
        let mut io_threads = Vec::with_capacity(workers * 2);
        for n in 0..workers {
            let (child, stdin, stdout) = launch(command)?;
            children.push(child);

            let queue = queue.clone();
            io_threads.push(
                thread::Builder::new()
                    .name(format!("child-in-{n}"))
                    .spawn(move || input_to_child(queue, stdin))?,
            );

            let sink = Sink::clone(&sink);
            io_threads.push(
                thread::Builder::new()
                    .name(format!("child-out-{n}"))
                    .spawn(move || output_from_child(stdout, sink, compress))?,
            );
        }
        debug!(workers, "worker pool running");
        let reaper = thread::Builder::new()
            .name("child-reaper".into())
            .spawn(move || reap_children(children))?;
        Ok(Self {
            records,
            io_threads,
            reaper,
            workers,
        })
    }

    /// A producer handle onto the record queue.
    pub fn sender(&self) -> Sender<BytesMut> {
        self.records.clone()
    }

    /// Shut down: poison once per worker, then collect every thread.
    pub fn join(self) -> Result<()> {
        let Self {
            records,
            io_threads,
            reaper,
            workers,
        } = self;
        for _ in 0..workers {
            records
                .send(BytesMut::new())
                .map_err(|_| Error::Child("record queue closed before shutdown".into()))?;
        }
        drop(records);
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
}

/// Wait for every child; any abnormal exit is fatal to the whole process.
pub(crate) fn reap_children(children: Vec<Child>) {
    for mut child in children {
        match child.wait() {
            Ok(status) if status.success() => {}
            Ok(status) => {
                error!(%status, "child process terminated abnormally");
                std::process::abort();
            }
            Err(e) => {
                error!(error = %e, "failed waiting for a child process");
                std::process::abort();
            }
        }
    }
}
