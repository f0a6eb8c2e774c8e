//! Parallel WARC Pipeline
//!
//! Fans records out to a pool of child processes and reassembles their
//! output into one sink.
//!
//! ## Data Flow
//!
//! ```text
//! inputs ── read_input ──▶ bounded record queue ──▶ InputToProcess ─▶ child stdin
//!                                                  OutputFromProcess ◀─ child stdout
//!                                                        │ (optional gzip)
//!                                                        ▼
//!                                             mutex-guarded sink
//!                                        (stdout, a file, or SplitFileStream)
//! ```
//!
//! Ordering: within one worker, strict FIFO; across workers, none. Each
//! record is written atomically under the sink mutex. The [`ordered`] module
//! is the line-based variant that does reassemble global input order.
//!
//! Shutdown is cooperative: one empty record per worker poisons the queue,
//! input threads close child stdins, children see EOF and exit, and a
//! dedicated reaper collects their exit statuses.

use std::io::Write;
use std::sync::{Arc, Mutex};

pub mod ordered;
pub mod pool;
pub mod split;
pub mod worker;

pub use pool::WorkerPool;
pub use split::{NameTemplate, SplitFileStream};
pub use worker::{read_input, INPUT_SIZE_LIMIT};

/// The shared output sink every worker writes to, one record at a time.
pub type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Wrap a writer as a shareable sink.
pub fn sink_from(writer: Box<dyn Write + Send>) -> Sink {
    Arc::new(Mutex::new(writer))
}
