//! warcmill - Parallel WARC Processing Driver
//!
//! Parallelizes WARC-to-WARC processing by piping records through a pool of
//! child processes and reassembling their output.
//!
//! ## Usage
//!
//! ```bash
//! # Run `cat` over a WARC from stdin (a parallel no-op)
//! warcmill cat < crawl.warc.gz > out.warc
//!
//! # Twenty workers running a processing script
//! warcmill -j 20 ./process_warc.sh < crawl.warc.gz
//!
//! # Multiple inputs, gzipped output split into ~1 GiB files
//! warcmill -i a.warc.gz b.warc.xz -z -o out-XXXX -- ./process_warc.sh
//! ```
//!
//! The child command is expected to read WARC records on stdin and write
//! WARC records on stdout. Use `--` to separate driver options from the
//! child command whenever the child's own arguments could be mistaken for
//! driver options.
//!
//! ## Behavior
//!
//! - Inputs are read in parallel and jumbled together; output order across
//!   workers is not defined.
//! - Corrupt compressed members and mangled records are skipped with a
//!   warning on stderr, not fatal.
//! - A child that exits abnormally aborts the whole run.
//! - With `-o` and an `X`-run template, output rolls to a numbered file
//!   before any record that would cross the `--bytes` limit (default
//!   1 GiB); records are never split across files.
//!
//! ## Logging
//!
//! Diagnostics go to stderr via `RUST_LOG` (default `info`):
//!
//! ```bash
//! RUST_LOG=debug warcmill -j 4 ./process_warc.sh < in.warc.gz > out.warc
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use warcmill_pipeline::{
    read_input, sink_from, NameTemplate, Sink, SplitFileStream, WorkerPool,
};
use warcmill_warc::WarcReader;

const DEFAULT_SPLIT_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Parser)]
#[command(
    name = "warcmill",
    version,
    about = "Parallelize WARC-to-WARC processing by wrapping a child process"
)]
struct Cli {
    /// Input WARC files, read in parallel and jumbled together
    /// (default: stdin)
    #[arg(short, long, num_args = 1.., value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Output path; an X-run template (out-XXXX) rolls across numbered
    /// files (default: stdout)
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Number of child process workers
    #[arg(short, long, value_name = "N", default_value_t = num_cpus::get())]
    jobs: usize,

    /// Gzip-encode each output record as an independent member
    #[arg(short = 'z', long)]
    gzip: bool,

    /// Split output after this many bytes; requires an output template
    /// with X characters [default: 1 GiB]
    #[arg(short, long, value_name = "N")]
    bytes: Option<u64>,

    /// Child command reading WARC on stdin and writing WARC on stdout
    #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn open_sink(cli: &Cli) -> Result<Sink> {
    let writer: Box<dyn Write + Send> = match (&cli.output, cli.bytes) {
        (Some(path), bytes) if NameTemplate::has_placeholder(path) => {
            let template = NameTemplate::parse(path)?;
            Box::new(SplitFileStream::new(
                template,
                bytes.unwrap_or(DEFAULT_SPLIT_BYTES),
            ))
        }
        (Some(path), None) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create `{path}`"))?,
        )),
        (Some(path), Some(_)) => {
            bail!("--bytes needs an output template with X characters, e.g. `{path}-XXXX`")
        }
        (None, Some(_)) => bail!("--bytes requires --output"),
        (None, None) => Box::new(std::io::stdout()),
    };
    Ok(sink_from(writer))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let sink = open_sink(&cli)?;
    let pool = WorkerPool::new(cli.jobs, Sink::clone(&sink), cli.gzip, &cli.command)?;

    let mut readers = Vec::new();
    if cli.inputs.is_empty() {
        let records = pool.sender();
        readers.push(
            thread::Builder::new()
                .name("read-stdin".into())
                .spawn(move || match WarcReader::from_source(Box::new(std::io::stdin())) {
                    Ok(reader) => read_input(reader, "<stdin>", &records),
                    Err(e) => error!(error = %e, "failed reading stdin"),
                })?,
        );
    } else {
        for path in &cli.inputs {
            let reader = WarcReader::open(path)
                .with_context(|| format!("cannot open `{}`", path.display()))?;
            let records = pool.sender();
            let label = path.display().to_string();
            readers.push(
                thread::Builder::new()
                    .name(format!("read-{label}"))
                    .spawn(move || read_input(reader, &label, &records))?,
            );
        }
    }

    for handle in readers {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("an input reader thread panicked"))?;
    }
    pool.join()?;

    match sink.lock() {
        Ok(mut guard) => guard.flush()?,
        Err(poisoned) => poisoned.into_inner().flush()?,
    }
    Ok(())
}
