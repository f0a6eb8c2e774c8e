//! warcmill-lines - Ordered Line-Parallel Driver
//!
//! The in-order cousin of `warcmill`: fans lines from stdin out to a pool
//! of child processes and writes their outputs to stdout in input order.
//! Children are expected to emit exactly one output line per input line,
//! like `cat`, `sed`, or a per-line scorer.
//!
//! ```bash
//! warcmill-lines -j 8 ./score_line.sh < sentences.txt > scores.txt
//! ```

use std::io::{stdin, stdout, BufWriter};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use warcmill_pipeline::ordered;

#[derive(Parser)]
#[command(
    name = "warcmill-lines",
    version,
    about = "Line-parallel child wrapper that keeps input order"
)]
struct Cli {
    /// Number of child process workers
    #[arg(short, long, value_name = "N", default_value_t = num_cpus::get())]
    jobs: usize,

    /// Child command reading lines on stdin and writing lines on stdout
    #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    ordered::run(
        cli.jobs,
        stdin().lock(),
        BufWriter::new(stdout()),
        &cli.command,
    )?;
    Ok(())
}
