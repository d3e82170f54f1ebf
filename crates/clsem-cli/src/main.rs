//! clsem - command line interface to a named semaphore
//!
//! Creates, adjusts, reads and deletes a System V semaphore identified by a
//! file path and a one-character id. Many independent `clsem` processes may
//! race on the same semaphore; a semaphore that is still being created is
//! waited for.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clsem_core::{AdjustMode, DEFAULT_DISCRIMINATOR};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

use commands::{Operation, exit_codes};

/// clsem - command line interface to a semaphore
#[derive(Parser, Debug)]
#[command(name = "clsem")]
#[command(about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Fail instead of waiting when a decrement cannot proceed
    #[arg(long)]
    no_wait: bool,

    /// -c (create), -v (print value), -d (delete), -V (version), or a signed
    /// increment
    #[arg(value_name = "OP", allow_hyphen_values = true)]
    op: String,

    /// File whose identity keys the semaphore
    path: Option<PathBuf>,

    /// One-character key id
    #[arg(default_value_t = DEFAULT_DISCRIMINATOR.to_string())]
    id: String,
}

fn run(cli: &Cli) -> Result<()> {
    let op: Operation = cli.op.parse()?;
    let id = cli.id.as_str();
    let path = || commands::require_path(op, cli.path.as_deref());
    tracing::debug!(%op, id, "dispatching");

    match op {
        Operation::Version => commands::version(&mut io::stdout().lock()),
        Operation::Create => commands::create(&mut io::stdout().lock(), path()?, id),
        Operation::Value => commands::value(&mut io::stdout().lock(), path()?, id),
        Operation::Delete => commands::delete(path()?, id),
        Operation::Adjust(delta) => {
            let mode = if cli.no_wait {
                AdjustMode::NoWait
            } else {
                AdjustMode::Blocking
            };
            commands::adjust(path()?, id, delta, mode)
        },
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for operation results.
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let exit_code = match run(&cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            eprintln!("{}: {}", commands::PROGRAM, commands::render(&err));
            commands::exit_code(&err)
        },
    };
    std::process::exit(i32::from(exit_code));
}
