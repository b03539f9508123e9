use std::{
    io::{self, Write},
    process::ExitCode,
};

use anyhow::Context;
use screenres::{
    ModeRegistry, PlatformBackend,
    app::{self, write_termination},
    cli,
};
use tracing_subscriber::EnvFilter;

/// Log filter directives are read from this variable first, then from `RUST_LOG`.
const LOG_ENV: &str = "SCREENRES_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> anyhow::Result<ExitCode> {
    let backend = PlatformBackend::new().context("failed to open the display subsystem")?;
    let mut registry =
        ModeRegistry::new(backend).context("failed to enumerate the display modes")?;

    let args: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    let command_line = match cli::parse(args) {
        Ok(command_line) => command_line,
        Err(termination) => {
            let mut out = io::stdout().lock();
            write_termination(&termination, &mut out)?;
            out.flush()?;
            return Ok(termination.exit_code());
        }
    };

    let mut out = io::stdout().lock();
    let outcome = app::run(&mut registry, &command_line, &mut out)?;
    out.flush()?;

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
