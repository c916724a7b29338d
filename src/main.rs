use clap::Parser;
use mountkeeper::constants::LOG_ENV;
use mountkeeper::core::error::MountError;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = mountkeeper::cli::Cli::parse();
    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            // Fixable input problems exit 2 so scripts can tell them from system failures.
            match e.downcast_ref::<MountError>() {
                Some(err) if err.is_recoverable() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
