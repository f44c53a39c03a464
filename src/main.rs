use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use calshare::storage::config::{Config, config_dir};

mod cli;
use cli::{Command, USAGE, parse_command, run_command};

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let command = match parse_command(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("Error: {}", err);
            println!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    if command == Command::Help {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    let config = match Config::load_or_create() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            tracing::error!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run_command(command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() {
    let log_dir = config_dir();

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "calshare.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    std::mem::forget(_guard);

    tracing::info!("calshare started");
}
