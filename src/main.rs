//! retouch command line entry point.

mod cli;

use std::process::ExitCode;

use clap::Parser;

use cli::CliArgs;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.preferences.log_level.to_level_filter());

    match cli::run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// RUST_LOG overrides the configured level.
#[cfg(not(target_arch = "wasm32"))]
fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[cfg(target_arch = "wasm32")]
fn init_logging(level: log::LevelFilter) {
    log::set_max_level(level);
}
