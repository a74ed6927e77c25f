use clap::Parser;
use seecats::cli::{self, Args};
use seecats::core::config::ConfigLoader;
use seecats::logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match ConfigLoader::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::from(2);
        }
    };

    let _guard = match logging::init(&args.command, &config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: failed to initialize logging: {:#}", err);
            return ExitCode::from(2);
        }
    };

    match cli::run(args.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
