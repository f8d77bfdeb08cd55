use beststories::app::App;
use beststories::cli::Args;
use beststories::config::Config;
use beststories::logging::setup_logging;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let config = Config::load().expect("Failed to load config for logging setup");
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_HASH"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting beststories"
    );

    let app = App::new(config).expect("Failed to initialize application");
    app.run().await
}
