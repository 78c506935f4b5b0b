use clap::Parser;
use color_eyre::eyre::Result;
use filestats_app::FileStatsService;
use filestats_config::Settings;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Install error hooks
    color_eyre::install()?;

    let cli = Cli::parse();
    let overrides = cli.overrides();
    let env = |key: &str| std::env::var(key).ok();

    let settings = Settings::load().await?.resolve(env, &overrides);
    setup_logging(settings.debug);

    for var in Settings::overridden_env_vars(env, &overrides) {
        warn!("Environment variable {} is overridden by the command-line argument", var);
    }

    if let Err(e) = run(cli, &settings).await {
        error!("Application error: {}", e);
        return Err(e);
    }

    Ok(())
}

fn setup_logging(debug: bool) {
    let default_filter = if debug { "filestats=debug,info" } else { "filestats=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_thread_ids(false)
        .init();
}

async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    info!("Starting filestats...");
    info!(
        "Language: {}, database: {}",
        settings.locale(),
        settings
            .database_path
            .as_ref()
            .map_or_else(|| "<data dir>".to_string(), |p| p.display().to_string())
    );

    let service = FileStatsService::from_settings(settings).await?;
    cli::run(&service, cli.command).await
}
