mod bootstrap;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use health_core::clock::SystemClock;
use health_core::settings::Settings;
use health_runtime::orchestrator::HealthOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging flags are CLI-only, so logging is up before saved settings load.
    let cli = Settings::parse();
    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(cli.effective_log_level(), cli.log_file.as_deref())?;

    let settings = Settings::load_with_last_used();

    tracing::info!("STORViX health v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Format: {}, Timezone: {}",
        settings.view,
        settings.format,
        settings.timezone
    );

    if settings.clear && settings.source.is_none() {
        tracing::info!("Saved configuration cleared");
        return Ok(());
    }

    let orchestrator = HealthOrchestrator::from_settings(&settings)?;
    let analysis = orchestrator
        .run(&SystemClock)
        .await
        .with_context(|| format!("health analysis of {} failed", orchestrator.locator()))?;

    let output = render::render(&analysis, &settings.view, &settings.format)?;
    print!("{output}");

    Ok(())
}
