use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use repo_curator::config::Config;
use repo_curator::models::RunStatus;
use repo_curator::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            return Ok(ExitCode::from(2));
        }
    };
    tracing::info!("Store: {}", config.store_path.display());
    tracing::info!("Candidate source: {}", config.api_base_url);

    let state = AppState::new(config)?;
    let pipeline = state.pipeline();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current step");
            on_signal.cancel();
        }
    });

    let summary = pipeline.run(&cancel).await;
    tracing::info!(
        "Stored {} of {} candidates ({:.1}%, {:.1}/min)",
        summary.stored(),
        summary.candidates,
        summary.success_rate(),
        summary.throughput_per_minute()
    );

    Ok(match summary.status {
        RunStatus::Failed { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
