use scrollcull::config;
use scrollcull::errors::ScrollCullResult;

#[tokio::main]
async fn main() -> ScrollCullResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found).
    let _ = dotenvy::dotenv();

    let config = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "no config loaded — writing defaults");
            let cfg = config::AppConfig::default();
            if let Err(e) = config::save_config(&cfg) {
                tracing::warn!(error = %e, "failed to write default config");
            }
            cfg
        }
    };

    let report = scrollcull::run_session(&config).await?;

    tracing::info!(
        session = %report.session_id,
        like = report.like,
        source = ?report.verdict_source,
        photos = report.photos_kept,
        cycles = report.cycles_run,
        "session complete"
    );
    Ok(())
}
