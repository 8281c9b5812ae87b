//! Capture server entry point.

use roomtap::capture::CaptureServer;
use roomtap::config::CaptureConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (for development convenience)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = CaptureConfig::from_env();
    log::info!(
        "Capture: writing to {:?}, flushing every {:?}",
        config.output_dir,
        config.flush_interval
    );

    let server = CaptureServer::bind(config).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Capture: shutting down");
        }
    }

    Ok(())
}
