use std::sync::Arc;

use anyhow::Context;
use maildir_ingest::config::MaildirConfig;
use maildir_ingest::runner::{MaildirRunner, spawn_runners};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = MaildirConfig::from_env().context("invalid configuration")?;

    eprintln!("📬 Maildir ingest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Maildir: {}", config.maildir_dir.display());
    eprintln!("   Queues: {}", config.queue_dir.display());
    eprintln!("   Lists: {}", config.lists_dir.display());
    eprintln!("   Workers: {}\n", config.numslices);

    let runner = MaildirRunner::from_config(&config).context("failed to set up maildir runner")?;

    // Crashed runners leave :1,P files behind; they need an operator.
    match runner.maildir().in_progress() {
        Ok(stale) if !stale.is_empty() => {
            for path in &stale {
                tracing::warn!(path = %path.display(), "Maildir file left in progress by an earlier run");
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Could not scan for in-progress maildir files: {e}"),
    }

    let handle = spawn_runners(Arc::new(runner), config.numslices, config.sleep_time);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested, finishing current passes");
    handle.stop();
    handle.join().await;

    Ok(())
}
