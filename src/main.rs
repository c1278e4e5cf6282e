use anyhow::Context;
use slackv::config::load_settings;
use slackv::logging::init_tracing;
use slackv::metadata::IdentityCache;
use slackv::render::Renderer;
use slackv::session::SessionRunner;
use slackv::slack::{EventHandler, SlackClient};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    init_tracing();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting slackv");

    let settings = load_settings().context("Failed to load configuration")?;
    tracing::debug!(
        api_base_url = %settings.slack.api_base_url,
        timeout_secs = settings.slack.request_timeout_secs,
        patterns = settings.notification.patterns.len(),
        "Configuration loaded"
    );

    let client = Arc::new(SlackClient::new(settings.slack.clone())?);
    let cache = IdentityCache::new(client.clone());
    let renderer = Renderer::new(std::io::stdout(), settings.notification.compile());
    let runner = SessionRunner::new(client, EventHandler::new(cache, renderer));

    tokio::select! {
        result = runner.run() => {
            result.context("Transcript output failed")?;
        }
        signal_name = wait_for_shutdown() => {
            tracing::info!(signal = %signal_name?, "Received shutdown signal, exiting");
        }
    }

    Ok(())
}

/// Resolve on SIGINT (Ctrl+C) or SIGTERM; only Ctrl+C off Unix
async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => Ok("SIGINT (Ctrl+C)"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}
