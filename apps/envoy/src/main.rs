use anyhow::{Context, Result};
use dotenv::dotenv;
use envoy::{
    adapters::build_adapters,
    config::EnvoyConfig,
    http_client::HttpClient,
    normalizer::Normalizer,
    notifier::{LogNotifier, Notifier, TelegramNotifier},
    orchestrator::{Orchestrator, OrchestratorSettings},
    scheduler::{run_periodic_cycles, run_periodic_expiring_digest},
    server,
    store::{SeaOrmStore, Store},
};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info, warn};
use utils::{errors::*, tracing::run_with_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    run_with_tracing(run).await
}

async fn run() -> Result<()> {
    info!("Application starting up");
    let config = EnvoyConfig::from_env();

    let http = HttpClient::new(&config.http).context(HTTP_CLIENT_BUILD_FAILED)?;

    let store: Option<Arc<dyn Store>> = match &config.database_url {
        Some(url) => {
            let db = envoy_db::connect(url)
                .await
                .context(DATABASE_CONNECTION_FAILED)?;
            envoy_db::ensure_schema(&db)
                .await
                .context(DATABASE_SCHEMA_FAILED)?;
            info!("Database connection established");
            Some(Arc::new(SeaOrmStore::new(db)))
        }
        None => {
            warn!("{} New proposals are detected by age only.", DATABASE_URL_NOT_SET);
            None
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(http.clone(), telegram)),
        None => {
            warn!("{} Notifications go to the log.", BOT_TOKEN_NOT_SET);
            Arc::new(LogNotifier)
        }
    };

    if config.sources.tally_api_key.is_none() {
        warn!("{}", TALLY_API_KEY_NOT_SET);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut orchestrator = Orchestrator::new(
        build_adapters(&http, &config.sources),
        Normalizer::new(&config.sources),
        notifier,
        OrchestratorSettings::from(&config),
    )
    .with_shutdown(shutdown_rx.clone());
    if let Some(store) = store {
        orchestrator = orchestrator.with_store(store);
    }
    let orchestrator = Arc::new(orchestrator);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("{} on {}", SERVER_BIND_FAILED, config.bind_addr))?;

    let server_handle = tokio::spawn(server::serve(
        listener,
        orchestrator.clone(),
        shutdown_rx.clone(),
    ));

    let cycle_handle = tokio::spawn(run_periodic_cycles(
        orchestrator.clone(),
        config.schedule.poll_interval,
        shutdown_rx.clone(),
    ));

    let digest_handle = tokio::spawn(run_periodic_expiring_digest(
        orchestrator.clone(),
        config.schedule.digest_interval,
        shutdown_rx,
    ));

    info!("All tasks started, application running indefinitely");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Received Ctrl+C, shutting down gracefully");

    let _ = shutdown_tx.send(true);

    let grace = config.schedule.shutdown_grace;
    let stopped = tokio::time::timeout(grace, async {
        if let Err(e) = cycle_handle.await {
            error!(error = %e, "Cycle task ended abnormally");
        }
        if let Err(e) = digest_handle.await {
            error!(error = %e, "Digest task ended abnormally");
        }
        match server_handle.await {
            Ok(Err(e)) => error!(error = %e, "HTTP server error"),
            Err(e) => error!(error = %e, "HTTP server task ended abnormally"),
            Ok(Ok(())) => {}
        }
    })
    .await;

    if stopped.is_err() {
        warn!(
            grace_secs = grace.as_secs(),
            "Tasks did not stop within the grace period"
        );
    }

    info!("Application shutting down");
    Ok(())
}
