//! Airdrop Hunter binary entrypoint.
//! Boots the Axum HTTP server and the recurring ingestion/maintenance jobs.

use airdrop_hunter::config::AppConfig;
use airdrop_hunter::ingest::scheduler::spawn_scheduler;
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    airdrop_hunter::init_tracing();

    let cfg = AppConfig::from_env()?;
    let app = airdrop_hunter::build(&cfg).await?;

    let scheduler = spawn_scheduler(app.pipeline.clone(), cfg.schedule);
    let renderer = app.renderer.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown signal received");
                scheduler.shutdown().await;
                if let Some(r) = renderer {
                    r.close();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "no shutdown signal listener; scheduler keeps running");
                // hold the handle for the life of the process
                std::future::pending::<()>().await;
                drop(scheduler);
            }
        }
    });

    Ok(app.router.into())
}
