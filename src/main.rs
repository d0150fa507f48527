use std::time::Duration;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod gamification;
mod mail;
mod response;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod users;

use crate::config::AppConfig;
use crate::state::AppState;

/// How long queued mail may keep flushing after the server stops.
const MAIL_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "sprintboard=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let (host, port) = (config.host.clone(), config.port);

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;
    db::seed(&pool).await?;

    let (app_state, mail_worker) = AppState::init(config, pool.clone());
    app::serve(app::build_app(app_state), &host, port).await?;

    // The router (and every queue sender in it) is gone; let the worker drain.
    match tokio::time::timeout(MAIL_GRACE_PERIOD, mail_worker).await {
        Ok(_) => tracing::info!("mail queue drained"),
        Err(_) => tracing::warn!("mail queue not drained before shutdown; pending mail dropped"),
    }
    pool.close().await;
    Ok(())
}
