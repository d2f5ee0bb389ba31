use std::sync::Arc;

use axum_extra::extract::cookie::Key;
use base64::Engine;
use edu_portal::config::Config;
use edu_portal::db::SqliteStore;
use edu_portal::service::{accounts, password::CredentialVerifier};
use edu_portal::{PortalState, portal_router};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        listen_addr = %cfg.listen_addr,
        loglevel = %cfg.loglevel,
        session_ttl_hours = cfg.session_ttl_hours,
        insecure_cookie = cfg.insecure_cookie
    );

    let store = SqliteStore::connect(&cfg.database_url).await?;
    store.init_schema().await?;
    info!("database schema ready");

    let verifier = CredentialVerifier::from_config(&cfg)?;
    accounts::bootstrap_admin(&store, &verifier, &cfg.admin_email, &cfg.admin_password).await?;

    let state = PortalState::new(Arc::new(store), verifier, cookie_key(&cfg)?)
        .with_session_ttl(cfg.session_ttl())
        .with_secure_cookie(!cfg.insecure_cookie);
    let app = portal_router(state);

    let listener = TcpListener::bind(cfg.listen_addr.as_str()).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn cookie_key(cfg: &Config) -> Result<Key, Box<dyn std::error::Error>> {
    match cfg.cookie_key.as_deref() {
        Some(encoded) => {
            let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
            Ok(Key::try_from(bytes.as_slice())?)
        }
        None => {
            warn!("PORTAL_COOKIE_KEY not set; sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
