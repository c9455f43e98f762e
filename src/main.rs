use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use entitlement_sync::adapters::auth::{
    ChainedIdentityVerifier, HttpKeySetFetcher, JwksIdentityVerifier, LegacyTokenVerifier,
    TtlKeySetCache,
};
use entitlement_sync::adapters::http::{app_router, AppState};
use entitlement_sync::adapters::postgres::PostgresReconciliationStore;
use entitlement_sync::config::{AppConfig, AuthConfig, ConfigError, ValidationError};
use entitlement_sync::ports::IdentityVerifier;

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),

    #[error("http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl From<ValidationError> for StartupError {
    fn from(err: ValidationError) -> Self {
        Self::Config(ConfigError::from(err))
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("entitlement-sync exited with error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    if !config.payment.has_webhook_secret() {
        warn!("stripe webhook secret not configured; deliveries will be refused");
    }

    let pool = config.database.pool_options().connect(&config.database.url).await?;
    info!("Postgres connection has been established");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("migrations applied");
    }

    let store = Arc::new(PostgresReconciliationStore::new(pool));
    let identity_verifier = build_identity_verifier(&config.auth)?;

    let state = AppState::new(
        store,
        config.payment.webhook_verifier(),
        config.payment.plan_catalog(),
        identity_verifier,
    );
    let app = app_router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "entitlement-sync listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// JWKS verifier first, legacy HS256 as fallback when enabled.
fn build_identity_verifier(auth: &AuthConfig) -> Result<Arc<dyn IdentityVerifier>, StartupError> {
    let legacy: Option<Arc<dyn IdentityVerifier>> = auth
        .legacy_secret()
        .map(|secret| Arc::new(LegacyTokenVerifier::new(secret)) as Arc<dyn IdentityVerifier>);

    let jwks: Option<Arc<dyn IdentityVerifier>> = match auth.jwks_url.as_deref() {
        Some(url) if !url.is_empty() => {
            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()?;
            let cache = TtlKeySetCache::new(HttpKeySetFetcher::new(url, client), auth.jwks_cache_ttl())
                .with_refresh_cooldown(auth.jwks_refresh_cooldown());
            let mut verifier = JwksIdentityVerifier::new(Arc::new(cache));
            if let Some(issuer) = &auth.issuer {
                verifier = verifier.with_issuer(issuer.clone());
            }
            if let Some(audience) = &auth.audience {
                verifier = verifier.with_audience(audience.clone());
            }
            Some(Arc::new(verifier))
        }
        _ => None,
    };

    match (jwks, legacy) {
        (Some(primary), Some(fallback)) => Ok(Arc::new(ChainedIdentityVerifier::new(primary, fallback))),
        (Some(verifier), None) | (None, Some(verifier)) => Ok(verifier),
        (None, None) => Err(ValidationError::MissingRequired("AUTH__JWKS_URL").into()),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to install CTRL+C handler: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
