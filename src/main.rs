use config::{Environment, File};
use std::{net::SocketAddr, path::PathBuf, str::FromStr, sync::Arc};
use tokio::sync::Mutex;
use tower_sessions::ExpiredDeletion;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{Layer, layer::SubscriberExt};

use crate::{
    db::{bill::BillStore, memory::InMemBillStore},
    web::{rate_limit::RateLimiter, session::MemorySessionStore},
};

mod db;
mod web;

/// Where bills are kept
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    pub address: std::net::SocketAddr,
    pub domain: String,
    pub cookie_secure: bool,
    pub log_level: String,
    pub store: StoreKind,
    pub fixtures_path: String,
    pub modal_width: u32,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_host: String,
}

impl Config {
    pub fn db_connection_string(&self) -> String {
        let db_name = if self.db_name.is_empty() {
            "".to_string()
        } else {
            format!("/{}", self.db_name)
        };
        format!(
            "postgres://{}:{}@{}?host={}",
            self.db_user, self.db_password, db_name, self.db_host
        )
    }

    /// Relative fixture paths are resolved against the crate directory
    pub fn fixtures_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.fixtures_path);
        if path.is_absolute() {
            path
        } else {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path)
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, anyhow::Error> {
        let s = config::Config::builder()
            .add_source(File::with_name(&format!(
                "{}/config/config.toml",
                env!("CARGO_MANIFEST_DIR")
            )))
            .add_source(Environment::with_prefix("BILLED").separator("__"))
            .build()?;

        Ok(s.try_deserialize()?)
    }
}

#[derive(Clone)]
pub struct Ctx {
    pub bill_store: Arc<dyn BillStore>,
    pub config: Config,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub session_store: MemorySessionStore,
}

impl Ctx {
    pub async fn new(cfg: &Config) -> Result<Self, anyhow::Error> {
        let bill_store: Arc<dyn BillStore> = match cfg.store {
            StoreKind::Memory => {
                Arc::new(InMemBillStore::from_fixtures(cfg.fixtures_path()).await?)
            }
            StoreKind::Postgres => {
                let db = db::PostgresStore::new(&cfg.db_connection_string()).await?;
                db.init().await?;
                Arc::new(db)
            }
        };
        let ctx = Self::with_store(cfg, bill_store);

        // Delete expired sessions regularly
        let session_store = ctx.session_store.clone();
        tokio::spawn(async move {
            if let Err(e) = session_store
                .continuously_delete_expired(tokio::time::Duration::from_secs(60))
                .await
            {
                tracing::error!("Error deleting expired sessions: {e}");
            }
        });

        Ok(ctx)
    }

    pub fn with_store(cfg: &Config, bill_store: Arc<dyn BillStore>) -> Self {
        Self {
            bill_store,
            config: cfg.to_owned(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            session_store: MemorySessionStore::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cfg = Config::new()?;

    tracing_log::LogTracer::init()?;
    let level_filter = LevelFilter::from_str(&cfg.log_level)?;
    let stdout_log = tracing_subscriber::fmt::layer().with_filter(level_filter);
    let subscriber = tracing_subscriber::registry().with(stdout_log);
    tracing::subscriber::set_global_default(subscriber)?;

    if let Ok(listener) = tokio::net::TcpListener::bind(&cfg.address).await {
        info!(
            "Server running at http://{} with store={:?} and log-level={}",
            cfg.address, cfg.store, cfg.log_level
        );
        let ctx = Ctx::new(&cfg).await?;
        let router = web::router(ctx, &cfg);
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_handler())
        .await?;
    } else {
        error!("Failed to bind to listen address {}", &cfg.address);
    }

    Ok(())
}

async fn shutdown_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error installing ctrl_c handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Error installing signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
