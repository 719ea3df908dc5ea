use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

pub mod bill;
pub mod memory;

/// Errors a bill store reports to its callers. The messages are shown to the
/// user as-is.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Erreur 404")]
    NotFound,
    #[error("Erreur 500")]
    Server,
}

pub struct PostgresStore {
    pub pool: Pool,
}

impl PostgresStore {
    pub async fn new(conn_str: &str) -> Result<Self, anyhow::Error> {
        let cfg: tokio_postgres::Config = conn_str.parse()?;
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let pool = Pool::builder(Manager::from_config(cfg, NoTls, mgr_config))
            .max_size(16)
            .build()?;

        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<(), anyhow::Error> {
        let qry = r#"
            CREATE TABLE IF NOT EXISTS bills (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                expense_type TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                amount DOUBLE PRECISION NOT NULL DEFAULT 0,
                date TEXT NOT NULL DEFAULT '',
                vat TEXT NOT NULL DEFAULT '',
                pct INTEGER NOT NULL DEFAULT 20,
                commentary TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'pending',
                file_url TEXT NOT NULL,
                file_name TEXT NOT NULL,
                created_at TIMESTAMPTZ DEFAULT (NOW() AT TIME ZONE 'UTC')
            )
        "#;
        self.pool.get().await?.execute(qry, &[]).await?;

        let qry = "CREATE INDEX IF NOT EXISTS bills_email_idx ON bills (email)";
        self.pool.get().await?.execute(qry, &[]).await?;
        Ok(())
    }
}
