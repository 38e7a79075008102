use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl DatabaseConfig {
    pub fn from_settings(settings: &crate::config::DatabaseSettings) -> Self {
        Self {
            url: settings.url.clone(),
            max_connections: settings.pool_max_connections,
            min_connections: settings.pool_min_connections,
            connect_timeout_secs: settings.pool_acquire_timeout_secs,
            idle_timeout_secs: settings.pool_idle_timeout_secs,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    #[error("Invalid database configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.url.is_empty() {
            return Err(DatabaseError::InvalidConfig(
                "database url is empty".to_string(),
            ));
        }

        info!("Connecting to usage database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(DatabaseError::MigrationFailed)?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        info!("Closing database connection pool...");
        self.pool.close().await;
    }
}

pub async fn init_database(config: &DatabaseConfig) -> Result<Database, DatabaseError> {
    let db = Database::connect(config).await?;
    db.run_migrations().await?;
    db.health_check().await?;
    Ok(db)
}
