//! PostgreSQL backend.

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::Postgres;

use super::config::{DriverConfig, PoolSettings};
use super::{networked_pool_options, Database, DatabasePool, Driver};
use crate::error::{BlogError, Result};

pub const BACKEND: &str = "postgres";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_SSL_MODE: &str = "disable";

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl Driver for PostgresDriver {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn dsn(&self, config: &DriverConfig) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={} connect_timeout=5&statement_timeout=30000",
            config.host,
            config.port.unwrap_or(DEFAULT_PORT),
            config.user,
            config.password,
            config.database,
            ssl_mode(config),
        )
    }

    fn pool_settings(&self, config: &DriverConfig) -> PoolSettings {
        PoolSettings::NETWORKED.with_overrides(config)
    }

    /// Build a lazy pool; the first connection is made by [`Database::open`]'s ping.
    fn connect(&self, config: &DriverConfig) -> Result<Database> {
        let settings = self.pool_settings(config);
        let options = connect_options(config)?;
        let pool = networked_pool_options::<Postgres>(&settings).connect_lazy_with(options);

        tracing::info!(
            host = %config.host,
            port = config.port.unwrap_or(DEFAULT_PORT),
            database = %config.database,
            max_open = settings.max_open,
            "configured postgres pool"
        );
        Ok(Database::new(BACKEND, DatabasePool::Postgres(pool), settings))
    }
}

fn ssl_mode(config: &DriverConfig) -> &str {
    if config.ssl_mode.is_empty() {
        DEFAULT_SSL_MODE
    } else {
        config.ssl_mode.as_str()
    }
}

/// Connection options equivalent to [`PostgresDriver::dsn`].
///
/// # Errors
///
/// Returns a `Database` error for an unknown `sslmode`.
pub fn connect_options(config: &DriverConfig) -> Result<PgConnectOptions> {
    let mode = ssl_mode(config);
    let ssl_mode: PgSslMode = mode
        .parse()
        .map_err(|e| BlogError::database(BACKEND, format!("invalid sslmode {}: {}", mode, e)))?;
    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port.unwrap_or(DEFAULT_PORT))
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(ssl_mode)
        .options([("statement_timeout", "30000")]))
}
