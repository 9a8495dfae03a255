//! MySQL / MariaDB backend.

use sqlx::mysql::MySqlConnectOptions;
use sqlx::MySql;

use super::config::{DriverConfig, PoolSettings};
use super::{networked_pool_options, Database, DatabasePool, Driver};
use crate::error::Result;

pub const BACKEND: &str = "mysql";
pub const DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDriver;

impl Driver for MysqlDriver {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn dsn(&self, config: &DriverConfig) -> String {
        format!(
            "{}:{}@tcp({}:{})/{}?parseTime=true&loc=Local&timeout=5s&readTimeout=30s&writeTimeout=30s",
            config.user,
            config.password,
            config.host,
            config.port.unwrap_or(DEFAULT_PORT),
            config.database,
        )
    }

    fn pool_settings(&self, config: &DriverConfig) -> PoolSettings {
        PoolSettings::NETWORKED.with_overrides(config)
    }

    /// Build a lazy pool; the first connection is made by [`Database::open`]'s ping.
    fn connect(&self, config: &DriverConfig) -> Result<Database> {
        let settings = self.pool_settings(config);
        let pool =
            networked_pool_options::<MySql>(&settings).connect_lazy_with(connect_options(config));

        tracing::info!(
            host = %config.host,
            port = config.port.unwrap_or(DEFAULT_PORT),
            database = %config.database,
            max_open = settings.max_open,
            "configured mysql pool"
        );
        Ok(Database::new(BACKEND, DatabasePool::MySql(pool), settings))
    }
}

/// Connection options equivalent to [`MysqlDriver::dsn`].
pub fn connect_options(config: &DriverConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port.unwrap_or(DEFAULT_PORT))
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
}
