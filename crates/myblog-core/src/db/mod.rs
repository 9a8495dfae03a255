//! Database drivers and the pooled handle.
//!
//! A [`Driver`] turns a [`DriverConfig`] into a DSN and a pooled
//! [`Database`]. Drivers are looked up by name through a
//! [`DriverResolver`]; [`registry::global`] is the process-wide one.
//!
//! The embedded engine pools rusqlite connections through deadpool; the
//! MySQL and PostgreSQL families pool through sqlx.

pub mod config;
pub mod mysql;
pub mod postgres;
pub mod registry;
pub mod sqlite;

use std::cell::Cell;
use std::time::Duration;

use rusqlite::Connection;
use sqlx::pool::PoolOptions;
use sqlx::{MySqlPool, PgPool};

pub use config::{DriverConfig, PoolSettings};
pub use registry::{DriverRegistry, DriverResolver};

use crate::error::{BlogError, Result};
use crate::schema::{self, BootstrapOptions, BootstrapReport};
use sqlite::SqlitePool;

/// A SQL backend.
pub trait Driver: Send + Sync {
    /// Backend family name used in error context.
    fn backend(&self) -> &'static str;

    /// Connection string for this backend.
    fn dsn(&self, config: &DriverConfig) -> String;

    /// Backend defaults with the config's overrides applied.
    fn pool_settings(&self, config: &DriverConfig) -> PoolSettings;

    /// Build a pooled handle. Connections are opened lazily.
    fn connect(&self, config: &DriverConfig) -> Result<Database>;
}

/// Connection pool behind a [`Database`], one variant per backend family.
pub(crate) enum DatabasePool {
    Embedded(SqlitePool),
    MySql(MySqlPool),
    Postgres(PgPool),
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Open connections, idle or checked out.
    pub size: usize,
    /// Idle connections ready to hand out.
    pub available: usize,
    pub max_size: usize,
}

/// Pool options shared by the networked backends. Connections open on first
/// use and are retired by the pool after the lifetime and idle limits.
pub(crate) fn networked_pool_options<DB: sqlx::Database>(
    settings: &PoolSettings,
) -> PoolOptions<DB> {
    PoolOptions::new()
        .max_connections(u32::try_from(settings.max_open).unwrap_or(u32::MAX))
        .min_connections(0)
        .max_lifetime(settings.max_lifetime)
        .idle_timeout(settings.max_idle_time)
        .acquire_timeout(NETWORK_CONNECT_TIMEOUT)
}

/// Connect and acquire timeout for networked backends.
pub const NETWORK_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared, pooled database handle.
pub struct Database {
    backend: &'static str,
    pool: DatabasePool,
    settings: PoolSettings,
}

impl Database {
    pub(crate) fn new(backend: &'static str, pool: DatabasePool, settings: PoolSettings) -> Self {
        Self {
            backend,
            pool,
            settings,
        }
    }

    /// Resolve `config.driver`, connect, and check out one connection so
    /// that open and pragma failures surface immediately.
    pub async fn open(resolver: &dyn DriverResolver, config: &DriverConfig) -> Result<Database> {
        let driver = resolver.resolve(&config.driver)?;
        let db = driver.connect(config)?;
        db.ping().await?;
        Ok(db)
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// True for the file-backed engine, which is the one schema bootstrap
    /// and the repositories run on.
    pub fn is_embedded(&self) -> bool {
        matches!(self.pool, DatabasePool::Embedded(_))
    }

    fn embedded_only(&self, operation: &str) -> BlogError {
        BlogError::database(
            self.backend,
            format!("{} requires the embedded engine", operation),
        )
    }

    /// Run a blocking closure on a pooled embedded connection.
    ///
    /// # Errors
    ///
    /// Networked backends return a `Database` error.
    pub async fn interact<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let DatabasePool::Embedded(pool) = &self.pool else {
            return Err(self.embedded_only("connection interaction"));
        };
        let conn = pool.get().await.map_err(|e| {
            BlogError::database(self.backend, format!("failed to get connection: {}", e))
        })?;
        conn.interact(f).await.map_err(|e| {
            BlogError::database(self.backend, format!("connection task failed: {}", e))
        })?
    }

    pub async fn ping(&self) -> Result<()> {
        let ping_failed =
            |e: sqlx::Error| BlogError::database(self.backend, format!("ping failed: {}", e));
        match &self.pool {
            DatabasePool::Embedded(_) => {
                self.interact(|conn| {
                    conn.query_row("SELECT 1", [], |_| Ok(()))?;
                    Ok(())
                })
                .await
            }
            DatabasePool::MySql(pool) => sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(ping_failed),
            DatabasePool::Postgres(pool) => sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(ping_failed),
        }
    }

    /// Migrate and seed. See [`crate::schema::bootstrap`].
    ///
    /// # Errors
    ///
    /// Networked backends return a `Database` error; their schema is
    /// managed outside this process.
    pub async fn bootstrap(&self, options: BootstrapOptions) -> Result<BootstrapReport> {
        if !self.is_embedded() {
            return Err(self.embedded_only("schema bootstrap"));
        }
        self.interact(move |conn| schema::bootstrap(conn, &options))
            .await
    }

    /// Close embedded connections past the idle limits, keeping at most
    /// `max_idle`. Returns how many were closed.
    ///
    /// Networked pools retire idle connections on their own and report 0.
    pub fn reap_idle(&self) -> usize {
        let DatabasePool::Embedded(pool) = &self.pool else {
            return 0;
        };
        let kept = Cell::new(0usize);
        let settings = self.settings;
        let result = pool.retain(|_, metrics| {
            let keep = kept.get() < settings.max_idle
                && metrics.last_used() <= settings.max_idle_time
                && metrics.age() <= settings.max_lifetime;
            if keep {
                kept.set(kept.get() + 1);
            }
            keep
        });
        let removed = result.removed.len();
        if removed > 0 {
            tracing::debug!(
                backend = self.backend,
                removed,
                retained = result.retained,
                "reaped idle connections"
            );
        }
        removed
    }

    pub fn status(&self) -> PoolStatus {
        match &self.pool {
            DatabasePool::Embedded(pool) => {
                let status = pool.status();
                PoolStatus {
                    size: status.size,
                    available: status.available,
                    max_size: status.max_size,
                }
            }
            DatabasePool::MySql(pool) => networked_status(pool, self.settings),
            DatabasePool::Postgres(pool) => networked_status(pool, self.settings),
        }
    }

    pub async fn close(&self) {
        match &self.pool {
            DatabasePool::Embedded(pool) => pool.close(),
            DatabasePool::MySql(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
        }
        tracing::info!(backend = self.backend, "database closed");
    }
}

fn networked_status<DB: sqlx::Database>(pool: &sqlx::Pool<DB>, settings: PoolSettings) -> PoolStatus {
    PoolStatus {
        size: pool.size() as usize,
        available: pool.num_idle(),
        max_size: settings.max_open,
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend)
            .field("settings", &self.settings)
            .finish()
    }
}
