//! Embedded file backend.
//!
//! Connections come from a deadpool pool; every new connection gets the
//! session pragmas before it is handed out, and recycling enforces the
//! lifetime and idle limits.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deadpool::managed::{self, Manager as _, Metrics, RecycleError, RecycleResult};
use deadpool_sqlite::Runtime;
use deadpool_sync::SyncWrapper;
use rusqlite::Connection;

use super::config::{DriverConfig, PoolSettings};
use super::{Database, DatabasePool, Driver};
use crate::error::{BlogError, Result};

pub const BACKEND: &str = "sqlite";

/// Query options appended to every embedded DSN.
pub const DSN_OPTIONS: &str = "_journal=WAL&_timeout=5000&_sync=NORMAL&_cache=shared&_mutex=no";

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn dsn(&self, config: &DriverConfig) -> String {
        format!("file:{}?{}", config.file_path.display(), DSN_OPTIONS)
    }

    fn pool_settings(&self, config: &DriverConfig) -> PoolSettings {
        PoolSettings::EMBEDDED.with_overrides(config)
    }

    fn connect(&self, config: &DriverConfig) -> Result<Database> {
        ensure_parent_dir(&config.file_path)?;

        let options = SqliteOptions::from_dsn(&self.dsn(config))?;
        let settings = self.pool_settings(config);
        let manager = SqliteManager::new(options, settings);
        let pool = managed::Pool::builder(manager)
            .max_size(settings.max_open)
            .build()
            .map_err(|e| {
                BlogError::database(BACKEND, format!("pool configuration failed: {}", e))
            })?;

        tracing::info!(
            path = %config.file_path.display(),
            max_open = settings.max_open,
            max_idle = settings.max_idle,
            "opened embedded database"
        );
        Ok(Database::new(BACKEND, DatabasePool::Embedded(pool), settings))
    }
}

#[cfg(unix)]
fn ensure_parent_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => fs::DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(parent)
            .map_err(|e| {
                BlogError::database(
                    BACKEND,
                    format!("failed to create directory {}: {}", parent.display(), e),
                )
            }),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| BlogError::database(BACKEND, format!("failed to create directory: {}", e))),
        _ => Ok(()),
    }
}

/// Options recovered from an embedded DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOptions {
    pub path: PathBuf,
    pub journal_mode: String,
    pub busy_timeout_ms: u32,
    pub synchronous: String,
    pub shared_cache: bool,
}

impl SqliteOptions {
    /// Parse `file:<path>?_journal=..&_timeout=..&_sync=..&_cache=..&_mutex=..`.
    ///
    /// `_mutex` is accepted for compatibility; pooled connections are always
    /// opened without the SQLite mutex and serialized by the pool wrapper.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let rest = dsn
            .strip_prefix("file:")
            .ok_or_else(|| BlogError::database(BACKEND, format!("invalid DSN: {}", dsn)))?;
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        if path.is_empty() {
            return Err(BlogError::database(BACKEND, "DSN has no file path"));
        }

        let mut options = SqliteOptions {
            path: PathBuf::from(path),
            journal_mode: "WAL".to_string(),
            busy_timeout_ms: 5000,
            synchronous: "NORMAL".to_string(),
            shared_cache: false,
        };

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "_journal" => options.journal_mode = value.to_ascii_uppercase(),
                "_timeout" => {
                    options.busy_timeout_ms = value.parse().map_err(|_| {
                        BlogError::database(BACKEND, format!("invalid _timeout: {}", value))
                    })?
                }
                "_sync" => options.synchronous = value.to_ascii_uppercase(),
                "_cache" => options.shared_cache = value.eq_ignore_ascii_case("shared"),
                "_mutex" => {}
                other => tracing::debug!(option = other, "ignoring unknown DSN option"),
            }
        }
        Ok(options)
    }

    /// SQLite URI handed to the connection opener.
    pub fn open_uri(&self) -> String {
        let path = self
            .path
            .to_string_lossy()
            .replace('%', "%25")
            .replace('?', "%3f")
            .replace('#', "%23");
        let cache = if self.shared_cache { "shared" } else { "private" };
        format!("file:{}?cache={}", path, cache)
    }

    /// Session pragmas issued on every new connection, in order.
    pub fn pragmas(&self) -> Vec<String> {
        vec![
            "PRAGMA foreign_keys = ON".to_string(),
            format!("PRAGMA journal_mode = {}", self.journal_mode),
            format!("PRAGMA synchronous = {}", self.synchronous),
            "PRAGMA cache_size = -10000".to_string(),
            format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms),
            "PRAGMA secure_delete = FAST".to_string(),
            "PRAGMA temp_store = MEMORY".to_string(),
            "PRAGMA mmap_size = 268435456".to_string(),
            "PRAGMA page_size = 4096".to_string(),
        ]
    }
}

/// Run a pragma and drain whatever rows it reports.
fn apply_pragma(conn: &Connection, pragma: &str) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(pragma)?;
    let mut rows = stmt.query([])?;
    while rows.next()?.is_some() {}
    Ok(())
}

pub(crate) fn apply_pragmas(conn: &Connection, pragmas: &[String]) -> Result<()> {
    for pragma in pragmas {
        apply_pragma(conn, pragma).map_err(|e| {
            BlogError::database(BACKEND, format!("failed to apply `{}`: {}", pragma, e))
        })?;
    }
    Ok(())
}

/// deadpool manager that installs pragmas on create and enforces
/// lifetime and idle limits on recycle.
pub struct SqliteManager {
    inner: deadpool_sqlite::Manager,
    pragmas: Arc<Vec<String>>,
    settings: PoolSettings,
}

impl SqliteManager {
    pub fn new(options: SqliteOptions, settings: PoolSettings) -> Self {
        let config = deadpool_sqlite::Config::new(options.open_uri());
        Self {
            inner: deadpool_sqlite::Manager::from_config(&config, Runtime::Tokio1),
            pragmas: Arc::new(options.pragmas()),
            settings,
        }
    }
}

impl managed::Manager for SqliteManager {
    type Type = SyncWrapper<Connection>;
    type Error = BlogError;

    async fn create(&self) -> Result<Self::Type> {
        let conn = self
            .inner
            .create()
            .await
            .map_err(|e| BlogError::database(BACKEND, format!("failed to open database: {}", e)))?;

        let pragmas = Arc::clone(&self.pragmas);
        conn.interact(move |conn| apply_pragmas(conn, &pragmas))
            .await
            .map_err(|e| BlogError::database(BACKEND, format!("connection setup aborted: {}", e)))??;
        Ok(conn)
    }

    async fn recycle(&self, conn: &mut Self::Type, metrics: &Metrics) -> RecycleResult<BlogError> {
        if conn.is_mutex_poisoned() {
            return Err(RecycleError::Message("connection mutex poisoned".into()));
        }
        if metrics.age() > self.settings.max_lifetime {
            return Err(RecycleError::Message("connection exceeded max lifetime".into()));
        }
        if metrics.last_used() > self.settings.max_idle_time {
            return Err(RecycleError::Message("connection exceeded max idle time".into()));
        }
        Ok(())
    }
}

pub type SqlitePool = managed::Pool<SqliteManager>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsn_format() {
        let config = DriverConfig::sqlite("data/app.db");
        assert_eq!(
            SqliteDriver.dsn(&config),
            "file:data/app.db?_journal=WAL&_timeout=5000&_sync=NORMAL&_cache=shared&_mutex=no"
        );
    }

    #[test]
    fn test_options_from_dsn() {
        let options = SqliteOptions::from_dsn(
            "file:data/app.db?_journal=wal&_timeout=7000&_sync=FULL&_cache=shared&_mutex=no",
        )
        .unwrap();
        assert_eq!(options.path, PathBuf::from("data/app.db"));
        assert_eq!(options.journal_mode, "WAL");
        assert_eq!(options.busy_timeout_ms, 7000);
        assert_eq!(options.synchronous, "FULL");
        assert!(options.shared_cache);
        assert_eq!(options.open_uri(), "file:data/app.db?cache=shared");

        assert!(SqliteOptions::from_dsn("data/app.db").is_err());
        assert!(SqliteOptions::from_dsn("file:x.db?_timeout=soon").is_err());
    }

    #[test]
    fn test_open_uri_escapes_reserved() {
        let options = SqliteOptions::from_dsn("file:/tmp/a#b%c.db").unwrap();
        assert_eq!(options.open_uri(), "file:/tmp/a%23b%25c.db?cache=private");
    }

    #[test]
    fn test_pragmas_apply() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("p.db")).unwrap();
        let options = SqliteOptions::from_dsn(&SqliteDriver.dsn(&DriverConfig::sqlite(
            dir.path().join("p.db"),
        )))
        .unwrap();
        apply_pragmas(&conn, &options.pragmas()).unwrap();

        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        let journal: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0)).unwrap();
        let timeout: i64 = conn.query_row("PRAGMA busy_timeout", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
        assert_eq!(journal.to_lowercase(), "wal");
        assert_eq!(timeout, 5000);
    }

    #[test]
    fn test_pragma_failure_names_pragma() {
        let conn = Connection::open_in_memory().unwrap();
        let err = apply_pragmas(&conn, &["PRAGMA nonsense(".to_string()]).unwrap_err();
        assert!(err.to_string().starts_with("sqlite: failed to apply `PRAGMA nonsense(`"));
    }

    #[test]
    fn test_parent_directory_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("app.db");
        ensure_parent_dir(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }
}
