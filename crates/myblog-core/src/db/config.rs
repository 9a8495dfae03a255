//! Connection settings shared by all drivers.

use std::path::PathBuf;
use std::time::Duration;

/// Pool sizing and connection recycling limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_open: usize,
    pub max_idle: usize,
    pub max_lifetime: Duration,
    pub max_idle_time: Duration,
}

impl PoolSettings {
    /// Embedded file backend: 15 open, 5 idle, 30 min lifetime, 10 min idle.
    pub const EMBEDDED: PoolSettings = PoolSettings {
        max_open: 15,
        max_idle: 5,
        max_lifetime: Duration::from_secs(30 * 60),
        max_idle_time: Duration::from_secs(10 * 60),
    };

    /// Networked backends: 25 open, 10 idle, 30 min lifetime, 10 min idle.
    pub const NETWORKED: PoolSettings = PoolSettings {
        max_open: 25,
        max_idle: 10,
        max_lifetime: Duration::from_secs(30 * 60),
        max_idle_time: Duration::from_secs(10 * 60),
    };

    /// Apply non-zero overrides from `config` on top of these defaults.
    pub fn with_overrides(self, config: &DriverConfig) -> PoolSettings {
        PoolSettings {
            max_open: config.max_open_conns.filter(|n| *n > 0).unwrap_or(self.max_open),
            max_idle: config.max_idle_conns.filter(|n| *n > 0).unwrap_or(self.max_idle),
            max_lifetime: config
                .conn_max_lifetime
                .filter(|d| !d.is_zero())
                .unwrap_or(self.max_lifetime),
            max_idle_time: config
                .conn_max_idle_time
                .filter(|d| !d.is_zero())
                .unwrap_or(self.max_idle_time),
        }
    }
}

/// Everything a driver needs to build a DSN and a pool.
#[derive(Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub driver: String,
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub file_path: PathBuf,
    pub max_open_conns: Option<usize>,
    pub max_idle_conns: Option<usize>,
    pub conn_max_lifetime: Option<Duration>,
    pub conn_max_idle_time: Option<Duration>,
    pub auto_migrate: bool,
    pub log_level: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver: "sqlite".to_string(),
            host: "localhost".to_string(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: "app.db".to_string(),
            ssl_mode: "disable".to_string(),
            file_path: PathBuf::from("data/app.db"),
            max_open_conns: None,
            max_idle_conns: None,
            conn_max_lifetime: None,
            conn_max_idle_time: None,
            auto_migrate: true,
            log_level: "info".to_string(),
        }
    }
}

impl DriverConfig {
    /// File-backed SQLite config at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("file_path", &self.file_path)
            .field("max_open_conns", &self.max_open_conns)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("auto_migrate", &self.auto_migrate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_ignore_zero() {
        let config = DriverConfig {
            max_open_conns: Some(0),
            max_idle_conns: Some(2),
            conn_max_lifetime: Some(Duration::ZERO),
            ..DriverConfig::default()
        };
        let settings = PoolSettings::EMBEDDED.with_overrides(&config);
        assert_eq!(settings.max_open, 15);
        assert_eq!(settings.max_idle, 2);
        assert_eq!(settings.max_lifetime, Duration::from_secs(1800));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DriverConfig {
            password: "hunter2".to_string(),
            ..DriverConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
