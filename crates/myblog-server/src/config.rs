//! Command-line and environment configuration.
//!
//! Every option has a long flag and an environment variable; flags win.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser};
use myblog_core::{DriverConfig, VERSION};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TLS is enabled but {0} is not set")]
    MissingTlsFile(&'static str),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// MyBlog - personal blog backend
#[derive(Parser)]
#[command(name = "myblog")]
#[command(author, version = VERSION, about, long_about = None)]
pub struct ServerConfig {
    #[command(flatten)]
    pub db: DbArgs,

    /// HTTP listen port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Serve HTTPS with the given certificate and key
    #[arg(long, env = "ENABLE_TLS", default_value_t = false, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true")]
    pub enable_tls: bool,

    /// PEM certificate chain
    #[arg(long, env = "TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Message-bus brokers (comma separated)
    #[arg(long, env = "KAFKA_BROKERS", value_delimiter = ',')]
    pub kafka_brokers: Vec<String>,

    /// Message-bus consumer group
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = "myblog-consumer-group")]
    pub kafka_group_id: String,

    /// Token signing secret; random per process when unset
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Root of the markdown article tree
    #[arg(long, env = "MARKDOWN_DIR", default_value = "markdown")]
    pub markdown_dir: PathBuf,

    /// Directory served under /static
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
}

/// Database options.
#[derive(Args, Clone)]
pub struct DbArgs {
    /// Driver name (sqlite, sqlite3, mysql, mariadb, postgres, pgsql)
    #[arg(long = "db-driver", env = "DB_DRIVER", default_value = "sqlite")]
    pub driver: String,

    #[arg(long = "db-host", env = "DB_HOST", default_value = "localhost")]
    pub host: String,

    /// Defaults to the backend's standard port
    #[arg(id = "db_port", long = "db-port", env = "DB_PORT")]
    pub port: Option<u16>,

    #[arg(long = "db-user", env = "DB_USER", default_value = "")]
    pub user: String,

    #[arg(long = "db-password", env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    #[arg(long = "db-name", env = "DB_NAME", default_value = "app.db")]
    pub name: String,

    #[arg(long = "db-sslmode", env = "DB_SSLMODE", default_value = "disable")]
    pub ssl_mode: String,

    /// Database file for the embedded backend
    #[arg(long = "db-file", env = "DB_FILE", default_value = "data/app.db")]
    pub file: PathBuf,

    #[arg(long = "db-max-conns", env = "DB_MAX_CONNS")]
    pub max_conns: Option<usize>,

    #[arg(long = "db-max-idle", env = "DB_MAX_IDLE")]
    pub max_idle: Option<usize>,

    /// Minutes
    #[arg(long = "db-conn-max-lifetime", env = "DB_CONN_MAX_LIFETIME")]
    pub conn_max_lifetime: Option<u64>,

    /// Minutes
    #[arg(long = "db-conn-max-idle-time", env = "DB_CONN_MAX_IDLE_TIME")]
    pub conn_max_idle_time: Option<u64>,

    /// Run schema bootstrap at startup
    #[arg(long = "db-migrate", env = "DB_AUTO_MIGRATE", default_value_t = true,
          action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub auto_migrate: bool,

    #[arg(id = "db_log_level", long = "db-log-level", env = "DB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl std::fmt::Debug for DbArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.to_driver_config(), f)
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("db", &self.db)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_tls", &self.enable_tls)
            .field("tls_cert", &self.tls_cert)
            .field("tls_key", &self.tls_key)
            .field("kafka_brokers", &self.kafka_brokers)
            .field("kafka_group_id", &self.kafka_group_id)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("markdown_dir", &self.markdown_dir)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

fn minutes(value: Option<u64>) -> Option<Duration> {
    value.map(|m| Duration::from_secs(m.saturating_mul(60)))
}

impl DbArgs {
    pub fn to_driver_config(&self) -> DriverConfig {
        DriverConfig {
            driver: self.driver.clone(),
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.name.clone(),
            ssl_mode: self.ssl_mode.clone(),
            file_path: self.file.clone(),
            max_open_conns: self.max_conns,
            max_idle_conns: self.max_idle,
            conn_max_lifetime: minutes(self.conn_max_lifetime),
            conn_max_idle_time: minutes(self.conn_max_idle_time),
            auto_migrate: self.auto_migrate,
            log_level: self.log_level.clone(),
        }
    }
}

impl ServerConfig {
    /// Reject combinations clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enable_tls {
            if self.tls_cert.is_none() {
                return Err(ConfigError::MissingTlsFile("--tls-cert"));
            }
            if self.tls_key.is_none() {
                return Err(ConfigError::MissingTlsFile("--tls-key"));
            }
        }
        if self.db.driver.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "--db-driver",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Both TLS files, when TLS is on.
    pub fn tls_files(&self) -> Option<(PathBuf, PathBuf)> {
        if !self.enable_tls {
            return None;
        }
        Some((self.tls_cert.clone()?, self.tls_key.clone()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["myblog"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        let db = config.db.to_driver_config();
        assert_eq!(db.driver, "sqlite");
        assert_eq!(db.file_path, PathBuf::from("data/app.db"));
        assert!(db.auto_migrate);
        assert_eq!(config.kafka_group_id, "myblog-consumer-group");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_db_overrides() {
        let config = parse(&[
            "--db-driver",
            "postgres",
            "--db-port",
            "6543",
            "--db-conn-max-lifetime",
            "15",
            "--db-migrate",
            "false",
            "--kafka-brokers",
            "a:9092,b:9092",
        ]);
        let db = config.db.to_driver_config();
        assert_eq!(db.driver, "postgres");
        assert_eq!(db.port, Some(6543));
        assert_eq!(db.conn_max_lifetime, Some(Duration::from_secs(900)));
        assert!(!db.auto_migrate);
        assert_eq!(config.kafka_brokers, vec!["a:9092", "b:9092"]);
    }

    #[test]
    fn test_huge_minutes_saturate() {
        let max = u64::MAX.to_string();
        let config = parse(&["--db-conn-max-idle-time", max.as_str()]);
        let db = config.db.to_driver_config();
        assert_eq!(db.conn_max_idle_time, Some(Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn test_tls_requires_files() {
        let config = parse(&["--enable-tls", "--tls-cert", "cert.pem"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingTlsFile("--tls-key"))
        ));

        let config = parse(&["--enable-tls", "--tls-cert", "c.pem", "--tls-key", "k.pem"]);
        assert!(config.validate().is_ok());
        assert!(config.tls_files().is_some());
    }

    #[test]
    fn test_password_redacted() {
        let config = parse(&["--db-password", "hunter2", "--jwt-secret", "s3cret"]);
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("s3cret"));
    }
}
