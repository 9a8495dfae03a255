//! Name to driver lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use super::mysql::MysqlDriver;
use super::postgres::PostgresDriver;
use super::sqlite::SqliteDriver;
use super::Driver;
use crate::error::{BlogError, Result};

/// Consumer-side seam for driver lookup.
pub trait DriverResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Driver>>;
}

/// Registered drivers, keyed by name.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `sqlite`, `sqlite3`, `mysql`, `mariadb`, `postgres`
    /// and `pgsql`.
    pub fn with_builtin_drivers() -> Self {
        let registry = Self::new();
        let sqlite: Arc<dyn Driver> = Arc::new(SqliteDriver);
        let mysql: Arc<dyn Driver> = Arc::new(MysqlDriver);
        let postgres: Arc<dyn Driver> = Arc::new(PostgresDriver);
        registry.register("sqlite", Arc::clone(&sqlite));
        registry.register("sqlite3", sqlite);
        registry.register("mysql", Arc::clone(&mysql));
        registry.register("mariadb", mysql);
        registry.register("postgres", Arc::clone(&postgres));
        registry.register("pgsql", postgres);
        registry
    }

    /// Add a driver.
    ///
    /// # Panics
    ///
    /// Registering the same name twice is a programming error and panics.
    pub fn register(&self, name: &str, driver: Arc<dyn Driver>) {
        let mut drivers = self
            .drivers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if drivers.contains_key(name) {
            panic!("driver already registered: {}", name);
        }
        drivers.insert(name.to_string(), driver);
    }

    /// Registered names, sorted.
    pub fn available(&self) -> Vec<String> {
        let drivers = self
            .drivers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = drivers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl DriverResolver for DriverRegistry {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Driver>> {
        let drivers = self
            .drivers
            .read()
            .map_err(|_| BlogError::Internal("driver registry poisoned".to_string()))?;
        drivers
            .get(name)
            .cloned()
            .ok_or_else(|| BlogError::DriverNotFound(name.to_string()))
    }
}

static GLOBAL: Lazy<DriverRegistry> = Lazy::new(DriverRegistry::with_builtin_drivers);

/// Process-wide registry preloaded with the built-in drivers.
pub fn global() -> &'static DriverRegistry {
    &GLOBAL
}
