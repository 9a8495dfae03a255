//! Schema migration and baseline content.
//!
//! [`bootstrap`] is idempotent: it can run on an empty database, an older
//! schema, or an already current one. Only table creation and admin
//! creation are fatal; every other phase logs and carries on.

pub mod markdown;
pub mod seed;
pub mod tables;

use std::path::PathBuf;

use rusqlite::Connection;

use crate::error::Result;

pub use markdown::{import_markdown, ImportReport};

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Root of the `<year>/<month>/<day>/<title>.md` tree, if any
    pub markdown_dir: Option<PathBuf>,
    pub seed_admin: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            markdown_dir: Some(PathBuf::from("markdown")),
            seed_admin: true,
        }
    }
}

/// What a bootstrap run changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub columns_added: usize,
    pub index_failures: usize,
    pub settings_inserted: usize,
    pub about_cards_seeded: bool,
    pub markdown: ImportReport,
    pub admin_created: bool,
}

pub fn bootstrap(conn: &Connection, options: &BootstrapOptions) -> Result<BootstrapReport> {
    let mut report = BootstrapReport::default();

    tables::create_tables(conn)?;
    report.columns_added = tables::add_missing_columns(conn);
    report.index_failures = tables::create_indexes(conn);

    match seed::seed_settings(conn) {
        Ok(n) => report.settings_inserted = n,
        Err(e) => tracing::warn!(error = %e, "failed to seed default settings"),
    }

    match seed::seed_about_cards(conn) {
        Ok(seeded) => report.about_cards_seeded = seeded,
        Err(e) => tracing::warn!(error = %e, "failed to seed about cards"),
    }

    if let Some(dir) = &options.markdown_dir {
        match import_markdown(conn, dir) {
            Ok(imported) => report.markdown = imported,
            Err(e) => tracing::warn!(error = %e, "failed to import markdown files"),
        }
    }

    if options.seed_admin {
        report.admin_created = seed::seed_admin(conn)?;
    }

    tracing::info!(
        columns_added = report.columns_added,
        index_failures = report.index_failures,
        settings_inserted = report.settings_inserted,
        about_cards_seeded = report.about_cards_seeded,
        articles_imported = report.markdown.imported,
        admin_created = report.admin_created,
        "database bootstrap complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_markdown() -> BootstrapOptions {
        BootstrapOptions {
            markdown_dir: None,
            seed_admin: true,
        }
    }

    #[test]
    fn test_bootstrap_twice() {
        let conn = Connection::open_in_memory().unwrap();

        let first = bootstrap(&conn, &no_markdown()).unwrap();
        assert_eq!(first.settings_inserted, seed::BASELINE_SETTINGS.len());
        assert!(first.about_cards_seeded);
        assert!(first.admin_created);
        assert_eq!(first.index_failures, 0);

        let second = bootstrap(&conn, &no_markdown()).unwrap();
        assert_eq!(second, BootstrapReport::default());
    }

    #[test]
    fn test_bootstrap_without_admin() {
        let conn = Connection::open_in_memory().unwrap();
        let options = BootstrapOptions {
            markdown_dir: None,
            seed_admin: false,
        };
        assert!(!bootstrap(&conn, &options).unwrap().admin_created);
        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(users, 0);
    }
}
