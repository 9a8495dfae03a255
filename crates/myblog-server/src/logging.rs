//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter directive for `level`, with the database layer at `db_level`.
pub fn directive(level: &str, db_level: &str) -> String {
    format!("{},myblog_core::db={}", level, db_level)
}

/// Install the global subscriber. `RUST_LOG` wins over the given levels.
/// A second call is a no-op.
pub fn init(level: &str, db_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive(level, db_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_parses() {
        let directive = directive("debug", "warn");
        assert_eq!(directive, "debug,myblog_core::db=warn");
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}
