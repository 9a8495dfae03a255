use std::path::PathBuf;
use std::sync::Arc;

use myblog_core::auth::TokenService;
use myblog_core::crypto::EccSessionStore;
use myblog_core::Database;

/// Shared handles for request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tokens: Arc<TokenService>,
    pub sessions: Arc<EccSessionStore>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(db: Database, tokens: TokenService, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            db: Arc::new(db),
            tokens: Arc::new(tokens),
            sessions: Arc::new(EccSessionStore::new()),
            static_dir: static_dir.into(),
        }
    }
}
