//! # MyBlog Server
//!
//! HTTP front end for [`myblog_core`]: configuration, logging, the
//! response envelope, the static file gate, and the auth endpoints.

pub mod config;
pub mod extract;
pub mod logging;
pub mod response;
pub mod routes;
pub mod state;
pub mod static_files;

pub use config::ServerConfig;
pub use routes::router;
pub use state::AppState;
