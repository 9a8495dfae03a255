//! # MyBlog Core
//!
//! Security and persistence foundation for the MyBlog backend.
//!
//! This crate holds everything below the HTTP layer: credential hashing,
//! session tokens, the ECDH/AES-GCM envelope used to ship secrets from the
//! browser, the pluggable SQL driver layer, schema bootstrap and seeding,
//! and the per-entity repositories.
//!
//! ## Architecture
//!
//! - **auth**: Argon2id password hashes, HMAC session tokens, login
//! - **crypto**: P-256 key pairs, hybrid encryption, session store
//! - **db**: driver registry, DSNs, connection pool
//! - **schema**: DDL, column back-fill, seeding, markdown import
//! - **storage**: repository traits and their SQLite implementation

pub mod auth;
pub mod crypto;
pub mod db;
pub mod error;
pub mod fs;
pub mod schema;
pub mod storage;

pub use db::{Database, DriverConfig};
pub use error::{BlogError, ErrorKind, Result, ResultExt, TokenError};
pub use schema::{BootstrapOptions, BootstrapReport};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
