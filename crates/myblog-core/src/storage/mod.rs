//! Persistence of blog entities.

mod row;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use row::{format_timestamp, parse_timestamp, TIMESTAMP_FORMAT};
pub use sqlite::SqliteStore;
pub use traits::{
    AboutCardRepository, ArticleRepository, CommentRepository, SettingRepository,
    UserRepository, VisitorRepository,
};
pub use types::*;
