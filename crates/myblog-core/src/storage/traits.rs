//! Repository contracts.
//!
//! One trait per entity. Lookups return `Ok(None)` for a missing row;
//! updates and deletes of a missing row return `BlogError::NotFound`.

use chrono::NaiveDate;

use super::types::{
    AboutMainCard, AboutSubCard, Article, ArticleFilter, Comment, NewArticle, NewComment,
    NewMainCard, NewSubCard, NewUser, Page, Paged, Setting, User, Visit,
};
use crate::error::Result;

pub trait ArticleRepository {
    fn get_article(&self, id: i64) -> Result<Option<Article>>;

    /// Newest first.
    fn list_articles(&self, filter: &ArticleFilter) -> Result<Paged<Article>>;

    /// Returns the new row id.
    ///
    /// # Errors
    ///
    /// Returns `BlogError::Conflict` when `file_path` is already taken.
    fn create_article(&self, article: &NewArticle) -> Result<i64>;

    fn update_article(&self, id: i64, article: &NewArticle) -> Result<()>;

    fn delete_article(&self, id: i64) -> Result<()>;

    fn find_article_by_file_path(&self, file_path: &str) -> Result<Option<Article>>;

    fn count_articles(&self) -> Result<u64>;
}

pub trait UserRepository {
    fn get_user(&self, id: i64) -> Result<Option<User>>;

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    fn list_users(&self, page: Page) -> Result<Paged<User>>;

    fn create_user(&self, user: &NewUser) -> Result<i64>;

    fn update_user_password(&self, id: i64, password_hash: &str) -> Result<()>;

    fn update_user_status(&self, id: i64, status: &str) -> Result<()>;

    fn delete_user(&self, id: i64) -> Result<()>;

    fn count_users(&self) -> Result<u64>;
}

pub trait SettingRepository {
    fn get_setting(&self, key: &str) -> Result<Option<Setting>>;

    fn list_settings(&self) -> Result<Vec<Setting>>;

    fn list_settings_by_category(&self, category: &str) -> Result<Vec<Setting>>;

    fn setting_keys(&self) -> Result<Vec<String>>;

    fn create_setting(&self, setting: &Setting) -> Result<()>;

    /// Change the value of an existing key.
    fn update_setting_value(&self, key: &str, value: &str) -> Result<()>;

    fn delete_setting(&self, key: &str) -> Result<()>;
}

pub trait AboutCardRepository {
    /// Main cards by sort order, each with its sub cards by sort order.
    fn list_cards(&self, enabled_only: bool) -> Result<Vec<AboutMainCard>>;

    fn create_main_card(&self, card: &NewMainCard) -> Result<i64>;

    fn create_sub_card(&self, main_card_id: i64, card: &NewSubCard) -> Result<i64>;

    fn get_sub_card(&self, id: i64) -> Result<Option<AboutSubCard>>;

    fn set_main_card_enabled(&self, id: i64, enabled: bool) -> Result<()>;

    /// Sub cards go with their parent.
    fn delete_main_card(&self, id: i64) -> Result<()>;

    fn count_main_cards(&self) -> Result<u64>;
}

pub trait CommentRepository {
    fn get_comment(&self, id: i64) -> Result<Option<Comment>>;

    /// Newest first.
    fn list_comments_for_article(&self, article_id: i64) -> Result<Vec<Comment>>;

    fn create_comment(&self, comment: &NewComment) -> Result<i64>;

    fn delete_comment(&self, id: i64) -> Result<()>;
}

pub trait VisitorRepository {
    /// Record a visit. Returns `false` when the IP was already counted that day.
    fn record_visit(&self, visit: &Visit) -> Result<bool>;

    fn count_visitors_on(&self, date: NaiveDate) -> Result<u64>;

    fn count_visitors(&self) -> Result<u64>;
}
