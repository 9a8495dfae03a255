//! Domain types persisted by the repositories.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A blog article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,

    /// Rendered HTML
    pub content: String,

    /// Markdown source, when imported or edited as markdown
    pub original_content: Option<String>,

    pub summary: String,
    pub author: String,
    pub tags: Vec<String>,
    pub category: String,
    pub status: String,

    /// Path relative to the markdown root, without extension
    pub file_path: Option<String>,

    pub visibility: String,
    pub is_scheduled: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub show_title: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating or replacing an article.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub original_content: Option<String>,
    pub summary: String,
    pub author: String,
    pub tags: Vec<String>,
    pub category: String,
    pub status: String,
    pub file_path: Option<String>,
    pub visibility: String,
    pub is_scheduled: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub show_title: bool,

    /// Defaults to now when absent
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for NewArticle {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            original_content: None,
            summary: String::new(),
            author: "管理员".to_string(),
            tags: Vec::new(),
            category: "未分类".to_string(),
            status: "published".to_string(),
            file_path: None,
            visibility: "public".to_string(),
            is_scheduled: false,
            published_at: None,
            show_title: true,
            created_at: None,
        }
    }
}

/// Article listing filter.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    pub visibility: Option<String>,
    pub page: Page,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl Page {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub role: String,
    pub status: String,
}

/// A key/value setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AboutMainCard {
    pub id: i64,
    pub title: String,
    pub icon: String,
    pub layout_type: String,
    pub custom_css: String,
    pub sort_order: i64,
    pub is_enabled: bool,
    pub sub_cards: Vec<AboutSubCard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AboutSubCard {
    pub id: i64,
    pub main_card_id: i64,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub link_url: String,
    pub layout_type: String,
    pub custom_css: String,
    pub sort_order: i64,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMainCard {
    pub title: String,
    pub icon: String,
    pub layout_type: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewSubCard {
    pub title: String,
    pub description: String,
    pub icon: String,
    pub link_url: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: i64,
    pub username: String,
    pub content: String,
    pub article_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub username: String,
    pub content: String,
    pub article_id: i64,
}

/// One visitor per IP per day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub ip: String,
    pub user_agent: String,
    pub visit_date: NaiveDate,
}
