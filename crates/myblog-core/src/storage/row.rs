//! Raw rows and timestamp conversion.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;

use crate::error::{BlogError, Result};
use crate::storage::types::{Article, User};

/// Format written to DATETIME columns; matches `CURRENT_TIMESTAMP`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts `CURRENT_TIMESTAMP` output, RFC 3339, and a bare date.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(BlogError::Storage(format!("Invalid timestamp: {}", value)))
}

pub const ARTICLE_COLUMNS: &str = "id, title, content, original_content, summary, author, tags, \
     category, status, file_path, visibility, is_scheduled, published_at, show_title, \
     created_at, updated_at";

/// Raw row data from the articles table.
#[derive(Debug)]
pub struct ArticleRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub original_content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub tags: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub file_path: Option<String>,
    pub visibility: Option<String>,
    pub is_scheduled: Option<bool>,
    pub published_at: Option<String>,
    pub show_title: Option<bool>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ArticleRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            original_content: row.get(3)?,
            summary: row.get(4)?,
            author: row.get(5)?,
            tags: row.get(6)?,
            category: row.get(7)?,
            status: row.get(8)?,
            file_path: row.get(9)?,
            visibility: row.get(10)?,
            is_scheduled: row.get(11)?,
            published_at: row.get(12)?,
            show_title: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

impl TryFrom<ArticleRow> for Article {
    type Error = BlogError;

    fn try_from(row: ArticleRow) -> Result<Self> {
        let tags: Vec<String> = match row.tags.as_deref() {
            Some(value) if !value.trim().is_empty() => serde_json::from_str(value)
                .map_err(|e| BlogError::Storage(format!("Invalid tags JSON: {}", e)))?,
            _ => Vec::new(),
        };
        let created_at = optional_timestamp(row.created_at.as_deref())?.unwrap_or_else(Utc::now);
        let updated_at = optional_timestamp(row.updated_at.as_deref())?.unwrap_or(created_at);

        Ok(Article {
            id: row.id,
            title: row.title,
            content: row.content,
            original_content: row.original_content,
            summary: row.summary.unwrap_or_default(),
            author: row.author.unwrap_or_default(),
            tags,
            category: row.category.unwrap_or_default(),
            status: row.status.unwrap_or_default(),
            file_path: row.file_path,
            visibility: row.visibility.unwrap_or_else(|| "public".to_string()),
            is_scheduled: row.is_scheduled.unwrap_or(false),
            published_at: optional_timestamp(row.published_at.as_deref())?,
            show_title: row.show_title.unwrap_or(true),
            created_at,
            updated_at,
        })
    }
}

pub const USER_COLUMNS: &str = "id, username, password, email, role, status, created_at, updated_at";

/// Raw row data from the users table.
#[derive(Debug)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl UserRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            email: row.get(3)?,
            role: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = BlogError;

    fn try_from(row: UserRow) -> Result<Self> {
        let created_at = optional_timestamp(row.created_at.as_deref())?.unwrap_or_else(Utc::now);
        let updated_at = optional_timestamp(row.updated_at.as_deref())?.unwrap_or(created_at);
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password,
            email: row.email,
            role: row.role.unwrap_or_else(|| "user".to_string()),
            status: row.status.unwrap_or_else(|| "active".to_string()),
            created_at,
            updated_at,
        })
    }
}

pub fn optional_timestamp(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(v) if !v.is_empty() => parse_timestamp(v).map(Some),
        _ => Ok(None),
    }
}
