//! SQLite implementation of the repositories.
//!
//! `SqliteStore` borrows a connection, so it is built inside
//! [`crate::db::Database::interact`] closures or over a plain connection
//! in tests.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::row::{
    format_timestamp, parse_timestamp, ArticleRow, UserRow, ARTICLE_COLUMNS, USER_COLUMNS,
};
use super::traits::{
    AboutCardRepository, ArticleRepository, CommentRepository, SettingRepository,
    UserRepository, VisitorRepository,
};
use super::types::{
    AboutMainCard, AboutSubCard, Article, ArticleFilter, Comment, NewArticle, NewComment,
    NewMainCard, NewSubCard, NewUser, Page, Paged, Setting, User, Visit,
};
use crate::error::{BlogError, Result};

/// Repositories over one borrowed connection.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    fn expect_changed(changed: usize, what: &str, id: impl std::fmt::Display) -> Result<()> {
        if changed == 0 {
            return Err(BlogError::NotFound(format!("{} {}", what, id)));
        }
        Ok(())
    }
}

fn tags_json(tags: &[String]) -> Result<String> {
    Ok(serde_json::to_string(tags)?)
}

impl ArticleRepository for SqliteStore<'_> {
    fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS);
        self.conn
            .query_row(&sql, [id], ArticleRow::from_row)
            .optional()?
            .map(Article::try_from)
            .transpose()
    }

    fn list_articles(&self, filter: &ArticleFilter) -> Result<Paged<Article>> {
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();
        for (column, value) in [
            ("status", &filter.status),
            ("category", &filter.category),
            ("visibility", &filter.visibility),
        ] {
            if let Some(value) = value {
                args.push(value.clone());
                clauses.push(format!("{} = ?{}", column, args.len()));
            }
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM articles{}", where_sql),
            rusqlite::params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM articles{} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            ARTICLE_COLUMNS,
            where_sql,
            filter.page.limit,
            filter.page.offset()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), ArticleRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let items = rows
            .into_iter()
            .map(Article::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Paged {
            items,
            total: total.max(0) as u64,
        })
    }

    fn create_article(&self, article: &NewArticle) -> Result<i64> {
        let now = Utc::now();
        let created_at = article.created_at.unwrap_or(now);
        self.conn.execute(
            r#"
            INSERT INTO articles (title, content, original_content, summary, author, tags,
                category, status, file_path, visibility, is_scheduled, published_at,
                show_title, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                article.title,
                article.content,
                article.original_content,
                article.summary,
                article.author,
                tags_json(&article.tags)?,
                article.category,
                article.status,
                article.file_path,
                article.visibility,
                article.is_scheduled,
                article.published_at.as_ref().map(format_timestamp),
                article.show_title,
                format_timestamp(&created_at),
                format_timestamp(&now),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_article(&self, id: i64, article: &NewArticle) -> Result<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE articles SET title = ?1, content = ?2, original_content = ?3, summary = ?4,
                author = ?5, tags = ?6, category = ?7, status = ?8, file_path = ?9,
                visibility = ?10, is_scheduled = ?11, published_at = ?12, show_title = ?13,
                updated_at = ?14
            WHERE id = ?15
            "#,
            params![
                article.title,
                article.content,
                article.original_content,
                article.summary,
                article.author,
                tags_json(&article.tags)?,
                article.category,
                article.status,
                article.file_path,
                article.visibility,
                article.is_scheduled,
                article.published_at.as_ref().map(format_timestamp),
                article.show_title,
                format_timestamp(&Utc::now()),
                id,
            ],
        )?;
        Self::expect_changed(changed, "article", id)
    }

    fn delete_article(&self, id: i64) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM articles WHERE id = ?1", [id])?;
        Self::expect_changed(changed, "article", id)
    }

    fn find_article_by_file_path(&self, file_path: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE file_path = ?1", ARTICLE_COLUMNS);
        self.conn
            .query_row(&sql, [file_path], ArticleRow::from_row)
            .optional()?
            .map(Article::try_from)
            .transpose()
    }

    fn count_articles(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM articles")
    }
}

impl UserRepository for SqliteStore<'_> {
    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        self.conn
            .query_row(&sql, [id], UserRow::from_row)
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
        self.conn
            .query_row(&sql, [username], UserRow::from_row)
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    fn list_users(&self, page: Page) -> Result<Paged<User>> {
        let total = self.count("SELECT COUNT(*) FROM users")?;
        let sql = format!(
            "SELECT {} FROM users ORDER BY id LIMIT {} OFFSET {}",
            USER_COLUMNS,
            page.limit,
            page.offset()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], UserRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let items = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Paged { items, total })
    }

    fn create_user(&self, user: &NewUser) -> Result<i64> {
        let now = format_timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO users (username, password, email, role, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                user.username,
                user.password_hash,
                user.email,
                user.role,
                user.status,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_user_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE users SET password = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, format_timestamp(&Utc::now()), id],
        )?;
        Self::expect_changed(changed, "user", id)
    }

    fn update_user_status(&self, id: i64, status: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, format_timestamp(&Utc::now()), id],
        )?;
        Self::expect_changed(changed, "user", id)
    }

    fn delete_user(&self, id: i64) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Self::expect_changed(changed, "user", id)
    }

    fn count_users(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM users")
    }
}

fn setting_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Setting> {
    Ok(Setting {
        key: row.get(0)?,
        value: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        setting_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

const SETTING_COLUMNS: &str = "key, value, type, description, category";

impl SettingRepository for SqliteStore<'_> {
    fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        let sql = format!("SELECT {} FROM settings WHERE key = ?1", SETTING_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [key], setting_from_row)
            .optional()?)
    }

    fn list_settings(&self) -> Result<Vec<Setting>> {
        let sql = format!("SELECT {} FROM settings ORDER BY category, key", SETTING_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], setting_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_settings_by_category(&self, category: &str) -> Result<Vec<Setting>> {
        let sql = format!(
            "SELECT {} FROM settings WHERE category = ?1 ORDER BY key",
            SETTING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([category], setting_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn setting_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM settings")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    fn create_setting(&self, setting: &Setting) -> Result<()> {
        let now = format_timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO settings (key, value, type, description, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                setting.key,
                setting.value,
                setting.setting_type,
                setting.description,
                setting.category,
                now
            ],
        )?;
        Ok(())
    }

    fn update_setting_value(&self, key: &str, value: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE settings SET value = ?1, updated_at = ?2 WHERE key = ?3",
            params![value, format_timestamp(&Utc::now()), key],
        )?;
        Self::expect_changed(changed, "setting", key)
    }

    fn delete_setting(&self, key: &str) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Self::expect_changed(changed, "setting", key)
    }
}

fn sub_card_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AboutSubCard> {
    Ok(AboutSubCard {
        id: row.get(0)?,
        main_card_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        icon: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        link_url: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        layout_type: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        custom_css: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        sort_order: row.get::<_, Option<i64>>(8)?.unwrap_or_default(),
        is_enabled: row.get::<_, Option<bool>>(9)?.unwrap_or(true),
    })
}

const SUB_CARD_COLUMNS: &str =
    "id, main_card_id, title, description, icon, link_url, layout_type, custom_css, sort_order, is_enabled";

impl AboutCardRepository for SqliteStore<'_> {
    fn list_cards(&self, enabled_only: bool) -> Result<Vec<AboutMainCard>> {
        let filter = if enabled_only { " WHERE is_enabled = 1" } else { "" };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, title, icon, layout_type, custom_css, sort_order, is_enabled
             FROM about_main_cards{} ORDER BY sort_order, id",
            filter
        ))?;
        let mut cards = stmt
            .query_map([], |row| {
                Ok(AboutMainCard {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    icon: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    layout_type: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    custom_css: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    sort_order: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
                    is_enabled: row.get::<_, Option<bool>>(6)?.unwrap_or(true),
                    sub_cards: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut sub_stmt = self.conn.prepare(&format!(
            "SELECT {} FROM about_sub_cards WHERE main_card_id = ?1{} ORDER BY sort_order, id",
            SUB_CARD_COLUMNS,
            if enabled_only { " AND is_enabled = 1" } else { "" }
        ))?;
        for card in &mut cards {
            card.sub_cards = sub_stmt
                .query_map([card.id], sub_card_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
        }
        Ok(cards)
    }

    fn create_main_card(&self, card: &NewMainCard) -> Result<i64> {
        let now = format_timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO about_main_cards (title, icon, layout_type, custom_css, sort_order, is_enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, '', ?4, 1, ?5, ?5)",
            params![card.title, card.icon, card.layout_type, card.sort_order, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_sub_card(&self, main_card_id: i64, card: &NewSubCard) -> Result<i64> {
        let now = format_timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO about_sub_cards (main_card_id, title, description, icon, link_url, layout_type, custom_css, sort_order, is_enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'default', '', ?6, 1, ?7, ?7)",
            params![
                main_card_id,
                card.title,
                card.description,
                card.icon,
                card.link_url,
                card.sort_order,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_sub_card(&self, id: i64) -> Result<Option<AboutSubCard>> {
        let sql = format!("SELECT {} FROM about_sub_cards WHERE id = ?1", SUB_CARD_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [id], sub_card_from_row)
            .optional()?)
    }

    fn set_main_card_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE about_main_cards SET is_enabled = ?1, updated_at = ?2 WHERE id = ?3",
            params![enabled, format_timestamp(&Utc::now()), id],
        )?;
        Self::expect_changed(changed, "about card", id)
    }

    fn delete_main_card(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM about_main_cards WHERE id = ?1", [id])?;
        Self::expect_changed(changed, "about card", id)
    }

    fn count_main_cards(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM about_main_cards")
    }
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Comment, Option<String>)> {
    Ok((
        Comment {
            id: row.get(0)?,
            username: row.get(1)?,
            content: row.get(2)?,
            article_id: row.get(3)?,
            created_at: Utc::now(),
        },
        row.get(4)?,
    ))
}

fn finish_comment((mut comment, created_at): (Comment, Option<String>)) -> Result<Comment> {
    if let Some(ts) = created_at.as_deref().filter(|ts| !ts.is_empty()) {
        comment.created_at = parse_timestamp(ts)?;
    }
    Ok(comment)
}

impl CommentRepository for SqliteStore<'_> {
    fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        self.conn
            .query_row(
                "SELECT id, username, content, article_id, created_at FROM comments WHERE id = ?1",
                [id],
                comment_from_row,
            )
            .optional()?
            .map(finish_comment)
            .transpose()
    }

    fn list_comments_for_article(&self, article_id: i64) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, content, article_id, created_at FROM comments
             WHERE article_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([article_id], comment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(finish_comment).collect()
    }

    fn create_comment(&self, comment: &NewComment) -> Result<i64> {
        if comment.content.trim().is_empty() {
            return Err(BlogError::BadRequest("comment is empty".to_string()));
        }
        let now = format_timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO comments (username, content, article_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![comment.username, comment.content, comment.article_id, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_comment(&self, id: i64) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
        Self::expect_changed(changed, "comment", id)
    }
}

impl VisitorRepository for SqliteStore<'_> {
    fn record_visit(&self, visit: &Visit) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO visitors (ip, user_agent, visit_date) VALUES (?1, ?2, ?3)",
            params![
                visit.ip,
                visit.user_agent,
                visit.visit_date.format("%Y-%m-%d").to_string()
            ],
        )?;
        Ok(inserted > 0)
    }

    fn count_visitors_on(&self, date: NaiveDate) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM visitors WHERE visit_date = ?1",
            [date.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }

    fn count_visitors(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM visitors")
    }
}
