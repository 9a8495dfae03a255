//! DDL for the blog schema.

use rusqlite::Connection;

use crate::error::{BlogError, Result};

/// Tables, in creation order (parents before children).
pub const TABLES: &[(&str, &str)] = &[
    (
        "articles",
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            original_content TEXT,
            summary TEXT,
            author TEXT DEFAULT '管理员',
            tags TEXT DEFAULT '[]',
            category TEXT DEFAULT '未分类',
            status TEXT DEFAULT 'published',
            file_path TEXT,
            visibility TEXT DEFAULT 'public',
            is_scheduled INTEGER DEFAULT 0,
            published_at DATETIME,
            show_title INTEGER DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            email TEXT UNIQUE,
            role TEXT DEFAULT 'user',
            status TEXT DEFAULT 'active',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "visitors",
        r#"
        CREATE TABLE IF NOT EXISTS visitors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip TEXT NOT NULL,
            user_agent TEXT,
            visit_date DATE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "article_views",
        r#"
        CREATE TABLE IF NOT EXISTS article_views (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id INTEGER NOT NULL,
            ip TEXT NOT NULL,
            user_agent TEXT,
            country TEXT DEFAULT '',
            city TEXT DEFAULT '',
            region TEXT DEFAULT '',
            view_date DATE NOT NULL,
            view_time DATETIME DEFAULT CURRENT_TIMESTAMP,
            duration INTEGER DEFAULT 0,
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "comments",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            content TEXT NOT NULL,
            article_id INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "settings",
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL UNIQUE,
            value TEXT,
            type TEXT DEFAULT 'string',
            description TEXT,
            category TEXT DEFAULT 'system',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "about_main_cards",
        r#"
        CREATE TABLE IF NOT EXISTS about_main_cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            icon TEXT DEFAULT '',
            layout_type TEXT DEFAULT 'default',
            custom_css TEXT DEFAULT '',
            sort_order INTEGER DEFAULT 0,
            is_enabled INTEGER DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "about_sub_cards",
        r#"
        CREATE TABLE IF NOT EXISTS about_sub_cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            main_card_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT DEFAULT '',
            icon TEXT DEFAULT '',
            link_url TEXT DEFAULT '',
            layout_type TEXT DEFAULT 'default',
            custom_css TEXT DEFAULT '',
            sort_order INTEGER DEFAULT 0,
            is_enabled INTEGER DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (main_card_id) REFERENCES about_main_cards(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "categories",
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT DEFAULT '',
            icon TEXT DEFAULT '',
            sort_order INTEGER DEFAULT 0,
            is_enabled INTEGER DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "tags",
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT DEFAULT '',
            color TEXT DEFAULT '#007bff',
            category_id INTEGER,
            sort_order INTEGER DEFAULT 0,
            is_enabled INTEGER DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "attachments",
        r#"
        CREATE TABLE IF NOT EXISTS attachments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_name TEXT NOT NULL,
            stored_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            file_type TEXT NOT NULL,
            content_type TEXT,
            file_size INTEGER DEFAULT 0,
            article_id INTEGER,
            visibility TEXT DEFAULT 'public',
            show_in_passage INTEGER DEFAULT 1,
            uploaded_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "music_tracks",
        r#"
        CREATE TABLE IF NOT EXISTS music_tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            artist TEXT DEFAULT '',
            file_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            duration TEXT DEFAULT '',
            cover_image TEXT DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
];

/// Columns added after the first release, as `(table, column, definition)`.
pub const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("articles", "original_content", "TEXT"),
    ("articles", "file_path", "TEXT"),
    ("articles", "category", "TEXT DEFAULT '未分类'"),
    ("articles", "visibility", "TEXT DEFAULT 'public'"),
    ("articles", "is_scheduled", "INTEGER DEFAULT 0"),
    ("articles", "published_at", "DATETIME"),
    ("articles", "show_title", "INTEGER DEFAULT 1"),
    ("attachments", "visibility", "TEXT DEFAULT 'public'"),
    ("attachments", "show_in_passage", "INTEGER DEFAULT 1"),
    ("music_tracks", "cover_image", "TEXT DEFAULT ''"),
];

pub const INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_file_path ON articles(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status)",
    "CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category)",
    "CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_articles_status_created ON articles(status, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_articles_category_status ON articles(category, status)",
    "CREATE INDEX IF NOT EXISTS idx_articles_visibility ON articles(visibility)",
    "CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at)",
    "CREATE INDEX IF NOT EXISTS idx_articles_scheduled ON articles(is_scheduled, published_at)",
    "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)",
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_visitors_ip_date ON visitors(ip, visit_date)",
    "CREATE INDEX IF NOT EXISTS idx_visitors_date ON visitors(visit_date)",
    "CREATE INDEX IF NOT EXISTS idx_article_views_article_id ON article_views(article_id)",
    "CREATE INDEX IF NOT EXISTS idx_article_views_article_date ON article_views(article_id, view_date)",
    "CREATE INDEX IF NOT EXISTS idx_article_views_ip_date ON article_views(ip, view_date)",
    "CREATE INDEX IF NOT EXISTS idx_article_views_date ON article_views(view_date)",
    "CREATE INDEX IF NOT EXISTS idx_article_views_country ON article_views(country)",
    "CREATE INDEX IF NOT EXISTS idx_article_views_city_region ON article_views(city, region)",
    "CREATE INDEX IF NOT EXISTS idx_comments_article_id ON comments(article_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_article_created ON comments(article_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_comments_created_at ON comments(created_at)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_settings_key ON settings(key)",
    "CREATE INDEX IF NOT EXISTS idx_settings_category ON settings(category)",
    "CREATE INDEX IF NOT EXISTS idx_about_main_cards_sort ON about_main_cards(sort_order)",
    "CREATE INDEX IF NOT EXISTS idx_about_sub_cards_main_id ON about_sub_cards(main_card_id)",
    "CREATE INDEX IF NOT EXISTS idx_about_sub_cards_sort ON about_sub_cards(main_card_id, sort_order)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_name ON categories(name)",
    "CREATE INDEX IF NOT EXISTS idx_categories_sort ON categories(sort_order)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_name ON tags(name)",
    "CREATE INDEX IF NOT EXISTS idx_tags_category ON tags(category_id)",
    "CREATE INDEX IF NOT EXISTS idx_tags_sort ON tags(sort_order)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_article_id ON attachments(article_id)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_type ON attachments(file_type)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_visibility ON attachments(visibility)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_uploaded_at ON attachments(uploaded_at)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_article_visibility ON attachments(article_id, visibility)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_show_in_passage ON attachments(show_in_passage)",
    "CREATE INDEX IF NOT EXISTS idx_music_tracks_created_at ON music_tracks(created_at)",
];

/// Create every table. Any failure is fatal.
pub fn create_tables(conn: &Connection) -> Result<()> {
    for (name, ddl) in TABLES {
        conn.execute_batch(ddl)
            .map_err(|e| BlogError::Storage(format!("failed to create table {}: {}", name, e)))?;
    }
    Ok(())
}

/// Add late columns. "duplicate column name" is expected on current
/// schemas; anything else is logged. Returns how many columns were added.
pub fn add_missing_columns(conn: &Connection) -> usize {
    let mut added = 0;
    for (table, column, definition) in ADDED_COLUMNS {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
        match conn.execute_batch(&sql) {
            Ok(()) => {
                tracing::info!(table, column, "added column");
                added += 1;
            }
            Err(e) if e.to_string().contains("duplicate column name") => {}
            Err(e) => tracing::warn!(table, column, error = %e, "failed to add column"),
        }
    }
    added
}

/// Create indexes, logging failures. Returns how many statements failed.
pub fn create_indexes(conn: &Connection) -> usize {
    let mut failed = 0;
    for sql in INDEXES {
        if let Err(e) = conn.execute_batch(sql) {
            tracing::warn!(statement = sql, error = %e, "failed to create index");
            failed += 1;
        }
    }
    failed
}
