//! Markdown tree import.

use std::fs;
use std::path::Path;

use myblog_core::schema::markdown::import_markdown;
use myblog_core::schema::tables;
use myblog_core::storage::{ArticleRepository, SqliteStore};
use rusqlite::Connection;
use tempfile::TempDir;

fn database() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    tables::create_tables(&conn).unwrap();
    tables::create_indexes(&conn);
    conn
}

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn test_import_matching_title() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "2024/01/02/Hello.md", "# Hello\n\nFirst post.\n");
    let conn = database();

    let report = import_markdown(&conn, dir.path()).unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.renamed, 0);

    let store = SqliteStore::new(&conn);
    let article = store.find_article_by_file_path("2024/01/02/Hello").unwrap().unwrap();
    assert_eq!(article.title, "Hello");
    assert_eq!(article.created_at.format("%Y-%m-%d").to_string(), "2024-01-02");
    assert_eq!(article.visibility, "public");
    assert!(!article.is_scheduled);
    assert_eq!(article.original_content.as_deref(), Some("# Hello\n\nFirst post.\n"));
    assert!(article.content.contains("<h1>Hello</h1>"));
    assert_eq!(article.summary, "Hello\nFirst post.");
}

#[test]
fn test_import_renames_to_title() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "2024/03/04/draft.md", "# Real: Title\nbody\n");
    let conn = database();

    let report = import_markdown(&conn, dir.path()).unwrap();
    assert_eq!(report.renamed, 1);

    let day = dir.path().join("2024/03/04");
    assert!(!day.join("draft.md").exists());
    assert!(day.join("Real_ Title.md").exists());

    let store = SqliteStore::new(&conn);
    let article = store.find_article_by_file_path("2024/03/04/Real_ Title").unwrap().unwrap();
    assert_eq!(article.title, "Real: Title");
}

#[test]
fn test_import_rename_collision_appends_timestamp() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "2024/03/04/a.md", "# Same\none\n");
    write(dir.path(), "2024/03/04/Same.md", "# Same\ntwo\n");
    let conn = database();

    let report = import_markdown(&conn, dir.path()).unwrap();
    assert_eq!(report.imported, 2);
    assert_eq!(report.renamed, 1);

    let names: Vec<String> = fs::read_dir(dir.path().join("2024/03/04"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n.starts_with("Same-") && n.ends_with(".md")));
    assert!(names.iter().any(|n| n == "Same.md"));
}

#[test]
fn test_import_repeated_collisions_keep_every_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "2024/01/02/Same.md", "# Same\nzero\n");
    write(dir.path(), "2024/01/02/a.md", "# Same\none\n");
    write(dir.path(), "2024/01/02/b.md", "# Same\ntwo\n");
    let conn = database();

    let report = import_markdown(&conn, dir.path()).unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(report.renamed, 2);
    assert_eq!(report.failed, 0);

    let mut bodies: Vec<String> = fs::read_dir(dir.path().join("2024/01/02"))
        .unwrap()
        .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
        .collect();
    bodies.sort();
    assert_eq!(bodies, vec!["# Same\none\n", "# Same\ntwo\n", "# Same\nzero\n"]);
    assert_eq!(SqliteStore::new(&conn).count_articles().unwrap(), 3);
}

#[test]
fn test_import_skips_taken_fallback_name() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "2024/01/02/Same.md", "# Same\nzero\n");
    write(dir.path(), "2024/01/02/a.md", "# Same\none\n");
    // Occupy the timestamped name for this second and the next.
    let now = chrono::Utc::now();
    for offset in 0..2 {
        let stamp = (now + chrono::Duration::seconds(offset)).format("%Y%m%d-%H%M%S");
        let taken = dir.path().join(format!("2024/01/02/Same-{}.md", stamp));
        fs::create_dir_all(&taken).unwrap();
    }
    let conn = database();

    let report = import_markdown(&conn, dir.path()).unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.renamed, 1);
    assert!(!dir.path().join("2024/01/02/a.md").exists());

    let renamed: Vec<String> = fs::read_dir(dir.path().join("2024/01/02"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "md"))
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();
    assert!(renamed.contains(&"# Same\none\n".to_string()));
    assert!(renamed.contains(&"# Same\nzero\n".to_string()));
}

#[test]
fn test_import_rejects_wrong_depth() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "stray.md", "# Stray\n");
    write(dir.path(), "2024/01/loose.md", "# Loose\n");
    write(dir.path(), "2024/01/02/extra/deep.md", "# Deep\n");
    write(dir.path(), "2024/01/02/notes.txt", "ignored");
    let conn = database();

    let report = import_markdown(&conn, dir.path()).unwrap();
    assert_eq!(report.imported, 0);
    assert_eq!(report.rejected.len(), 3);
    assert_eq!(SqliteStore::new(&conn).count_articles().unwrap(), 0);
}

#[test]
fn test_import_bad_date_falls_back_to_now() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "2024/13/45/Odd.md", "# Odd\n");
    let conn = database();

    import_markdown(&conn, dir.path()).unwrap();
    let article = SqliteStore::new(&conn)
        .find_article_by_file_path("2024/13/45/Odd")
        .unwrap()
        .unwrap();
    assert!(chrono::Utc::now() - article.created_at < chrono::Duration::minutes(5));
}

#[test]
fn test_import_skipped_when_articles_exist() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "2024/01/02/Hello.md", "# Hello\n");
    let conn = database();

    assert_eq!(import_markdown(&conn, dir.path()).unwrap().imported, 1);
    write(dir.path(), "2024/01/03/Again.md", "# Again\n");
    assert_eq!(import_markdown(&conn, dir.path()).unwrap().imported, 0);
    assert_eq!(SqliteStore::new(&conn).count_articles().unwrap(), 1);
}

#[test]
fn test_import_missing_directory() {
    let dir = TempDir::new().unwrap();
    let conn = database();
    let report = import_markdown(&conn, &dir.path().join("absent")).unwrap();
    assert_eq!(report.imported, 0);
}
