//! Import of the `<year>/<month>/<day>/<title>.md` tree into articles.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::error::{BlogError, Result};
use crate::storage::{ArticleRepository, NewArticle, SqliteStore};

pub const UNTITLED: &str = "未命名文档";

/// year / month / day / file
pub const FILE_DEPTH: usize = 4;

const SUMMARY_CHARS: usize = 100;

const UNSAFE_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub renamed: usize,

    /// Markdown files found outside the year/month/day layout
    pub rejected: Vec<PathBuf>,

    pub failed: usize,
}

/// First line starting with `# `, without the marker.
pub fn extract_title(markdown: &str) -> String {
    markdown
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// CommonMark plus tables, strikethrough, task lists and footnotes.
/// Soft breaks render as `<br />`.
pub fn render_markdown(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Plain text of `html`, cut to 100 characters with a trailing ellipsis.
pub fn summarize(html: &str) -> String {
    let text = TAG_RE.replace_all(html, "");
    let text = text.trim();
    if text.chars().count() > SUMMARY_CHARS {
        let mut cut: String = text.chars().take(SUMMARY_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Midnight UTC of the date named by the first three components.
fn date_from_components(parts: &[&str]) -> Option<DateTime<Utc>> {
    let [year, month, day, ..] = parts else {
        return None;
    };
    NaiveDate::parse_from_str(&format!("{}-{}-{}", year, month, day), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Root-relative path with `/` separators and no extension.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("md")
}

/// Import every markdown file under `root` when the articles table is empty.
///
/// A missing `root` is not an error. Files at the wrong depth are listed in
/// [`ImportReport::rejected`]; a file that fails to import is logged and
/// counted.
pub fn import_markdown(conn: &Connection, root: &Path) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    if !root.is_dir() {
        tracing::info!(dir = %root.display(), "markdown directory not found");
        return Ok(report);
    }

    let store = SqliteStore::new(conn);
    if store.count_articles()? > 0 {
        tracing::debug!("articles present, skipping markdown import");
        return Ok(report);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read markdown directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }
        if entry.depth() != FILE_DEPTH {
            tracing::warn!(path = %entry.path().display(), depth = entry.depth(), "markdown file outside year/month/day layout");
            report.rejected.push(entry.into_path());
            continue;
        }
        files.push(entry.into_path());
    }

    for path in files {
        match import_file(&store, root, &path) {
            Ok(renamed) => {
                report.imported += 1;
                if renamed {
                    report.renamed += 1;
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to import markdown file");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Returns whether the file was renamed to match its title.
fn import_file(store: &SqliteStore<'_>, root: &Path, path: &Path) -> Result<bool> {
    let bytes = fs::read(path)
        .map_err(|e| BlogError::Storage(format!("failed to read {}: {}", path.display(), e)))?;
    let markdown = String::from_utf8_lossy(&bytes).into_owned();

    let title = extract_title(&markdown);
    let content = render_markdown(&markdown);
    let summary = summarize(&content);

    let key = relative_key(root, path)
        .ok_or_else(|| BlogError::Internal(format!("{} is outside {}", path.display(), root.display())))?;
    let parts: Vec<&str> = key.split('/').collect();
    let created_at = date_from_components(&parts).unwrap_or_else(Utc::now);
    let stem = parts.last().copied().unwrap_or_default();

    let mut final_path = path.to_path_buf();
    let mut renamed = false;
    let wanted = sanitize_title(&title);
    if wanted != stem {
        match crate::fs::rename_no_clobber(path, &wanted, "md") {
            Ok(moved) => {
                tracing::info!(from = %path.display(), to = %moved.display(), "renamed markdown file");
                final_path = moved;
                renamed = true;
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to rename markdown file"),
        }
    }
    let file_path = relative_key(root, &final_path).unwrap_or(key);

    let article = NewArticle {
        title,
        content,
        original_content: Some(markdown),
        summary,
        file_path: Some(file_path),
        created_at: Some(created_at),
        ..NewArticle::default()
    };
    store.create_article(&article)?;

    tracing::info!(path = %final_path.display(), date = %created_at.format("%Y-%m-%d"), "imported markdown file");
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title("intro\n  # Hello World  \n# Second"), "Hello World");
        assert_eq!(extract_title("## Not a title\ntext"), UNTITLED);
        assert_eq!(extract_title(""), UNTITLED);
    }

    #[test]
    fn test_render_hard_breaks_and_gfm() {
        let html = render_markdown("line one\nline two\n\n~~gone~~\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("line one<br />"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_summarize_strips_and_truncates() {
        assert_eq!(summarize("<h1>Hi</h1>\n<p>there</p>\n"), "Hi\nthere");

        let long = format!("<p>{}</p>", "字".repeat(150));
        let summary = summarize(&long);
        assert_eq!(summary.chars().count(), SUMMARY_CHARS + 3);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title(" a/b:c*d?e\"f<g>h|i\\j "), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_title("   "), UNTITLED);
        assert_eq!(sanitize_title("Plain"), "Plain");
    }

    #[test]
    fn test_date_from_components() {
        let date = date_from_components(&["2024", "01", "02", "x"]).unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-02 00:00:00");
        assert!(date_from_components(&["2024", "13", "40", "x"]).is_none());
        assert!(date_from_components(&["2024"]).is_none());
    }
}
