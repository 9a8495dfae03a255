//! Static file gate.
//!
//! Files only: directories, missing paths and `..` segments are 404.
//! Conditional GET and range handling come from `tower_http::services::ServeFile`.

use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::AsyncReadExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Content type for a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html; charset=utf-8",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// `ftyp` at offset 4 marks an ISO-BMFF container.
pub fn is_iso_media(header: &[u8]) -> bool {
    header.len() >= 8 && &header[4..8] == b"ftyp"
}

/// Join `requested` under `root`, refusing anything that climbs out.
pub fn resolve(root: &Path, requested: &str) -> Option<PathBuf> {
    let relative = Path::new(requested.trim_start_matches('/'));
    if requested.split(['/', '\\']).any(|segment| segment == "..") {
        return None;
    }
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

async fn sniff_content_type(path: &Path) -> &'static str {
    let content_type = content_type_for(path);
    if content_type != "audio/mpeg" {
        return content_type;
    }
    let mut header = [0u8; 8];
    let read = match tokio::fs::File::open(path).await {
        Ok(mut file) => file.read(&mut header).await.unwrap_or(0),
        Err(_) => 0,
    };
    if is_iso_media(&header[..read]) {
        "audio/mp4"
    } else {
        content_type
    }
}

/// Serve `requested` from `root` for `request`.
pub async fn serve(root: &Path, requested: &str, request: Request) -> Response {
    let Some(path) = resolve(root, requested) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return StatusCode::NOT_FOUND.into_response(),
    }

    let content_type = sniff_content_type(&path).await;
    let service = ServeFile::new_with_mime(
        &path,
        &content_type
            .parse::<mime::Mime>()
            .expect("static content type is a valid mime"),
    );
    match service.oneshot(request).await {
        Ok(response) => {
            let mut response = response.map(Body::new);
            if response.status().is_success() {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            response
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to serve static file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a/site.CSS")), "text/css; charset=utf-8");
        assert_eq!(content_type_for(Path::new("font.woff2")), "font/woff2");
        assert_eq!(content_type_for(Path::new("song.mp3")), "audio/mpeg");
        assert_eq!(content_type_for(Path::new("README")), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for(Path::new("data.bin")), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_iso_media_sniff() {
        assert!(is_iso_media(b"\0\0\0\x20ftypM4A "));
        assert!(!is_iso_media(b"ID3\x03\0\0\0\0"));
        assert!(!is_iso_media(b"ftyp"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = Path::new("/srv/static");
        assert_eq!(resolve(root, "css/site.css"), Some(root.join("css/site.css")));
        assert_eq!(resolve(root, "/img/a.png"), Some(root.join("img/a.png")));
        assert!(resolve(root, "../secret").is_none());
        assert!(resolve(root, "img/../../secret").is_none());
        assert!(resolve(root, "img\\..\\secret").is_none());
    }
}
