/// Attachment storage
///
/// Uploaded files are written under the configured uploads directory with a
/// collision-resistant name (ingestion timestamp + sanitized original name)
/// and served statically from `/uploads`. The stored `file_path` is the
/// relative path under that root, set once at task creation and immutable
/// thereafter.

use chrono::Utc;
use std::path::Path;
use tokio::fs;

/// Stores an uploaded attachment and returns its relative path
///
/// The returned value (e.g. `uploads/1678886400000-report.pdf`) is what gets
/// persisted on the task and resolved by the static file route.
///
/// # Errors
///
/// Returns an I/O error if the uploads directory cannot be created or the
/// file cannot be written.
pub async fn store_attachment(
    uploads_dir: &str,
    original_name: &str,
    data: &[u8],
) -> std::io::Result<String> {
    fs::create_dir_all(uploads_dir).await?;

    let stored_name = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_filename(original_name)
    );

    fs::write(Path::new(uploads_dir).join(&stored_name), data).await?;

    Ok(format!("uploads/{}", stored_name))
}

/// Reduces a client-supplied filename to a safe single path component
///
/// Strips any directory components and replaces characters outside
/// `[A-Za-z0-9._-]` with `_`. An empty result falls back to `file`.
fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_name() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("notes_v2-final.txt"), "notes_v2-final.txt");
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("/tmp/evil.sh"), "evil.sh");
    }

    #[test]
    fn test_sanitize_replaces_odd_characters() {
        assert_eq!(sanitize_filename("my report (1).pdf"), "my_report__1_.pdf");
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename(".."), "file");
    }

    #[tokio::test]
    async fn test_store_attachment_roundtrip() {
        let dir = std::env::temp_dir().join(format!("taskboard-uploads-{}", uuid::Uuid::new_v4()));
        let dir_str = dir.to_str().unwrap();

        let rel_path = store_attachment(dir_str, "hello.txt", b"hello world")
            .await
            .unwrap();

        assert!(rel_path.starts_with("uploads/"));
        assert!(rel_path.ends_with("-hello.txt"));

        let stored_name = rel_path.strip_prefix("uploads/").unwrap();
        let contents = fs::read(dir.join(stored_name)).await.unwrap();
        assert_eq!(contents, b"hello world");

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_attachment_unique_names() {
        let dir = std::env::temp_dir().join(format!("taskboard-uploads-{}", uuid::Uuid::new_v4()));
        let dir_str = dir.to_str().unwrap();

        let a = store_attachment(dir_str, "same.txt", b"a").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let b = store_attachment(dir_str, "same.txt", b"b").await.unwrap();

        assert_ne!(a, b);

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
