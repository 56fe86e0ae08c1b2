//! Helpers for keeping sensitive data out of logs and span fields.

use std::path::Path;

/// Maximum length of an upstream error body kept for logs and stored errors.
pub const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Truncates an HTTP error body to [`MAX_ERROR_BODY_LENGTH`] characters.
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/srv/uploads/project-falcon.pdf")),
            "project-falcon.pdf"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_truncate_body_short_is_unchanged() {
        assert_eq!(truncate_body("bad request"), "bad request");
    }

    #[test]
    fn test_truncate_body_long_is_cut_on_char_boundary() {
        let body = "é".repeat(300);
        let cut = truncate_body(&body);
        assert!(cut.ends_with("... (truncated)"));
        assert_eq!(cut.chars().filter(|&c| c == 'é').count(), MAX_ERROR_BODY_LENGTH);
    }
}
