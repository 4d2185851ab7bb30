//! Extension-to-MIME-type lookup and the gzippable-content heuristic.

/// A small curated extension table — this crate's frontend only needs
/// enough to drive the gzip heuristic and set a reasonable
/// `Content-Type` on read, not a general-purpose MIME database.
fn mime_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        ".txt" => "text/plain",
        ".html" | ".htm" => "text/html",
        ".css" => "text/css",
        ".csv" => "text/csv",
        ".js" => "application/javascript",
        ".json" => "application/json",
        ".xml" => "application/xml",
        ".pdf" => "application/pdf",
        ".zip" => "application/zip",
        ".gz" => "application/gzip",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".svg" => "image/svg+xml",
        _ => return None,
    })
}

/// Lowercased extension including the leading dot, e.g. `".txt"`, or
/// `None` if `filename` has no extension.
pub fn extension_of(filename: &str) -> Option<String> {
    let dot = filename.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(filename[dot..].to_ascii_lowercase())
}

/// Resolves a MIME type from an extension, falling back to the part's own
/// `Content-Type` header when present and different (mirrors the
/// source's precedence: an explicit header wins over the guess).
pub fn resolve_mime_type(ext: Option<&str>, content_type_header: Option<&str>) -> String {
    let guessed = ext.and_then(mime_for_extension);
    match (content_type_header, guessed) {
        (Some(header), guessed) if !header.is_empty() && Some(header) != guessed => header.to_string(),
        (_, Some(guessed)) => guessed.to_string(),
        (Some(header), None) => header.to_string(),
        (None, None) => String::new(),
    }
}

/// The gzippable-content heuristic from the upload parsing contract: any
/// `text/*` wins unconditionally, even over an extension that would
/// otherwise be excluded; then extensions `.pdf .txt .html .css .js
/// .json`; explicit no-compress `.zip .rar .gz .bz2 .xz`; then any
/// `application/*xml` or `application/*script`.
pub fn is_gzippable(ext: Option<&str>, mime_type: &str) -> bool {
    if mime_type.starts_with("text/") {
        return true;
    }
    if let Some(ext) = ext {
        if matches!(ext, ".zip" | ".rar" | ".gz" | ".bz2" | ".xz") {
            return false;
        }
        if matches!(ext, ".pdf" | ".txt" | ".html" | ".css" | ".js" | ".json") {
            return true;
        }
    }
    if let Some(rest) = mime_type.strip_prefix("application/") {
        if rest.ends_with("xml") || rest.ends_with("script") {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(".txt", "text/plain" => true; "txt extension")]
    #[test_case(".zip", "" => false; "zip is explicitly excluded")]
    #[test_case(".bz2", "" => false; "bz2 is explicitly excluded")]
    #[test_case(".png", "image/png" => false; "binary image is not gzippable")]
    fn gzippable_by_extension(ext: &str, mime: &str) -> bool {
        is_gzippable(Some(ext), mime)
    }

    #[test]
    fn text_mime_overrides_a_no_compress_extension() {
        assert!(is_gzippable(Some(".zip"), "text/plain"));
    }

    #[test]
    fn gzippable_by_mime_when_extension_unknown() {
        assert!(is_gzippable(None, "text/markdown"));
        assert!(is_gzippable(None, "application/rss+xml"));
        assert!(is_gzippable(None, "application/javascript+ecmascript")); // ends with "script"
        assert!(!is_gzippable(None, "application/octet-stream"));
    }

    #[test]
    fn extension_of_requires_a_real_dot() {
        assert_eq!(extension_of("hello.TXT").as_deref(), Some(".txt"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".hidden"), None);
    }

    #[test]
    fn explicit_content_type_header_wins_over_guess() {
        let resolved = resolve_mime_type(Some(".txt"), Some("application/custom"));
        assert_eq!(resolved, "application/custom");
    }

    #[test]
    fn falls_back_to_guess_when_header_matches_or_is_absent() {
        assert_eq!(resolve_mime_type(Some(".txt"), None), "text/plain");
        assert_eq!(resolve_mime_type(Some(".txt"), Some("text/plain")), "text/plain");
    }
}
