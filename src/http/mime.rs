//! MIME type detection module
//!
//! Returns the corresponding Content-Type based on file extension.

use std::path::Path;

/// Get MIME Content-Type based on file extension, textual types carry `charset=utf-8`
///
/// # Examples
/// ```
/// use filesend::http::mime::get_content_type;
/// use std::path::Path;
/// assert_eq!(get_content_type(Path::new("index.html")), "text/html; charset=utf-8");
/// assert_eq!(get_content_type(Path::new("movie.mp4")), "video/mp4");
/// assert_eq!(get_content_type(Path::new("blob")), "application/octet-stream");
/// ```
pub fn get_content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if is_textual(&mime) && mime.get_param(mime_guess::mime::CHARSET).is_none() {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

fn is_textual(mime: &mime_guess::Mime) -> bool {
    mime.type_() == mime_guess::mime::TEXT
        || (mime.type_() == mime_guess::mime::APPLICATION
            && matches!(
                mime.subtype().as_str(),
                "javascript" | "json" | "xml" | "xhtml+xml"
            ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        assert_eq!(
            get_content_type(Path::new("a.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(get_content_type(Path::new("a.css")), "text/css; charset=utf-8");
        assert_eq!(
            get_content_type(Path::new("a.json")),
            "application/json; charset=utf-8"
        );
        assert_eq!(get_content_type(Path::new("a.png")), "image/png");
        assert_eq!(get_content_type(Path::new("dir/a.mp4")), "video/mp4");
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(
            get_content_type(Path::new("a.xyzzy")),
            "application/octet-stream"
        );
        assert_eq!(
            get_content_type(Path::new("README")),
            "application/octet-stream"
        );
    }
}
