//! Filename derivation for model URLs.
//!
//! Hosting sites often end download URLs with routing segments such as
//! `/resolve` or a numeric file id. Those are not filenames, so derivation
//! refuses them and the caller has to name the file explicitly.

/// Path segments that are routing artifacts rather than filenames.
const ROUTING_SEGMENTS: &[&str] = &["download", "resolve"];

/// Derive a filename from the last path segment of `url`.
///
/// Returns `None` when the URL has no usable final segment.
pub fn derive_filename(url: &str) -> Option<String> {
    let decoded = percent_decode(url_path(url));
    let mut candidate = decoded.rsplit('/').find(|s| !s.is_empty())?.to_string();

    if ROUTING_SEGMENTS.contains(&candidate.as_str())
        || candidate.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    // An encoded `?` survives path extraction and shows up after decoding.
    if let Some(idx) = candidate.find('?') {
        candidate.truncate(idx);
    }

    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}

/// The path component of a URL: no scheme, authority, query, or fragment.
fn url_path(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(idx) => {
            let after = &url[idx + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "",
            }
        }
        None => url,
    };
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

/// Decode `%XX` escapes. Invalid UTF-8 is replaced, not rejected.
fn percent_decode(input: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(input.as_bytes())).into_owned()
}
