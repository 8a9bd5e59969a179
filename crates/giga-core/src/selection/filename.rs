//! Output file names.

const NAME_MAX: usize = 255;

/// Makes a title safe to use as a file name on Linux.
///
/// - Replaces NUL, `/`, `\`, control characters and whitespace with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots and underscores
/// - Limits the result to `max` bytes
pub fn sanitize_filename(name: &str, max: usize) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let unsafe_char =
            c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace();
        let replacement = if unsafe_char { '_' } else { c };
        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(max);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

/// `<sanitized title>.<suffix>`, leaving room for the suffix and the
/// `.part` raw file name. Falls back to `download` for empty titles.
pub fn build_filename(title: &str, suffix: &str) -> String {
    let budget = NAME_MAX.saturating_sub(suffix.len() + 1 + crate::storage::TEMP_SUFFIX.len());
    let mut stem = sanitize_filename(title, budget);
    if stem.is_empty() {
        stem = "download".to_string();
    }
    format!("{}.{}", stem, suffix)
}

/// Last path segment of a URL, for plain file downloads.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}
