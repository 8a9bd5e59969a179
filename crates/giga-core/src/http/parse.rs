//! Raw header line parsing for the curl header callback.

/// Status code from a status line such as `HTTP/1.1 206 Partial Content`.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    let mut parts = rest.split_whitespace();
    parts.next()?;
    parts.next()?.parse().ok()
}

/// Splits `Name: value` into trimmed parts. Returns `None` for blank or malformed lines.
pub(crate) fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines() {
        assert_eq!(parse_status_line("HTTP/1.1 206 Partial Content"), Some(206));
        assert_eq!(parse_status_line("HTTP/2 200"), Some(200));
        assert_eq!(parse_status_line("Content-Length: 5"), None);
        assert_eq!(parse_status_line("HTTP/1.1"), None);
    }

    #[test]
    fn header_lines() {
        assert_eq!(
            parse_header_line("Content-Range: bytes 0-9/100"),
            Some(("Content-Range".to_string(), "bytes 0-9/100".to_string()))
        );
        assert_eq!(parse_header_line(""), None);
        assert_eq!(parse_header_line(": nameless"), None);
    }
}
