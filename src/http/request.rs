//! HTTP/1.1 request parsing.
//!
//! [`parse`] turns one buffered read into an [`HttpRequest`] in a single
//! pass: no re-scanning, no intermediate allocations beyond the owned
//! strings the request itself needs to outlive the connection's read
//! buffer. The body is the one deliberate exception — it stays a borrow
//! into the caller's byte slice (see the "Request body borrowing" note in
//! the crate's design docs) rather than being copied.

use crate::{
    errors::ParseError,
    http::types::{HeaderMap, Method},
    limits::constants,
};

/// An owned, parsed HTTP/1.1 request.
///
/// Every field but [`body`](Self::body) is a heap copy, independent of the
/// buffer `parse` was called with. The body is a borrow into that buffer —
/// callers that need it past the buffer's lifetime must copy it themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest<'a> {
    method: Method,
    path: String,
    query: Option<String>,
    version: String,
    headers: HeaderMap,
    body: Option<&'a [u8]>,
}

impl<'a> HttpRequest<'a> {
    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The path component of the request-target, without the query string.
    /// Always starts with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, if any, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The HTTP version token as it appeared on the wire, e.g. `"HTTP/1.1"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Looks up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Case-preserving, insertion-ordered iteration over all headers.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter()
    }

    /// The parsed `Content-Length`, if the header was present and numeric.
    /// A non-numeric value is treated the same as an absent header.
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")
            .and_then(|v| v.trim_matches(' ').parse().ok())
    }

    /// The request body, borrowed from the buffer `parse` was called with.
    pub fn body(&self) -> Option<&'a [u8]> {
        self.body
    }

    /// `path` split into non-empty `/`-separated segments. Used by the
    /// router for pattern matching; exposed publicly since handlers
    /// sometimes want the same decomposition.
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|segment| !segment.is_empty())
    }

    /// Looks up one `key=value` pair from the query string. Case-sensitive,
    /// first match wins. Returns `Some("")` for a key with no `=value`.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        let query = self.query.as_deref()?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then_some(v)
        })
    }
}

/// Parses one HTTP/1.1 request out of `bytes`.
///
/// `bytes` is normally exactly what one buffered `read` call produced.
/// Enforces every bound in [`crate::limits::constants`]; never panics on
/// adversarial input.
pub fn parse(bytes: &[u8]) -> Result<HttpRequest<'_>, ParseError> {
    if bytes.len() > constants::MAX_REQUEST_SIZE {
        return Err(ParseError::RequestTooLarge);
    }

    let header_end = find_subslice(bytes, b"\r\n\r\n").ok_or(ParseError::InvalidRequest)?;
    let header_block =
        simdutf8::basic::from_utf8(&bytes[..header_end]).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = header_block.split("\r\n");
    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let (method, path, query, version) = parse_request_line(request_line)?;

    let mut headers = HeaderMap::new();
    for (count, line) in lines.enumerate() {
        if count >= constants::MAX_HEADER_COUNT {
            return Err(ParseError::TooManyHeaders);
        }

        let colon = line.find(':').ok_or(ParseError::InvalidHeaderLine)?;
        let name = line[..colon].trim_matches(' ');
        let value = line[colon + 1..].trim_matches(' ');

        if name.is_empty()
            || name.len() > constants::MAX_HEADER_NAME_SIZE
            || value.len() > constants::MAX_HEADER_VALUE_SIZE
            || value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0))
        {
            return Err(ParseError::InvalidHeaderLine);
        }

        headers.push(name, value);
    }

    let body = extract_body(bytes, header_end, &headers)?;

    Ok(HttpRequest { method, path, query, version, headers, body })
}

fn parse_request_line(line: &str) -> Result<(Method, String, Option<String>, String), ParseError> {
    let mut tokens = line.split(' ');
    let (Some(method_token), Some(target), Some(version_token), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    let method = Method::parse(method_token)?;

    if target.is_empty()
        || target.len() > constants::MAX_URI_LENGTH
        || target.contains('\0')
    {
        return Err(ParseError::InvalidRequestLine);
    }

    if version_token.is_empty()
        || version_token.len() > constants::MAX_VERSION_LENGTH
        || !version_token.starts_with("HTTP/")
    {
        return Err(ParseError::InvalidRequestLine);
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    };

    Ok((method, path, query, version_token.to_string()))
}

fn extract_body<'a>(
    bytes: &'a [u8],
    header_end: usize,
    headers: &HeaderMap,
) -> Result<Option<&'a [u8]>, ParseError> {
    let content_length = headers
        .get("content-length")
        .and_then(|v| v.trim_matches(' ').parse::<usize>().ok());

    let Some(content_length) = content_length else {
        return Ok(None);
    };

    let start = header_end + 4;
    if start >= bytes.len() {
        return Err(ParseError::InvalidRequest);
    }

    let available = bytes.len() - start;
    let actual = content_length.min(available);
    Ok(Some(&bytes[start..start + actual]))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(haystack, needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_get() {
        let req = parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.query(), None);
        assert_eq!(req.version(), "HTTP/1.1");
        assert_eq!(req.header("host"), Some("x"));
        assert_eq!(req.body(), None);
    }

    #[test]
    fn splits_path_and_query_on_first_question_mark() {
        let req = parse(b"GET /a?b=1&c=2?d HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path(), "/a");
        assert_eq!(req.query(), Some("b=1&c=2?d"));
        assert_eq!(req.query_param("b"), Some("1"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn parses_body_bound_to_content_length() {
        let req = parse(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").unwrap();
        assert_eq!(req.content_length(), Some(5));
        assert_eq!(req.body(), Some(b"hello".as_slice()));
    }

    #[test]
    fn truncates_body_to_whats_actually_available() {
        let req = parse(b"POST /echo HTTP/1.1\r\nContent-Length: 50\r\n\r\nhello").unwrap();
        assert_eq!(req.body(), Some(b"hello".as_slice()));
    }

    #[test]
    fn missing_content_length_means_no_body_not_an_error() {
        let req = parse(b"GET / HTTP/1.1\r\n\r\nextra-bytes-ignored").unwrap();
        assert_eq!(req.body(), None);
    }

    #[test]
    fn non_numeric_content_length_is_treated_as_absent() {
        let req = parse(b"POST /x HTTP/1.1\r\nContent-Length: banana\r\n\r\nhello").unwrap();
        assert_eq!(req.content_length(), None);
        assert_eq!(req.body(), None);
    }

    #[test]
    fn rejects_oversized_request() {
        let huge = vec![b'a'; constants::MAX_REQUEST_SIZE + 1];
        assert_eq!(parse(&huge), Err(ParseError::RequestTooLarge));
    }

    #[test]
    fn rejects_missing_header_terminator() {
        assert_eq!(parse(b"GET / HTTP/1.1\r\nHost: x"), Err(ParseError::InvalidRequest));
    }

    #[test]
    fn rejects_request_line_with_wrong_token_count() {
        assert_eq!(parse(b"GET /\r\n\r\n"), Err(ParseError::InvalidRequestLine));
        assert_eq!(parse(b"GET / HTTP/1.1 extra\r\n\r\n"), Err(ParseError::InvalidRequestLine));
    }

    #[test]
    fn rejects_method_outside_the_eight_verbs() {
        assert_eq!(parse(b"CONNECT x HTTP/1.1\r\n\r\n"), Err(ParseError::InvalidRequestLine));
    }

    #[test]
    fn rejects_header_line_without_colon() {
        assert_eq!(parse(b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n"), Err(ParseError::InvalidHeaderLine));
    }

    #[test]
    fn rejects_header_value_containing_a_bare_nul() {
        let mut bytes = b"GET / HTTP/1.1\r\nX-Bad: ".to_vec();
        bytes.push(0);
        bytes.extend_from_slice(b"\r\n\r\n");
        assert_eq!(parse(&bytes), Err(ParseError::InvalidHeaderLine));
    }

    #[test]
    fn rejects_too_many_headers() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=constants::MAX_HEADER_COUNT {
            raw.push_str(&format!("X-{i}: v\r\n"));
        }
        raw.push_str("\r\n");
        assert_eq!(parse(raw.as_bytes()), Err(ParseError::TooManyHeaders));
    }

    #[test]
    fn header_names_are_trimmed_and_looked_up_case_insensitively() {
        let req = parse(b"GET / HTTP/1.1\r\nContent-Type:   text/plain  \r\n\r\n").unwrap();
        assert_eq!(req.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn path_segments_splits_and_skips_empties() {
        let req = parse(b"GET /api//users/42 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path_segments().collect::<Vec<_>>(), vec!["api", "users", "42"]);
    }
}
