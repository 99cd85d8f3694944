//! HTTP/1.1 response building.
//!
//! [`HttpResponse`] is a plain data builder rather than the teacher's
//! fluent write-once buffer: handlers and middleware mutate it freely
//! (set a header twice, overwrite the body, append a cookie) and
//! [`HttpResponse::build`] only serializes at the very end, once, when the
//! engine is ready to write it to the socket.

use crate::http::types::{HeaderMap, StatusCode};
use std::time::{SystemTime, UNIX_EPOCH};

/// The `SameSite` attribute of a [`Cookie`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// A `Set-Cookie` header value, built incrementally.
///
/// Attributes are serialized in a fixed canonical order — Path, Domain,
/// Expires, Max-Age, Secure, HttpOnly, SameSite — regardless of the order
/// they were set in.
#[derive(Debug, Clone)]
pub struct Cookie {
    name: String,
    value: String,
    path: Option<String>,
    domain: Option<String>,
    expires: Option<String>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets `Expires` to a pre-formatted HTTP date string. Callers own
    /// clock access and formatting; this type only stores the result.
    pub fn expires(mut self, http_date: impl Into<String>) -> Self {
        self.expires = Some(http_date.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    fn write_header_value(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push('=');
        out.push_str(&self.value);

        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(expires) = &self.expires {
            out.push_str("; Expires=");
            out.push_str(expires);
        }
        if let Some(max_age) = self.max_age {
            out.push_str("; Max-Age=");
            out.push_str(&max_age.to_string());
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            out.push_str("; SameSite=");
            out.push_str(same_site.as_str());
        }
    }
}

/// An HTTP/1.1 response under construction.
///
/// Every connection gets exactly one response (no keep-alive, no
/// trailers): [`build`](Self::build) produces the whole wire
/// representation, status line through body, in one call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    body: Option<Vec<u8>>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets a header, replacing any existing value for the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_body(&mut self, body: Vec<u8>) -> &mut Self {
        self.body = Some(body);
        self
    }

    pub fn set_cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.cookies.push(cookie);
        self
    }

    /// Sets the body and `Content-Type: application/json`.
    pub fn json(&mut self, body: Vec<u8>) -> &mut Self {
        self.set_header("Content-Type", "application/json");
        self.set_body(body)
    }

    /// Sets the body and `Content-Type: text/plain; charset=utf-8`.
    pub fn text(&mut self, body: Vec<u8>) -> &mut Self {
        self.set_header("Content-Type", "text/plain; charset=utf-8");
        self.set_body(body)
    }

    /// Sets the body and `Content-Type: text/html; charset=utf-8`.
    pub fn html(&mut self, body: Vec<u8>) -> &mut Self {
        self.set_header("Content-Type", "text/html; charset=utf-8");
        self.set_body(body)
    }

    /// Serializes the status line, headers, cookies, and body into the
    /// bytes written to the socket. Idempotent — calling it twice produces
    /// the same bytes, since it never mutates `self`.
    pub fn build(&self) -> Vec<u8> {
        let body_len = self.body.as_ref().map_or(0, |b| b.len());

        let mut out = String::with_capacity(256 + body_len);
        out.push_str("HTTP/1.1 ");
        out.push_str(&self.status.code().to_string());
        out.push(' ');
        out.push_str(self.status.reason());
        out.push_str("\r\n");

        if !self.headers.contains("Server") {
            out.push_str("Server: anvil\r\n");
        }
        if !self.headers.contains("Date") {
            let unix_secs = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
            out.push_str("Date: ");
            out.push_str(&unix_secs.to_string());
            out.push_str("\r\n");
        }
        if !self.headers.contains("Connection") {
            out.push_str("Connection: close\r\n");
        }

        for (name, value) in self.headers.iter() {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }

        for cookie in &self.cookies {
            out.push_str("Set-Cookie: ");
            cookie.write_header_value(&mut out);
            out.push_str("\r\n");
        }

        if !self.headers.contains("Content-Length") {
            out.push_str("Content-Length: ");
            out.push_str(&body_len.to_string());
            out.push_str("\r\n");
        }

        out.push_str("\r\n");

        let mut bytes = out.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_includes_status_line_and_default_headers() {
        let response = HttpResponse::new(StatusCode::Ok);
        let text = String::from_utf8(response.build()).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn build_includes_a_date_header() {
        let response = HttpResponse::new(StatusCode::Ok);
        let text = String::from_utf8(response.build()).unwrap();
        assert!(text.contains("Date: "));
    }

    #[test]
    fn json_sets_content_type_and_body() {
        let mut response = HttpResponse::new(StatusCode::Ok);
        response.json(b"{\"ok\":true}".to_vec());
        let text = String::from_utf8(response.build()).unwrap();

        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("Content-Length: 11\r\n"));
        assert!(text.ends_with("{\"ok\":true}"));
    }

    #[test]
    fn user_supplied_headers_are_not_overridden_by_defaults() {
        let mut response = HttpResponse::new(StatusCode::Ok);
        response.set_header("Connection", "keep-alive");
        let text = String::from_utf8(response.build()).unwrap();

        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(!text.contains("Connection: close"));
    }

    #[test]
    fn cookie_attributes_serialize_in_canonical_order() {
        let mut response = HttpResponse::new(StatusCode::Ok);
        response.set_cookie(
            Cookie::new("session", "abc123")
                .http_only(true)
                .secure(true)
                .same_site(SameSite::Strict)
                .path("/")
                .max_age(3600),
        );
        let text = String::from_utf8(response.build()).unwrap();

        let line = text.lines().find(|l| l.starts_with("Set-Cookie:")).unwrap();
        let path_idx = line.find("Path=").unwrap();
        let max_age_idx = line.find("Max-Age=").unwrap();
        let secure_idx = line.find("Secure").unwrap();
        let http_only_idx = line.find("HttpOnly").unwrap();
        let same_site_idx = line.find("SameSite=").unwrap();

        assert!(path_idx < max_age_idx);
        assert!(max_age_idx < secure_idx);
        assert!(secure_idx < http_only_idx);
        assert!(http_only_idx < same_site_idx);
    }

    #[test]
    fn set_status_overrides_the_constructor_value() {
        let mut response = HttpResponse::new(StatusCode::Ok);
        response.set_status(StatusCode::NotFound);
        assert_eq!(response.status(), StatusCode::NotFound);
    }
}
