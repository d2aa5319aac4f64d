//! Structured HTTP response and its serializer.

use crate::http::{codec, types::StatusCode};
use std::{fmt, time::SystemTime};

/// Value of the `Connection` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    KeepAlive,
    Close,
}

impl Connection {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Connection::KeepAlive => "keep-alive",
            Connection::Close => "close",
        }
    }
}

/// Value of the `Cache-Control` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheControl {
    NoCache,
    Private,
    Public,
}

impl CacheControl {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheControl::NoCache => "no-cache",
            CacheControl::Private => "private",
            CacheControl::Public => "public",
        }
    }
}

/// Response payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Body {
    /// No body; `Content-Length: 0`.
    #[default]
    Empty,
    /// Sent as is with a `Content-Length`.
    Text(Vec<u8>),
    /// Sent with `Transfer-Encoding: chunked`.
    Chunked(Vec<u8>),
}

/// One `Set-Cookie` header.
///
/// Rendered as `name=value; max-age=<seconds>; path=/` with name and value
/// percent-encoded. A negative `max_age` asks the client to drop the cookie.
///
/// # Examples
/// ```
/// use cookie_cart::SetCookie;
///
/// assert_eq!(SetCookie::new("item1", "green tea", 86400).to_string(), "item1=green+tea; max-age=86400; path=/");
/// assert_eq!(SetCookie::expire("item2").to_string(), "item2=; max-age=-1; path=/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub max_age: i64,
}

impl SetCookie {
    /// `max-age` of a cookie that should be dropped right away.
    pub const EXPIRED: i64 = -1;

    #[inline]
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V, max_age: i64) -> Self {
        SetCookie {
            name: name.into(),
            value: value.into(),
            max_age,
        }
    }

    #[inline]
    pub fn expire<N: Into<String>>(name: N) -> Self {
        Self::new(name, "", Self::EXPIRED)
    }

    #[inline(always)]
    pub fn is_expired(&self) -> bool {
        self.max_age < 0
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; max-age={}; path=/",
            codec::encode(self.name.as_bytes()),
            codec::encode(self.value.as_bytes()),
            self.max_age
        )
    }
}

/// HTTP response model filled in by one handler and serialized once.
///
/// Starts as `200 OK`, `text/plain`, `keep-alive`, `public`, no body.
///
/// # Examples
/// ```
/// use cookie_cart::{CacheControl, Response, StatusCode};
///
/// let mut resp = Response::new();
/// resp.status(StatusCode::Forbidden)
///     .cache_control(CacheControl::NoCache)
///     .body("Login failed\n");
///
/// assert_eq!(resp.status_code(), StatusCode::Forbidden);
/// assert_eq!(resp.body_bytes(), Some(&b"Login failed\n"[..]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    content_type: &'static str,
    connection: Connection,
    cache_control: CacheControl,
    cookies: Vec<SetCookie>,
    location: Option<String>,
    last_modified: Option<SystemTime>,
    body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::Ok,
            content_type: "text/plain",
            connection: Connection::KeepAlive,
            cache_control: CacheControl::Public,
            cookies: Vec::new(),
            location: None,
            last_modified: None,
            body: Body::Empty,
        }
    }
}

impl Response {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }
}

// Builder
impl Response {
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    #[inline]
    pub fn content_type(&mut self, content_type: &'static str) -> &mut Self {
        self.content_type = content_type;
        self
    }

    #[inline]
    pub fn cache_control(&mut self, cache_control: CacheControl) -> &mut Self {
        self.cache_control = cache_control;
        self
    }

    /// Forces the connection to close after this response.
    #[inline]
    pub fn close(&mut self) -> &mut Self {
        self.connection = Connection::Close;
        self
    }

    #[inline]
    pub fn cookie(&mut self, cookie: SetCookie) -> &mut Self {
        self.cookies.push(cookie);
        self
    }

    #[inline]
    pub fn cookies<I: IntoIterator<Item = SetCookie>>(&mut self, cookies: I) -> &mut Self {
        self.cookies.extend(cookies);
        self
    }

    #[inline]
    pub fn location<L: Into<String>>(&mut self, location: L) -> &mut Self {
        self.location = Some(location.into());
        self
    }

    #[inline]
    pub fn last_modified(&mut self, time: SystemTime) -> &mut Self {
        self.last_modified = Some(time);
        self
    }

    /// Sets a plain body sent with `Content-Length`.
    #[inline]
    pub fn body<T: Into<Vec<u8>>>(&mut self, data: T) -> &mut Self {
        self.body = Body::Text(data.into());
        self
    }

    /// Sets a binary body sent with `Transfer-Encoding: chunked` as
    /// `application/octet-stream`.
    #[inline]
    pub fn chunked<T: Into<Vec<u8>>>(&mut self, data: T) -> &mut Self {
        self.content_type = "application/octet-stream";
        self.body = Body::Chunked(data.into());
        self
    }

    /// Removes any body.
    #[inline]
    pub fn no_body(&mut self) -> &mut Self {
        self.body = Body::Empty;
        self
    }

    /// Prefixes a plain body with a `Username: <name>` line.
    ///
    /// Chunked and empty bodies are left untouched.
    pub fn prepend_user(&mut self, username: &str) -> &mut Self {
        if let Body::Text(text) = &mut self.body {
            let mut banner = format!("Username: {username}\n").into_bytes();
            banner.append(text);
            *text = banner;
        }
        self
    }
}

// Accessors
impl Response {
    #[inline(always)]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    #[inline(always)]
    pub const fn connection(&self) -> Connection {
        self.connection
    }

    #[inline(always)]
    pub const fn is_close(&self) -> bool {
        matches!(self.connection, Connection::Close)
    }

    #[inline(always)]
    pub const fn cache(&self) -> CacheControl {
        self.cache_control
    }

    #[inline(always)]
    pub fn set_cookies(&self) -> &[SetCookie] {
        &self.cookies
    }

    #[inline(always)]
    pub fn location_value(&self) -> Option<&str> {
        self.location.as_deref()
    }

    #[inline(always)]
    pub fn body_kind(&self) -> &Body {
        &self.body
    }

    /// Body payload before any transfer framing.
    #[inline]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Empty => None,
            Body::Text(data) | Body::Chunked(data) => Some(data),
        }
    }
}

// Serialization
impl Response {
    /// Appends the wire form of the response to `out`.
    ///
    /// Header order: `Date`, `Connection`, `Cache-Control`, `Content-Length`
    /// or `Transfer-Encoding`, `Content-Type`, `Set-Cookie`*, `Location`,
    /// `Last-Modified`. With `head_only` the body bytes are left out while
    /// the headers still describe them.
    pub fn write_to(&self, out: &mut Vec<u8>, now: SystemTime, chunk_size: usize, head_only: bool) {
        out.extend_from_slice(self.status.first_line());

        push_header(out, "Date", &httpdate::fmt_http_date(now));
        push_header(out, "Connection", self.connection.as_str());
        push_header(out, "Cache-Control", self.cache_control.as_str());

        match &self.body {
            Body::Empty => push_header(out, "Content-Length", "0"),
            Body::Text(data) => push_header(out, "Content-Length", &data.len().to_string()),
            Body::Chunked(_) => push_header(out, "Transfer-Encoding", "chunked"),
        }
        push_header(out, "Content-Type", self.content_type);

        for cookie in &self.cookies {
            push_header(out, "Set-Cookie", &cookie.to_string());
        }
        if let Some(location) = &self.location {
            push_header(out, "Location", location);
        }
        if let Some(time) = self.last_modified {
            push_header(out, "Last-Modified", &httpdate::fmt_http_date(time));
        }

        out.extend_from_slice(b"\r\n");

        if head_only {
            return;
        }
        match &self.body {
            Body::Empty => {}
            Body::Text(data) => out.extend_from_slice(data),
            Body::Chunked(data) => write_chunked(out, data, chunk_size),
        }
    }
}

#[inline]
fn push_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// `<hex-len>\r\n<bytes>\r\n` per chunk, then `0\r\n\r\n`.
fn write_chunked(out: &mut Vec<u8>, data: &[u8], chunk_size: usize) {
    for chunk in data.chunks(chunk_size.max(1)) {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
}
