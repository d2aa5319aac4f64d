use crate::{
    http::{
        frame::{self, Frame},
        pairs::{self, Separator},
        types::{skip_space, skip_token, Span},
    },
    Command, Method,
};
use memchr::memchr;

/// Parsed HTTP request.
///
/// A `Request` owns the framed bytes it was parsed from and stores every
/// field as a span into them. Nothing is copied or rewritten in place, so
/// lookups can be repeated in any order.
///
/// # Wire format
///
/// ```text
/// [METHOD] SP [TARGET] SP [PROTOCOL] LF
/// [NAME]: [VALUE] LF
/// ...
/// LF
/// [BODY]
/// ```
///
/// Where `LF` is `\n` or `\r\n`. The parser is tolerant: it never rejects
/// a framed request.
/// - An unrecognized method is [`Method::Unknown`].
/// - A target that matches no command prefix is [`Command::Unknown`].
/// - Header lines without `:` are skipped.
///
/// # Target
///
/// An absolute URI (`http://host:port/path?x=1`) is reduced to its path
/// (`/path?x=1`). The query string is everything after the first `?`.
///
/// # Body
///
/// Present only when `Content-Length` is a positive integer, and then
/// exactly that many bytes long.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    buffer: Vec<u8>,
    header_len: usize,

    method: Method,
    command: Command,
    target: Span,
    path: Span,
    query: Option<Span>,

    cookie: Option<Span>,
    body: Option<Span>,
}

impl Request {
    /// Parses a complete frame.
    pub fn parse(frame: Frame) -> Self {
        let Frame {
            buffer,
            header_len,
            total_len,
        } = frame;
        let head = &buffer[..header_len];

        let first = skip_space(head, 0);
        let line_end = memchr(b'\n', &head[first..])
            .map(|pos| first + pos)
            .unwrap_or(head.len());
        let line = &head[..line_end];

        let method = Method::from_bytes(&line[first..]);
        let target_start = skip_space(line, skip_token(line, first));
        let target = Span::new(target_start, skip_token(line, target_start));

        let path = path_of(&buffer, target);
        let query = memchr(b'?', path.slice(&buffer)).map(|pos| Span::new(path.start + pos + 1, path.end));
        let command = Command::from_path(path.slice(&buffer));

        let cookie = find_header(head, b"cookie");
        let body = match frame::content_length(head) {
            0 => None,
            len => Some(Span::new(header_len, header_len + len)).filter(|s| s.end <= total_len),
        };

        Request {
            buffer,
            header_len,

            method,
            command,
            target,
            path,
            query,

            cookie,
            body,
        }
    }

    /// Frames and parses a request held in memory.
    ///
    /// Returns `None` under the same conditions as [`Frame::from_buffer`].
    ///
    /// # Examples
    /// ```
    /// use cookie_cart::{Command, Method, Request};
    ///
    /// let req = Request::from_bytes("GET /addcart?item=green+tea HTTP/1.1\r\nCookie: username=bob\r\n\r\n").unwrap();
    ///
    /// assert_eq!(req.method(), Method::Get);
    /// assert_eq!(req.command(), Command::AddCart);
    /// assert_eq!(req.param("item").as_deref(), Some("green tea"));
    /// assert_eq!(req.cookie("username").as_deref(), Some("bob"));
    /// ```
    #[inline]
    pub fn from_bytes<V: Into<Vec<u8>>>(buffer: V) -> Option<Self> {
        Frame::from_buffer(buffer).map(Request::parse)
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline(always)]
    pub const fn command(&self) -> Command {
        self.command
    }

    /// Request target exactly as sent.
    #[inline(always)]
    pub fn target(&self) -> &[u8] {
        self.target.slice(&self.buffer)
    }

    /// Target with any `scheme://authority` removed, query included.
    #[inline(always)]
    pub fn path(&self) -> &[u8] {
        self.path.slice(&self.buffer)
    }

    /// Raw query string after `?`, if any.
    #[inline(always)]
    pub fn query(&self) -> Option<&[u8]> {
        self.query.map(|span| span.slice(&self.buffer))
    }

    /// Returns the first header value with case-insensitive name matching,
    /// trimmed of surrounding whitespace.
    #[inline]
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        let head = &self.buffer[..self.header_len];
        find_header(head, name).map(|span| span.slice(head))
    }

    /// Like [`header`](Self::header), for values that are valid UTF-8.
    #[inline]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name.as_bytes())
            .and_then(|value| simdutf8::basic::from_utf8(value).ok())
    }

    /// Raw `Cookie` header value.
    #[inline(always)]
    pub fn cookies(&self) -> Option<&[u8]> {
        self.cookie.map(|span| span.slice(&self.buffer))
    }

    /// Decoded value of the cookie `name`.
    #[inline]
    pub fn cookie(&self, name: &str) -> Option<String> {
        pairs::get(self.cookies(), name, Separator::Cookie)
    }

    /// Decoded value of the query parameter `name`.
    #[inline]
    pub fn param(&self, name: &str) -> Option<String> {
        pairs::get(self.query(), name, Separator::Param)
    }

    /// Decoded value of the form parameter `name` in the body.
    #[inline]
    pub fn body_param(&self, name: &str) -> Option<String> {
        pairs::get(self.body(), name, Separator::Param)
    }

    #[inline(always)]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.map(|span| span.slice(&self.buffer))
    }

    /// Returns the body length if a body is present.
    #[inline(always)]
    pub fn content_length(&self) -> Option<usize> {
        self.body.map(|span| span.len())
    }

    /// Whether the client asked for the connection to be closed.
    #[inline]
    pub fn wants_close(&self) -> bool {
        self.header(b"connection")
            .is_some_and(|value| value.eq_ignore_ascii_case(b"close"))
    }
}

/// Strips `scheme://authority` from an absolute URI.
#[inline]
fn path_of(buffer: &[u8], target: Span) -> Span {
    let src = target.slice(buffer);
    if src.first() == Some(&b'/') {
        return target;
    }

    let Some(colon) = memchr(b':', src) else {
        return target;
    };
    if !src[colon + 1..].starts_with(b"//") {
        return target;
    }

    let authority = colon + 3;
    match memchr(b'/', &src[authority..]) {
        Some(slash) => Span::new(target.start + authority + slash, target.end),
        None => Span::new(target.end, target.end),
    }
}

/// Finds the first header line named `name` (ignoring ASCII case) and returns
/// the span of its trimmed value.
///
/// The request line is skipped; scanning stops at the blank line that ends
/// the header section. Lines without a `:` are ignored.
pub(crate) fn find_header(src: &[u8], name: &[u8]) -> Option<Span> {
    let first = skip_space(src, 0);
    let mut line_start = first + memchr(b'\n', &src[first..])? + 1;

    while line_start < src.len() {
        let line_end = memchr(b'\n', &src[line_start..])
            .map(|pos| line_start + pos)
            .unwrap_or(src.len());
        let line = &src[line_start..line_end];

        if line.is_empty() || line == b"\r" {
            return None;
        }

        if let Some(colon) = memchr(b':', line) {
            let field = Span::new(line_start, line_start + colon).trim(src);

            if field.slice(src).eq_ignore_ascii_case(name) {
                return Some(Span::new(line_start + colon + 1, line_end).trim(src));
            }
        }

        line_start = line_end + 1;
    }

    None
}
