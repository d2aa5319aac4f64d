//! Core HTTP protocol types and utilities

// SPAN

/// Half-open byte range `[start, end)` into a request buffer.
///
/// The parser never writes into the buffer it reads; every piece of a
/// request is remembered as a span and resolved on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Span {
    #[inline(always)]
    pub(crate) const fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    #[inline(always)]
    pub(crate) const fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline(always)]
    pub(crate) const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline(always)]
    pub(crate) fn slice<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        buffer.get(self.start..self.end).unwrap_or_default()
    }

    /// Narrows the span so it neither starts nor ends with ASCII whitespace.
    #[inline]
    pub(crate) fn trim(self, buffer: &[u8]) -> Self {
        let (mut start, mut end) = (self.start, self.end.min(buffer.len()));

        while start < end && buffer[start].is_ascii_whitespace() {
            start += 1;
        }
        while end > start && buffer[end - 1].is_ascii_whitespace() {
            end -= 1;
        }

        Span::new(start, end)
    }
}

/// Index of the first non-whitespace byte at or after `from`.
#[inline(always)]
pub(crate) fn skip_space(src: &[u8], mut from: usize) -> usize {
    while from < src.len() && src[from].is_ascii_whitespace() {
        from += 1;
    }
    from
}

/// Index of the first whitespace byte at or after `from`.
#[inline(always)]
pub(crate) fn skip_token(src: &[u8], mut from: usize) -> usize {
    while from < src.len() && !src[from].is_ascii_whitespace() {
        from += 1;
    }
    from
}

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// METHOD

/// HTTP request methods
///
/// Anything outside the known token set parses as [`Method::Unknown`];
/// the method never decides whether a request is served, the command does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// [[RFC7231, Section 4.3.1](https://tools.ietf.org/html/rfc7231#section-4.3.1)]
    Get,
    /// [[RFC7231, Section 4.3.3](https://tools.ietf.org/html/rfc7231#section-4.3.3)]
    Post,
    /// [[RFC7231, Section 4.3.2](https://tools.ietf.org/html/rfc7231#section-4.3.2)]
    Head,
    /// [[RFC7231, Section 4.3.7](https://tools.ietf.org/html/rfc7231#section-4.3.7)]
    Options,
    /// [[RFC7231, Section 4.3.4](https://tools.ietf.org/html/rfc7231#section-4.3.4)]
    Put,
    /// [[RFC7231, Section 4.3.5](https://tools.ietf.org/html/rfc7231#section-4.3.5)]
    Delete,
    /// [[RFC7231, Section 4.3.8](https://tools.ietf.org/html/rfc7231#section-4.3.8)]
    Trace,
    /// [[RFC7231, Section 4.3.6](https://tools.ietf.org/html/rfc7231#section-4.3.6)]
    Connect,
    /// Any token not listed above.
    Unknown,
}

impl Method {
    #[rustfmt::skip]
    const TOKENS: [(&'static [u8], Method); 8] = [
        (b"GET",     Method::Get),
        (b"POST",    Method::Post),
        (b"HEAD",    Method::Head),
        (b"OPTIONS", Method::Options),
        (b"PUT",     Method::Put),
        (b"DELETE",  Method::Delete),
        (b"TRACE",   Method::Trace),
        (b"CONNECT", Method::Connect),
    ];

    /// Case-insensitive match of the leading token; the token must be
    /// followed by whitespace.
    #[inline]
    pub(crate) fn from_bytes(src: &[u8]) -> Self {
        Self::TOKENS
            .iter()
            .find(|(token, _)| {
                src.len() > token.len()
                    && src[..token.len()].eq_ignore_ascii_case(token)
                    && src[token.len()].is_ascii_whitespace()
            })
            .map(|&(_, method)| method)
            .unwrap_or(Method::Unknown)
    }

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Unknown => "UNKNOWN",
        }
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// HTTP status codes the service emits
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            /// Returns the status line as bytes (e.g., `b"HTTP/1.1 200 OK\r\n"`).
            #[inline]
            pub(crate) const fn first_line(&self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes(),
                )+ }
            }

            #[inline]
            pub const fn reason(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }

            #[inline(always)]
            pub const fn as_u16(&self) -> u16 {
                *self as u16
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");
    /// [[RFC9110, Section 15.4.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.4)]
    SeeOther = (303, "See Other");
    /// [[RFC9110, Section 15.4.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.5)]
    NotModified = (304, "Not Modified");
    /// [[RFC9110, Section 15.5.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.4)]
    Forbidden = (403, "Forbidden");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
}
