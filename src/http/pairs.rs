//! Lookup in `name=value` lists: cookie headers (`;`-separated) and
//! query strings / form bodies (`&`-separated).
//!
//! The scan walks every `=` in the input and accepts the first one whose
//! `name.len()` preceding bytes equal `name`, ignoring ASCII case. The value
//! runs up to the next separator or the end of input and is percent-decoded.
//! Absent input, empty input and no match all mean "not present".
//!
//! # Examples
//! ```rust
//! use cookie_cart::pairs::{self, Separator};
//!
//! let cookies = b"username=bob; item1=green+apple";
//! assert_eq!(pairs::get(Some(cookies), "item1", Separator::Cookie).as_deref(), Some("green apple"));
//! assert_eq!(pairs::get(Some(cookies), "item2", Separator::Cookie), None);
//!
//! let query = b"filename=notes%2Etxt&x=1";
//! assert_eq!(pairs::get(Some(query), "FILENAME", Separator::Param).as_deref(), Some("notes.txt"));
//! ```

use crate::http::{codec, types::Span};
use memchr::{memchr, memchr_iter};

/// Separator between pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `;` as in `Cookie: a=1; b=2`
    Cookie,
    /// `&` as in `?a=1&b=2`
    Param,
}

impl Separator {
    #[inline(always)]
    const fn byte(self) -> u8 {
        match self {
            Separator::Cookie => b';',
            Separator::Param => b'&',
        }
    }
}

/// Returns the raw (still encoded) value span for `name`, relative to `src`.
#[inline]
pub(crate) fn find_span(src: &[u8], name: &[u8], separator: Separator) -> Option<Span> {
    if name.is_empty() {
        return None;
    }

    let eq = memchr_iter(b'=', src).find(|&eq| {
        eq >= name.len() && src[eq - name.len()..eq].eq_ignore_ascii_case(name)
    })?;

    let start = eq + 1;
    let end = memchr(separator.byte(), &src[start..])
        .map(|pos| start + pos)
        .unwrap_or(src.len());

    Some(Span::new(start, end))
}

/// Returns the raw (still encoded) value for `name`.
#[inline]
pub fn find<'a>(src: &'a [u8], name: &str, separator: Separator) -> Option<&'a [u8]> {
    find_span(src, name.as_bytes(), separator).map(|span| span.slice(src))
}

/// Returns the decoded value for `name`.
#[inline]
pub fn get(src: Option<&[u8]>, name: &str, separator: Separator) -> Option<String> {
    find(src?, name, separator).map(codec::decode_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn params() {
        #[rustfmt::skip]
        let cases = [
            ("username=bob",                  "username", Some("bob")),
            ("a=1&username=bob&b=2",          "username", Some("bob")),
            ("USERNAME=bob",                  "username", Some("bob")),
            ("username=",                     "username", Some("")),
            ("username=bob+smith",            "username", Some("bob smith")),
            ("url=http%3A%2F%2Fx.org%2F",     "url",      Some("http://x.org/")),
            ("url=a=b&c=d",                   "url",      Some("a=b")),
            ("user=bob",                      "username", None),
            ("username",                      "username", None),
            ("",                              "username", None),
            ("=bob",                          "username", None),
        ];

        for (src, name, expected) in cases {
            assert_eq!(
                get(Some(src.as_bytes()), name, Separator::Param).as_deref(),
                expected,
                "{src:?} / {name:?}"
            );
        }
    }

    #[test]
    fn cookies() {
        let header = b"username=bob; item1=apple; item2=green+pear; item11=fig";

        #[rustfmt::skip]
        let cases = [
            ("username", Some("bob")),
            ("item1",    Some("apple")),
            ("item2",    Some("green pear")),
            ("item11",   Some("fig")),
            ("item3",    None),
            ("item",     None),
        ];

        for (name, expected) in cases {
            assert_eq!(get(Some(header), name, Separator::Cookie).as_deref(), expected);
        }
    }

    #[test]
    fn raw_value_stays_encoded() {
        let src = b"item=red%20apple;next=1";

        assert_eq!(str(find(src, "item", Separator::Cookie)), Some("red%20apple"));
        assert_eq!(find(src, "item", Separator::Param), Some(&b"red%20apple;next=1"[..]));
    }

    #[test]
    fn name_matches_as_suffix() {
        // Only the bytes right before `=` are compared.
        let src = b"xusername=eve";
        assert_eq!(get(Some(src), "username", Separator::Param).as_deref(), Some("eve"));
    }

    #[test]
    fn absent_source() {
        assert_eq!(get(None, "username", Separator::Cookie), None);
        assert_eq!(get(Some(b""), "", Separator::Cookie), None);
    }
}
