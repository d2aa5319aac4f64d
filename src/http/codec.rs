//! Percent-encoding for values carried in query strings, form bodies and cookies.
//!
//! The dialect is `application/x-www-form-urlencoded` with one deliberate
//! quirk in [`decode`]: a `%` that is not followed by two hex digits ends the
//! value instead of being passed through or rejected.
//!
//! # Examples
//! ```
//! use cookie_cart::codec::{decode, encode};
//!
//! assert_eq!(encode(b"apple pie/2"), "apple+pie%2F2");
//! assert_eq!(decode(b"apple+pie%2F2"), b"apple pie/2");
//!
//! // Truncation on a malformed escape
//! assert_eq!(decode(b"half%2"), b"half");
//! ```

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Encodes `src`: ASCII alphanumerics pass through, space becomes `+`,
/// every other byte becomes `%XX` with uppercase hex digits.
///
/// The output is at most `3 * src.len()` bytes long.
pub fn encode(src: &[u8]) -> String {
    let mut out = String::with_capacity(src.len() * 3);

    for &byte in src {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => out.push(byte as char),
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(HEX[(byte >> 4) as usize] as char);
                out.push(HEX[(byte & 0x0F) as usize] as char);
            }
        }
    }

    out
}

/// Decodes `src`: `+` becomes space and `%XX` becomes the byte `0xXX`.
///
/// A `%` without two valid hex digits after it terminates decoding and the
/// prefix decoded so far is returned.
pub fn decode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;

    while i < src.len() {
        match src[i] {
            b'+' => out.push(b' '),
            b'%' => match (hex_value(src.get(i + 1)), hex_value(src.get(i + 2))) {
                (Some(high), Some(low)) => {
                    out.push(high << 4 | low);
                    i += 2;
                }
                _ => break,
            },
            byte => out.push(byte),
        }
        i += 1;
    }

    out
}

/// [`decode`] followed by a UTF-8 check; invalid sequences are replaced
/// with `U+FFFD`.
pub fn decode_str(src: &[u8]) -> String {
    String::from_utf8(decode(src))
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

#[inline(always)]
fn hex_value(byte: Option<&u8>) -> Option<u8> {
    match *byte? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
