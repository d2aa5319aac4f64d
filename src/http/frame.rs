//! Request framing: deciding from a raw byte stream where the header ends
//! and whether the declared body has fully arrived.

use crate::{
    errors::ErrorKind,
    http::{
        request::find_header,
        types::{self, skip_space},
    },
    limits::ReqLimits,
};
use memchr::memchr_iter;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::timeout,
};

/// One complete request as read off the wire: header bytes, then body bytes.
///
/// The buffer may hold bytes past `total_len` (a pipelined follow-up, which
/// is not served); consumers must only look at `..total_len`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub(crate) buffer: Vec<u8>,
    pub(crate) header_len: usize,
    pub(crate) total_len: usize,
}

impl Frame {
    /// Frames a request that is already fully in memory.
    ///
    /// Returns `None` if the header is not terminated by a blank line or the
    /// buffer holds fewer body bytes than `Content-Length` declares.
    pub fn from_buffer<V: Into<Vec<u8>>>(buffer: V) -> Option<Self> {
        let buffer = buffer.into();
        let header_len = header_end(&buffer)?;
        let total_len = header_len + content_length(&buffer[..header_len]);

        (total_len <= buffer.len()).then_some(Frame {
            buffer,
            header_len,
            total_len,
        })
    }

    #[inline(always)]
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    #[inline(always)]
    pub fn total_len(&self) -> usize {
        self.total_len
    }
}

/// Returns the offset of the first body byte if `src` holds a complete
/// header, i.e. two line breaks with nothing between them (`\n\n` or
/// `\n\r\n`). Whitespace before the request line is skipped.
pub(crate) fn header_end(src: &[u8]) -> Option<usize> {
    let start = skip_space(src, 0);
    let mut breaks = memchr_iter(b'\n', &src[start..]).map(|i| i + start);

    let mut prev = breaks.next()?;
    for lf in breaks {
        if lf == prev + 1 || (lf == prev + 2 && src[prev + 1] == b'\r') {
            return Some(lf + 1);
        }
        prev = lf;
    }

    None
}

/// Declared body length; an absent or unparsable `Content-Length` means no body.
#[inline]
pub(crate) fn content_length(header: &[u8]) -> usize {
    find_header(header, b"content-length")
        .and_then(|span| types::slice_to_usize(span.slice(header)))
        .unwrap_or(0)
}

/// Accumulates bytes from a connection until a whole [`Frame`] is available.
///
/// The receive buffer starts at [`ReqLimits::initial_buffer_size`] and
/// doubles once more than half of it is in use, up to the configured caps.
#[derive(Debug)]
pub(crate) struct FrameReader {
    buffer: Vec<u8>,
    filled: usize,
    limits: ReqLimits,
}

impl FrameReader {
    #[inline]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        FrameReader {
            buffer: vec![0; limits.first_capacity()],
            filled: 0,
            limits: limits.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partial frame left by the previous connection.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.filled = 0;

        if self.buffer.len() != self.limits.first_capacity() {
            self.buffer = vec![0; self.limits.first_capacity()];
        }
    }

    /// Reads one frame.
    ///
    /// `Ok(None)` means the peer closed the connection before the frame was
    /// complete; no response should be sent.
    pub(crate) async fn read_frame<R>(
        &mut self,
        stream: &mut R,
        read_timeout: Duration,
    ) -> Result<Option<Frame>, ErrorKind>
    where
        R: AsyncRead + Unpin,
    {
        let header_len = loop {
            if let Some(end) = header_end(&self.buffer[..self.filled]) {
                break end;
            }
            if self.filled >= self.limits.max_header_size {
                return Err(ErrorKind::HeaderTooLarge);
            }

            self.grow(self.limits.max_header_size);
            if self.fill(stream, read_timeout).await? == 0 {
                return Ok(None);
            }
        };

        let body_len = content_length(&self.buffer[..header_len]);
        if body_len > self.limits.max_body_size {
            return Err(ErrorKind::BodyTooLarge);
        }

        let total_len = header_len + body_len;
        while self.filled < total_len {
            self.grow(total_len);
            if self.fill(stream, read_timeout).await? == 0 {
                return Ok(None);
            }
        }

        Ok(Some(self.take(header_len, total_len)))
    }

    /// Doubles the buffer, bounded by `cap`, when more than half is used.
    #[inline]
    fn grow(&mut self, cap: usize) {
        let capacity = self.buffer.len();

        if self.filled > capacity / 2 && capacity < cap {
            self.buffer.resize((capacity * 2).min(cap), 0);
        }
    }

    #[inline]
    async fn fill<R>(&mut self, stream: &mut R, read_timeout: Duration) -> Result<usize, ErrorKind>
    where
        R: AsyncRead + Unpin,
    {
        let n = timeout(read_timeout, stream.read(&mut self.buffer[self.filled..]))
            .await
            .map_err(|_| ErrorKind::Timeout)??;

        self.filled += n;
        Ok(n)
    }

    #[inline]
    fn take(&mut self, header_len: usize, total_len: usize) -> Frame {
        let fresh = vec![0; self.limits.first_capacity()];
        let mut buffer = std::mem::replace(&mut self.buffer, fresh);

        buffer.truncate(self.filled);
        self.filled = 0;

        Frame {
            buffer,
            header_len,
            total_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn header_completeness() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n",                     Some(18)),
            ("GET / HTTP/1.1\n\n",                         Some(16)),
            ("GET / HTTP/1.1\r\nHost: a\r\n\r\nbody",      Some(27)),
            ("GET / HTTP/1.1\nHost: a\n\nbody",            Some(24)),
            ("\r\n\r\n  GET / HTTP/1.1\r\n\r\n",           Some(24)),
            ("GET / HTTP/1.1\r\nHost: a\r\n",              None),
            ("GET / HTTP/1.1\r\n \r\n",                    None),
            ("GET / HTTP/1.1",                             None),
            ("",                                           None),
            ("\r\n\r\n",                                   None),
        ];

        for (src, expected) in cases {
            assert_eq!(header_end(src.as_bytes()), expected, "{src:?}");
        }
    }

    #[test]
    fn in_memory_frames() {
        let frame = Frame::from_buffer("POST /putfile HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcdEXTRA")
            .unwrap();
        assert_eq!(frame.header_len(), 45);
        assert_eq!(frame.total_len(), 49);

        assert!(Frame::from_buffer("POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\nabc").is_none());
        assert!(Frame::from_buffer("GET / HTTP/1.1\r\n").is_none());

        let no_length = Frame::from_buffer("GET / HTTP/1.1\r\nContent-Length: x\r\n\r\n").unwrap();
        assert_eq!(no_length.total_len(), no_length.header_len());
    }

    #[tokio::test]
    async fn reads_header_and_body_across_writes() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(&ReqLimits {
            initial_buffer_size: 8,
            ..ReqLimits::default()
        });

        let writer = tokio::spawn(async move {
            for part in [
                &b"POST /putfile HTTP/1.1\r\n"[..],
                b"Content-Length: 11\r\n",
                b"\r\nhello",
                b" world",
            ] {
                client.write_all(part).await.unwrap();
                tokio::task::yield_now().await;
            }
            client
        });

        let frame = reader.read_frame(&mut server, SECOND).await.unwrap().unwrap();
        assert_eq!(&frame.buffer[frame.header_len..frame.total_len], b"hello world");
        assert_eq!(frame.total_len, frame.buffer.len());
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn buffer_doubles() {
        let limits = ReqLimits {
            initial_buffer_size: 16,
            ..ReqLimits::default()
        };
        let mut reader = FrameReader::new(&limits);
        assert_eq!(reader.capacity(), 16);

        let mut request = b"GET /servertime HTTP/1.1\r\nUser-Agent: ".to_vec();
        request.extend(std::iter::repeat(b'x').take(100));
        request.extend_from_slice(b"\r\n\r\n");

        let mut src = &request[..];
        let frame = reader.read_frame(&mut src, SECOND).await.unwrap().unwrap();
        assert_eq!(frame.buffer, request);
        assert!(frame.buffer.capacity() >= 128);
        // A fresh buffer is ready for the next request.
        assert_eq!(reader.capacity(), 16);
    }

    #[tokio::test]
    async fn peer_close_is_not_an_error() {
        let cases: [&[u8]; 3] = [
            b"",
            b"GET / HTTP/1.1\r\nHost: x\r\n",
            b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc",
        ];

        for case in cases {
            let mut reader = FrameReader::new(&ReqLimits::default());
            let mut src = case;
            assert_eq!(reader.read_frame(&mut src, SECOND).await, Ok(None));
        }
    }

    #[tokio::test]
    async fn size_limits() {
        let limits = ReqLimits {
            initial_buffer_size: 16,
            max_header_size: 64,
            max_body_size: 8,
        };

        let mut long_header = b"GET / HTTP/1.1\r\nX-Pad: ".to_vec();
        long_header.extend(std::iter::repeat(b'a').take(100));
        let mut src = &long_header[..];
        let result = FrameReader::new(&limits).read_frame(&mut src, SECOND).await;
        assert_eq!(result, Err(ErrorKind::HeaderTooLarge));

        let mut src = &b"POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\n123456789"[..];
        let result = FrameReader::new(&limits).read_frame(&mut src, SECOND).await;
        assert_eq!(result, Err(ErrorKind::BodyTooLarge));
    }

    #[tokio::test]
    async fn stalled_peer_times_out() {
        let (_client, mut server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(&ReqLimits::default());

        let result = reader
            .read_frame(&mut server, Duration::from_millis(20))
            .await;
        assert_eq!(result, Err(ErrorKind::Timeout));
    }
}
