use crate::{
    errors::ErrorKind,
    http::{frame::FrameReader, request::Request, response::Response, types::Method},
    limits::{ConnLimits, RespLimits, ServerLimits},
    server::server_impl::{AllLimits, Handler},
};
use std::{
    sync::Arc,
    time::{Instant, SystemTime},
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// How a connection ended when no error was involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closed {
    /// The peer closed its side between requests.
    Peer,
    /// The last response carried `Connection: close`.
    Response,
    /// The request budget or the connection lifetime ran out.
    Limit,
}

/// Serves requests on one connection at a time.
///
/// Each worker owns one `HttpConnection` and reuses its receive and output
/// buffers for every connection it takes from the queue.
pub(crate) struct HttpConnection<H: Handler> {
    handler: Arc<H>,

    reader: FrameReader,
    output: Vec<u8>,

    pub(crate) server_limits: ServerLimits,
    pub(crate) conn_limits: ConnLimits,
    resp_limits: RespLimits,
}

impl<H: Handler> HttpConnection<H> {
    #[inline]
    pub(crate) fn new(handler: Arc<H>, limits: AllLimits) -> Self {
        let (server_limits, conn_limits, req_limits, resp_limits) = limits;

        Self {
            handler,

            reader: FrameReader::new(&req_limits),
            output: Vec::with_capacity(resp_limits.default_capacity),

            server_limits,
            conn_limits,
            resp_limits,
        }
    }

    #[inline]
    fn reset_output(&mut self) {
        if self.output.capacity() > self.resp_limits.max_capacity {
            self.output = Vec::with_capacity(self.resp_limits.default_capacity);
        } else {
            self.output.clear();
        }
    }
}

impl<H: Handler> HttpConnection<H> {
    /// Runs the request loop until the connection ends.
    ///
    /// Framing errors are answered with their canned response before the
    /// error is returned; timeouts and I/O errors close silently.
    pub(crate) async fn run<S>(&mut self, stream: &mut S) -> Result<Closed, ErrorKind>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.reader.reset();

        match self.impl_run(stream).await {
            Ok(closed) => Ok(closed),
            Err(err) => {
                let _ = writer::send_error(stream, &err, self.conn_limits.socket_write_timeout).await;
                Err(err)
            }
        }
    }

    async fn impl_run<S>(&mut self, stream: &mut S) -> Result<Closed, ErrorKind>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let created = Instant::now();
        let mut served = 0;

        loop {
            let read_timeout = self.conn_limits.socket_read_timeout;
            let Some(frame) = self.reader.read_frame(stream, read_timeout).await? else {
                return Ok(Closed::Peer);
            };

            let request = Request::parse(frame);
            debug!(
                method = request.method().as_str(),
                path = %String::from_utf8_lossy(request.path()),
                command = request.command().as_str(),
                "request"
            );

            let mut response = Response::new();
            self.handler.handle(&request, &mut response).await;

            served += 1;
            let exhausted = served >= self.conn_limits.max_requests_per_connection
                || created.elapsed() > self.conn_limits.connection_lifetime;
            if exhausted || request.wants_close() {
                response.close();
            }

            self.reset_output();
            response.write_to(
                &mut self.output,
                SystemTime::now(),
                self.resp_limits.chunk_size,
                request.method() == Method::Head,
            );
            writer::write_bytes(stream, &self.output, self.conn_limits.socket_write_timeout).await?;

            match (exhausted, response.is_close()) {
                (true, _) => return Ok(Closed::Limit),
                (false, true) => return Ok(Closed::Response),
                (false, false) => {}
            }
        }
    }
}

pub(crate) mod writer {
    use crate::errors::ErrorKind;
    use tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        time::{timeout, Duration},
    };

    /// Writes the canned response of `error`, if it has one.
    #[inline]
    pub(crate) async fn send_error<W>(
        stream: &mut W,
        error: &ErrorKind,
        write_timeout: Duration,
    ) -> Result<(), ErrorKind>
    where
        W: AsyncWrite + Unpin,
    {
        match error.as_http() {
            Some(response) => write_bytes(stream, response, write_timeout).await,
            None => Ok(()),
        }
    }

    /// Writes every byte of `response` and flushes, all within `write_timeout`.
    #[inline]
    pub(crate) async fn write_bytes<W>(
        stream: &mut W,
        response: &[u8],
        write_timeout: Duration,
    ) -> Result<(), ErrorKind>
    where
        W: AsyncWrite + Unpin,
    {
        let write = async {
            stream.write_all(response).await?;
            stream.flush().await
        };

        timeout(write_timeout, write)
            .await
            .map_err(|_| ErrorKind::Timeout)??;
        Ok(())
    }
}
