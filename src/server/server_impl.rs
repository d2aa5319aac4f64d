use crate::{
    errors::ErrorKind,
    http::{request::Request, response::Response},
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits, WaitStrategy},
    server::connection::{writer, HttpConnection},
};
use crossbeam::queue::SegQueue;
use std::{
    future::Future,
    io,
    marker::{Send, Sync},
    net::SocketAddr,
    sync::Arc,
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::sleep as tokio_sleep,
};
use tracing::{info, warn};

/// Turns a parsed request into a response.
///
/// Called once per request. Anything the client did wrong inside a
/// well-framed request is answered through `response`; there is no error
/// channel.
///
/// # Examples
///
/// ```
/// use cookie_cart::{Command, Handler, Request, Response, StatusCode};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     async fn handle(&self, req: &Request, resp: &mut Response) {
///         match req.command() {
///             Command::Unknown => resp.status(StatusCode::NotFound).body("Command not found\n"),
///             _ => resp.body("hello\n"),
///         };
///     }
/// }
/// ```
pub trait Handler
where
    Self: Sync + Send + 'static,
{
    /// Fills in `response` for `request`.
    ///
    /// The connection adds `Connection: close` on its own when the request
    /// asked for it or the connection limits ran out.
    fn handle(&self, request: &Request, response: &mut Response) -> impl Future<Output = ()> + Send;
}

/// Accept loop in front of a fixed pool of connection workers.
///
/// Accepted sockets go into a lock-free queue drained by
/// [`ServerLimits::max_connections`] worker tasks. When more than
/// [`ServerLimits::max_pending_connections`] sockets are waiting, new ones
/// are handed to separate tasks that answer `503` and close.
///
/// # Examples
///
/// ```no_run
/// use cookie_cart::{CartService, Server, ServiceConfig};
/// use tokio::net::TcpListener;
///
/// #[tokio::main]
/// async fn main() {
///     Server::builder()
///         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
///         .handler(CartService::new(ServiceConfig::default()))
///         .build()
///         .launch()
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    stream_queue: TcpQueue,
    error_queue: TcpQueue,
    server_limits: ServerLimits,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder<H: Handler>() -> ServerBuilder<H> {
        ServerBuilder {
            listener: None,
            handler: None,

            server_limits: None,
            request_limits: None,
            response_limits: None,
            connection_limits: None,
        }
    }

    /// Address the listener is bound to.
    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever.
    pub async fn launch(self) {
        info!(
            addr = ?self.listener.local_addr().ok(),
            workers = self.server_limits.max_connections,
            "listening"
        );

        loop {
            let value = match self.listener.accept().await {
                Ok(value) => value,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            };

            match self.stream_queue.len() < self.server_limits.max_pending_connections {
                true => self.stream_queue.push(value),
                false => {
                    warn!(peer = %value.1, "connection queue full");
                    self.error_queue.push(value)
                }
            }
        }
    }

    #[inline]
    async fn get_stream(queue: &TcpQueue, wait: &WaitStrategy) -> (TcpStream, SocketAddr) {
        loop {
            if let Some(value) = queue.pop() {
                return value;
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
            }
        }
    }
}

//

/// Builder for configuring and creating [`Server`] instances.
///
/// [`listener`](Self::listener) and [`handler`](Self::handler) are
/// required; every limit falls back to its `Default`.
///
/// # Examples
///
/// ```no_run
/// use cookie_cart::{limits::ConnLimits, CartService, Server, ServiceConfig};
/// use std::time::Duration;
/// use tokio::net::TcpListener;
///
/// # #[tokio::main]
/// # async fn main() {
/// let server = Server::builder()
///     .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
///     .handler(CartService::new(ServiceConfig::default()))
///     .connection_limits(ConnLimits {
///         socket_read_timeout: Duration::from_secs(5),
///         ..ConnLimits::default()
///     })
///     .build();
/// # }
/// ```
pub struct ServerBuilder<H: Handler> {
    listener: Option<TcpListener>,
    handler: Option<Arc<H>>,

    server_limits: Option<ServerLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
    connection_limits: Option<ConnLimits>,
}

impl<H: Handler> ServerBuilder<H> {
    /// Sets the TCP listener that the server will use to accept connections.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the request handler that will process incoming requests.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Spawns the workers and returns the [`Server`] ready to
    /// [`launch`](Server::launch).
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Panics
    ///
    /// Error messages:
    /// - ``The `listener` method must be called to create``
    /// - ``The `handler` method must be called to create``
    ///
    /// Panics when:
    /// - The `listener` method was not called.
    /// - The `handler` method was not called.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let (listener, handler, limits) = self.get_all_parts();

        let stream_queue = Arc::new(SegQueue::new());
        let error_queue = Arc::new(SegQueue::new());

        for _ in 0..limits.0.max_connections {
            Self::spawn_worker(&stream_queue, &limits, &handler);
        }
        if limits.0.count_503_handlers != 0 {
            for _ in 0..limits.0.count_503_handlers {
                Self::spawn_alarmist(&error_queue, &limits);
            }
        } else {
            Self::spawn_quiet_alarmist(&error_queue, &limits);
        }

        Server {
            listener,
            stream_queue,
            error_queue,
            server_limits: limits.0,
        }
    }

    #[inline]
    fn spawn_worker(queue: &TcpQueue, limits: &AllLimits, handler: &Arc<H>) {
        let queue = queue.clone();
        let mut conn = HttpConnection::new(handler.clone(), limits.clone());

        tokio::spawn(async move {
            loop {
                let (mut stream, addr) =
                    Server::get_stream(&queue, &conn.server_limits.wait_strategy).await;

                match conn.run(&mut stream).await {
                    Ok(closed) => info!(peer = %addr, ?closed, "connection closed"),
                    Err(err) => info!(peer = %addr, %err, "connection dropped"),
                }
            }
        });
    }

    #[inline]
    fn spawn_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let (server_limits, conn_limits, ..) = limits.clone();

        tokio::spawn(async move {
            loop {
                let (mut stream, _) =
                    Server::get_stream(&queue, &server_limits.wait_strategy).await;

                let _ = writer::send_error(
                    &mut stream,
                    &ErrorKind::ServiceUnavailable,
                    conn_limits.socket_write_timeout,
                )
                .await;
            }
        });
    }

    #[inline]
    fn spawn_quiet_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let (server_limits, ..) = limits.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = Server::get_stream(&queue, &server_limits.wait_strategy).await;

                drop(stream);
            }
        });
    }

    #[inline]
    #[track_caller]
    fn get_all_parts(self) -> (TcpListener, Arc<H>, AllLimits) {
        (
            self.listener
                .expect("The `listener` method must be called to create"),
            self.handler
                .expect("The `handler` method must be called to create"),
            (
                self.server_limits.unwrap_or_default(),
                self.connection_limits.unwrap_or_default(),
                self.request_limits.unwrap_or_default(),
                self.response_limits.unwrap_or_default(),
            ),
        )
    }
}

type TcpQueue = Arc<SegQueue<(TcpStream, SocketAddr)>>;
pub(crate) type AllLimits = (ServerLimits, ConnLimits, ReqLimits, RespLimits);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tools::read_response, CartService, ServiceConfig};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    async fn start(server_limits: ServerLimits, dir: &tempfile::TempDir) -> SocketAddr {
        let config = ServiceConfig {
            files_root: dir.path().to_path_buf(),
            checkout_log: dir.path().join("CHECKOUT.txt"),
            ..ServiceConfig::default()
        };
        let server = Server::builder()
            .listener(TcpListener::bind("127.0.0.1:0").await.unwrap())
            .handler(CartService::new(config))
            .server_limits(server_limits)
            .build();

        let addr = server.local_addr().unwrap();
        tokio::spawn(server.launch());
        addr
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn serves_a_session_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ServerLimits {
            max_connections: 2,
            ..ServerLimits::default()
        };
        let mut stream = TcpStream::connect(start(limits, &dir).await).await.unwrap();

        stream
            .write_all(b"GET /login?username=bob HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let resp = read_response(&mut stream).await.unwrap();
        assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(resp.contains("Set-Cookie: username=bob; max-age=86400; path=/\r\n"));

        stream
            .write_all(b"GET /addcart?item=tea HTTP/1.1\r\nCookie: username=bob\r\n\r\n")
            .await
            .unwrap();
        let resp = read_response(&mut stream).await.unwrap();
        assert!(resp.ends_with("\r\n\r\nUsername: bob\n1. tea\n"), "{resp}");

        stream.write_all(b"GET /close HTTP/1.1\r\n\r\n").await.unwrap();
        let resp = read_response(&mut stream).await.unwrap();
        assert!(resp.contains("Connection: close\r\n"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overflow_gets_503() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ServerLimits {
            max_connections: 0,
            max_pending_connections: 0,
            wait_strategy: WaitStrategy::Sleep(Duration::from_millis(1)),
            ..ServerLimits::default()
        };
        let mut stream = TcpStream::connect(start(limits, &dir).await).await.unwrap();

        let resp = read_response(&mut stream).await.unwrap();
        assert!(resp.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(resp.contains("Connection: close\r\n"));
    }
}
