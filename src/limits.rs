//! Server configuration limits and timeouts
//!
//! Every struct has conservative defaults and public fields, so only the
//! values that matter need to be spelled out.
//!
//! # Memory Consumption
//!
//! Each active connection holds at most one request buffer (see
//! [`ReqLimits`]) and one response buffer (see [`RespLimits`]).
//!
//! # Examples
//!
//! ```no_run
//! use cookie_cart::{
//!     limits::{ConnLimits, ReqLimits, ServerLimits},
//!     CartService, Server, ServiceConfig,
//! };
//! use tokio::net::TcpListener;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .handler(CartService::new(ServiceConfig::default()))
//!         .server_limits(ServerLimits {
//!             max_connections: 500,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_body_size: 64 * 1024,
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls server-level concurrency, queueing and overload behavior.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-------------]
/// [ Add to queue ] <====== | Queue if full? | =====> [ Sending 503 ]
/// [--------------]         \----------------/        [-------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [---------]   Yes   /--------------------------\   No   [------]
/// [ Handler ] <====== | Is there a free handler? | =====> [ Wait ]
/// [---------]         \--------------------------/        [------]
/// ```
///
/// A worker is a long-running task created once at launch. It takes one
/// connection from the queue and serves it to completion before taking the
/// next, so requests on a connection are always handled one at a time.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of workers, i.e. connections served at once (default: `100`).
    pub max_connections: usize,

    /// Maximum number of accepted connections waiting for a worker (default: `250`).
    ///
    /// When the queue is full, new connections get an immediate `503`.
    pub max_pending_connections: usize,

    /// How idle workers wait for the queue (default: `Sleep(50μs)`).
    pub wait_strategy: WaitStrategy,

    /// Tasks dedicated to answering `503` on queue overflow (default: `1`).
    ///
    /// Set to 0 to drop overflowing connections without a response.
    pub count_503_handlers: usize,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_pending_connections: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            count_503_handlers: 1,
        }
    }
}

/// Strategy for worker task waiting when no connections are available
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`]
    ///
    /// Keeps a core busy; meant for benchmarks, not deployments.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`]
    Sleep(Duration),
}

/// Connection-level limits and timeouts
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum wait for the next bytes of a request (default: `10 seconds`)
    ///
    /// Applies to every socket read, including the idle wait between
    /// requests. Expiry closes the connection without a response.
    pub socket_read_timeout: Duration,

    /// Maximum wait for a response to be written (default: `10 seconds`)
    pub socket_write_timeout: Duration,

    /// Maximum number of requests served on one connection (default: `100`)
    pub max_requests_per_connection: usize,

    /// Maximum lifetime of a connection (default: `2 minutes`)
    ///
    /// Checked between requests; a request in progress is always finished.
    pub connection_lifetime: Duration,
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(10),
            socket_write_timeout: Duration::from_secs(10),
            max_requests_per_connection: 100,
            connection_lifetime: Duration::from_secs(120),
        }
    }
}

/// Request framing limits
///
/// # Memory Allocation Strategy
///
/// The receive buffer starts at `initial_buffer_size` and doubles whenever
/// more than half of it is filled. It never grows past `max_header_size`
/// while the header is incomplete, nor past the header plus the declared
/// `Content-Length` afterwards.
///
/// | Violation | Response |
/// |-----------|----------|
/// | no blank line within `max_header_size` bytes | `431 Request Header Fields Too Large` |
/// | `Content-Length` above `max_body_size` | `413 Payload Too Large` |
///
/// Both responses close the connection.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Starting capacity of the receive buffer (default: `1 KB`)
    pub initial_buffer_size: usize,
    /// Maximum size of the request line plus header lines (default: `16 KB`)
    pub max_header_size: usize,
    /// Maximum declared body size (default: `1 MB`)
    pub max_body_size: usize,
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            initial_buffer_size: 1024,
            max_header_size: 16 * 1024,
            max_body_size: 1024 * 1024,
        }
    }
}

impl ReqLimits {
    /// Capacity of a fresh receive buffer; never zero.
    #[inline(always)]
    pub(crate) fn first_capacity(&self) -> usize {
        self.initial_buffer_size.min(self.max_header_size).max(1)
    }
}

/// Configuration for response buffers and chunked bodies.
///
/// # Buffer Management
///
/// Each connection reuses one output buffer:
/// ```rust
/// # use cookie_cart::limits::RespLimits;
/// # let limits = RespLimits::default();
/// # let mut buffer: Vec<()> = Vec::with_capacity(limits.default_capacity);
/// #
/// if buffer.capacity() > limits.max_capacity {
///     buffer = Vec::with_capacity(limits.default_capacity);
/// } else {
///     buffer.clear();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial buffer capacity allocated for responses (default: `1024 B`)
    pub default_capacity: usize,
    /// Capacity above which the buffer is replaced after use (default: `64 KB`)
    pub max_capacity: usize,
    /// Payload size of one chunk in a chunked body (default: `4 KB`)
    pub chunk_size: usize,
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 64 * 1024,
            chunk_size: 4 * 1024,
        }
    }
}
