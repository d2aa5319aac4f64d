//! cookie_cart - a small HTTP shopping-cart service whose state lives in cookies
//!
//! The server frames requests off a byte stream, parses them without
//! copying, and dispatches each one by path prefix to a command handler.
//! Login sessions and the shopping cart are never stored on the server:
//! every request carries them as cookies and every response carries the
//! `Set-Cookie` mutations that produce the next state.
//!
//! # Commands
//!
//! | Path prefix   | Effect |
//! |---------------|--------|
//! | `/login`      | `?username=` sets the session cookie |
//! | `/logout`     | expires the session cookie |
//! | `/servertime` | local time of the server |
//! | `/browser`    | echoes `User-Agent` |
//! | `/redirect`   | `?url=` answers `303 See Other` |
//! | `/getfile`    | `?filename=` sends a file, chunked; honors `If-Modified-Since` |
//! | `/putfile`    | form body `filename` + `content` writes a file |
//! | `/addcart`    | `?item=` adds to the cart |
//! | `/delcart`    | `?itemnr=` removes from the cart |
//! | `/checkout`   | logs and empties the cart (login required) |
//! | `/close`      | closes the connection after responding |
//!
//! # Protocol
//!
//! - Requests are framed by the first blank line (`\n\n` or `\n\r\n`) plus
//!   `Content-Length` body bytes. Header and body sizes are capped by
//!   [`ReqLimits`](limits::ReqLimits).
//! - Connections stay open until `Connection: close` on either side, the
//!   [`ConnLimits`](limits::ConnLimits) run out, or the peer leaves.
//! - `HEAD` gets the headers a `GET` would get.
//!
//! # Examples
//!
//! ```no_run
//! use cookie_cart::{CartService, Server, ServiceConfig};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .handler(CartService::new(ServiceConfig {
//!             files_root: "public".into(),
//!             ..ServiceConfig::default()
//!         }))
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

pub(crate) mod http {
    pub mod codec;
    pub(crate) mod frame;
    pub mod pairs;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod service {
    pub(crate) mod command;
    pub(crate) mod files;
    pub(crate) mod handlers;
}
pub mod cart;
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    http::{
        codec,
        frame::Frame,
        pairs,
        request::Request,
        response::{Body, CacheControl, Connection, Response, SetCookie},
        types::{Method, StatusCode},
    },
    server::server_impl::{Handler, Server, ServerBuilder},
    service::{
        command::Command,
        files::FileStore,
        handlers::{CartService, ServiceConfig},
    },
};
