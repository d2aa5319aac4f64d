use crate::{
    cart::{Cart, MAX_SLOTS},
    http::{
        request::Request,
        response::{CacheControl, Response, SetCookie},
        types::StatusCode,
    },
    service::{
        command::Command,
        files::{FileStore, MAX_FILE_SIZE},
    },
    Handler,
};
use std::{io, path::PathBuf};
use tracing::{debug, error, warn};

const FORBIDDEN: &str = "Command forbidden\n";
const TOO_LARGE: &str = "File too large\n";

/// `max-age` of the `username` cookie: one day.
pub const SESSION_TTL: i64 = 24 * 60 * 60;

/// Settings of the cart application.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory `/getfile` and `/putfile` names resolve against (default: `.`)
    pub files_root: PathBuf,
    /// File every checkout listing is appended to (default: `CHECKOUT.txt`)
    pub checkout_log: PathBuf,
    /// Number of cart slots (default: `12`)
    pub max_slots: usize,
    /// Largest file `/getfile` sends, in bytes (default: `8 MiB`)
    pub max_file_size: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            files_root: PathBuf::from("."),
            checkout_log: PathBuf::from("CHECKOUT.txt"),
            max_slots: MAX_SLOTS,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

/// The cart application: maps each [`Command`] to its handler.
///
/// Session and cart live entirely in client cookies, so the service itself
/// only holds its configuration and the file store.
///
/// Whenever the request carries a `username` cookie, a plain response body
/// is prefixed with a `Username: <name>` line.
#[derive(Debug)]
pub struct CartService {
    files: FileStore,
    max_slots: usize,
}

impl CartService {
    pub fn new(config: ServiceConfig) -> Self {
        CartService {
            files: FileStore::new(config.files_root, config.checkout_log)
                .with_max_file_size(config.max_file_size),
            max_slots: config.max_slots,
        }
    }

    #[inline(always)]
    pub fn files(&self) -> &FileStore {
        &self.files
    }
}

impl Handler for CartService {
    async fn handle(&self, req: &Request, resp: &mut Response) {
        let username = present(req.cookie("username"));

        match req.command() {
            Command::Login => login(req, resp),
            Command::Logout => logout(username.as_deref(), resp),
            Command::ServerTime => server_time(resp),
            Command::Browser => browser(req, resp),
            Command::Redirect => redirect(req, resp),
            Command::GetFile => self.get_file(req, resp).await,
            Command::PutFile => self.put_file(req, resp).await,
            Command::AddCart => self.add_cart(req, resp),
            Command::DelCart => self.del_cart(req, resp),
            Command::Checkout => self.checkout(req, username.is_some(), resp).await,
            Command::Close => close(resp),
            Command::Unknown => not_found(resp),
        }

        if let Some(name) = &username {
            resp.prepend_user(name);
        }
    }
}

/// Required values must be non-empty.
#[inline]
fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[inline]
fn forbidden(resp: &mut Response, text: &str) {
    resp.status(StatusCode::Forbidden).body(text);
}

fn login(req: &Request, resp: &mut Response) {
    resp.cache_control(CacheControl::NoCache);

    match present(req.param("username")) {
        Some(name) => {
            debug!(user = %name, "login");
            resp.body(format!("Username: {name}\n"))
                .cookie(SetCookie::new("username", name, SESSION_TTL));
        }
        None => forbidden(resp, "Login failed\n"),
    }
}

fn logout(username: Option<&str>, resp: &mut Response) {
    match username {
        Some(name) => {
            debug!(user = %name, "logout");
            resp.body(format!("User {name} was logged out.\n"))
                .cookie(SetCookie::expire("username"));
        }
        None => {
            resp.body("Please login before logging out\n");
        }
    }
}

fn server_time(resp: &mut Response) {
    let now = chrono::Local::now().format("%a, %d %b %Y %T %z");

    resp.cache_control(CacheControl::NoCache)
        .body(format!("{now}\n"));
}

fn browser(req: &Request, resp: &mut Response) {
    resp.cache_control(CacheControl::Private);

    match req.header(b"user-agent").filter(|agent| !agent.is_empty()) {
        Some(agent) => {
            let mut body = b"User-Agent: ".to_vec();
            body.extend_from_slice(agent);
            body.push(b'\n');
            resp.body(body);
        }
        None => forbidden(resp, FORBIDDEN),
    }
}

/// A header value may not carry control bytes; CR or LF would end the
/// header early.
#[inline]
fn header_safe(value: &str) -> bool {
    !value.bytes().any(|byte| byte < 0x20 || byte == 0x7F)
}

fn redirect(req: &Request, resp: &mut Response) {
    match present(req.param("url")).filter(|url| header_safe(url)) {
        Some(url) => {
            resp.status(StatusCode::SeeOther).location(url);
        }
        None => forbidden(resp, FORBIDDEN),
    }
}

fn close(resp: &mut Response) {
    resp.close().body("The connection will now be closed\n");
}

fn not_found(resp: &mut Response) {
    resp.status(StatusCode::NotFound).body("Command not found\n");
}

impl CartService {
    #[inline]
    fn cart(&self, req: &Request) -> Cart {
        Cart::from_cookies(req.cookies(), self.max_slots)
    }

    async fn get_file(&self, req: &Request, resp: &mut Response) {
        let Some(path) = present(req.param("filename")).and_then(|name| self.files.resolve(&name))
        else {
            return forbidden(resp, FORBIDDEN);
        };

        let meta = match self.files.metadata(&path).await {
            Ok(meta) => meta,
            Err(err) => {
                debug!(path = %path.display(), %err, "file not served");
                resp.status(StatusCode::NotFound).body("File not found\n");
                return;
            }
        };
        resp.last_modified(meta.modified);

        let since = req
            .header_str("if-modified-since")
            .and_then(|value| httpdate::parse_http_date(value).ok());
        if since.is_some_and(|since| meta.modified <= since) {
            resp.status(StatusCode::NotModified).no_body();
            return;
        }

        if meta.len > self.files.max_file_size() {
            warn!(path = %path.display(), len = meta.len, "file over size limit");
            return forbidden(resp, TOO_LARGE);
        }

        match self.files.read(&path).await {
            Ok(content) => {
                resp.chunked(content);
            }
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!(path = %path.display(), %err, "file over size limit");
                forbidden(resp, TOO_LARGE);
            }
            Err(err) => {
                error!(path = %path.display(), %err, "file read failed");
                resp.status(StatusCode::NotFound).body("File not found\n");
            }
        }
    }

    async fn put_file(&self, req: &Request, resp: &mut Response) {
        resp.cache_control(CacheControl::NoCache);

        let (Some(name), Some(content)) = (
            present(req.body_param("filename")),
            req.body_param("content"),
        ) else {
            return forbidden(resp, FORBIDDEN);
        };
        let Some(path) = self.files.resolve(&name) else {
            return forbidden(resp, FORBIDDEN);
        };

        match self.files.write(&path, content.as_bytes()).await {
            Ok(()) => {
                resp.body(format!("{name} has been saved successfully.\n"));
            }
            Err(err) => {
                error!(path = %path.display(), %err, "file write failed");
                forbidden(resp, &format!("{name} could not be saved\n"));
            }
        }
    }

    fn add_cart(&self, req: &Request, resp: &mut Response) {
        let Some(item) = present(req.param("item")) else {
            return forbidden(resp, FORBIDDEN);
        };

        let cart = self.cart(req);
        match cart.add(&item) {
            Some(update) => {
                resp.cookies(update.cookies)
                    .body(cart.list(Some(&item), None));
            }
            None => {
                resp.body("Cart is full\n");
            }
        }
    }

    fn del_cart(&self, req: &Request, resp: &mut Response) {
        let Some(slot) = req.param("itemnr").and_then(|nr| nr.parse::<usize>().ok()) else {
            return forbidden(resp, FORBIDDEN);
        };

        let cart = self.cart(req);
        match cart.remove(slot) {
            Ok(update) => {
                resp.cookies(update.cookies)
                    .body(cart.list(None, Some(slot)));
            }
            Err(err) => {
                debug!(%err, "delcart refused");
                forbidden(resp, FORBIDDEN);
            }
        }
    }

    async fn checkout(&self, req: &Request, logged_in: bool, resp: &mut Response) {
        if !logged_in {
            return forbidden(resp, "User must be logged in to checkout\n");
        }

        let (listing, update) = self.cart(req).checkout();

        if let Err(err) = self.files.append_checkout(&listing).await {
            error!(%err, "checkout log append failed");
            return forbidden(resp, "Checkout could not be recorded\n");
        }

        resp.cookies(update.cookies).body(listing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cart::ITEM_TTL, http::response::Body, tools::*};
    use std::time::Duration;
    use tempfile::TempDir;

    fn service() -> (CartService, TempDir) {
        service_with(MAX_FILE_SIZE)
    }

    fn service_with(max_file_size: u64) -> (CartService, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let service = CartService::new(ServiceConfig {
            files_root: dir.path().to_path_buf(),
            checkout_log: dir.path().join("CHECKOUT.txt"),
            max_slots: MAX_SLOTS,
            max_file_size,
        });
        (service, dir)
    }

    async fn call(service: &CartService, head: &str) -> Response {
        let req = Request::from_bytes(head).unwrap();
        let mut resp = Response::new();
        service.handle(&req, &mut resp).await;
        resp
    }

    fn get(target: &str, cookies: &str) -> String {
        match cookies {
            "" => format!("GET {target} HTTP/1.1\r\n\r\n"),
            _ => format!("GET {target} HTTP/1.1\r\nCookie: {cookies}\r\n\r\n"),
        }
    }

    fn body(resp: &Response) -> &str {
        str_op(resp.body_bytes().unwrap_or_default())
    }

    #[tokio::test]
    async fn simple_commands() {
        let (service, _dir) = service();

        #[rustfmt::skip]
        let cases = [
            ("/bogus",                 "",             StatusCode::NotFound,  "Command not found\n"),
            ("/login?username=bob",    "",             StatusCode::Ok,        "Username: bob\n"),
            ("/login",                 "",             StatusCode::Forbidden, "Login failed\n"),
            ("/login?username=",       "",             StatusCode::Forbidden, "Login failed\n"),
            ("/logout",                "username=bob", StatusCode::Ok,        "Username: bob\nUser bob was logged out.\n"),
            ("/logout",                "",             StatusCode::Ok,        "Please login before logging out\n"),
            ("/browser",               "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/redirect",              "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/redirect?url=http%3A%2F%2Fx%2F%0D%0ASet-Cookie%3A%20username%3Dadmin",
                                       "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/redirect?url=http%3A%2F%2Fx%2F%0Ax", "", StatusCode::Forbidden, "Command forbidden\n"),
            ("/redirect?url=a%09b",    "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/redirect?url=a%7Fb",    "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/addcart",               "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/delcart?itemnr=x",      "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/delcart?itemnr=1",      "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/checkout",              "",             StatusCode::Forbidden, "User must be logged in to checkout\n"),
            ("/checkout",              "username=",    StatusCode::Forbidden, "User must be logged in to checkout\n"),
            ("/close",                 "",             StatusCode::Ok,        "The connection will now be closed\n"),
            ("/getfile",               "",             StatusCode::Forbidden, "Command forbidden\n"),
            ("/getfile?filename=nope", "",             StatusCode::NotFound,  "File not found\n"),
            ("/getfile?filename=..%2Fx", "",           StatusCode::Forbidden, "Command forbidden\n"),
        ];

        for (target, cookies, status, text) in cases {
            let resp = call(&service, &get(target, cookies)).await;

            assert_eq!(resp.status_code(), status, "{target}");
            assert_eq!(body(&resp), text, "{target}");
            assert_eq!(resp.location_value(), None, "{target}");
        }
    }

    #[tokio::test]
    async fn login_sets_session_cookie() {
        let (service, _dir) = service();
        let resp = call(&service, &get("/login?username=bob+smith", "")).await;

        assert_eq!(resp.cache(), CacheControl::NoCache);
        assert_eq!(
            resp.set_cookies(),
            [SetCookie::new("username", "bob smith", SESSION_TTL)]
        );

        let resp = call(&service, &get("/logout", "username=bob+smith")).await;
        assert_eq!(resp.set_cookies(), [SetCookie::expire("username")]);
    }

    #[tokio::test]
    async fn banner_follows_session_cookie() {
        let (service, _dir) = service();

        let resp = call(&service, &get("/servertime", "username=alice")).await;
        assert!(body(&resp).starts_with("Username: alice\n"));
        assert_eq!(resp.cache(), CacheControl::NoCache);

        let resp = call(&service, &get("/servertime", "")).await;
        assert!(!body(&resp).contains("Username"));

        let resp = call(&service, &get("/bogus", "username=alice")).await;
        assert_eq!(body(&resp), "Username: alice\nCommand not found\n");
    }

    #[tokio::test]
    async fn browser_echoes_user_agent() {
        let (service, _dir) = service();
        let resp = call(
            &service,
            "GET /browser HTTP/1.1\r\nUser-Agent:  curl/8.4.0 \r\n\r\n",
        )
        .await;

        assert_eq!(body(&resp), "User-Agent: curl/8.4.0\n");
        assert_eq!(resp.cache(), CacheControl::Private);
    }

    #[tokio::test]
    async fn redirect() {
        let (service, _dir) = service();
        let resp = call(
            &service,
            &get("/redirect?url=http%3A%2F%2Fexample.com%2F", "username=bob"),
        )
        .await;

        assert_eq!(resp.status_code(), StatusCode::SeeOther);
        assert_eq!(resp.location_value(), Some("http://example.com/"));
        assert_eq!(resp.body_bytes(), None);
    }

    #[tokio::test]
    async fn close_ends_connection() {
        let (service, _dir) = service();
        let resp = call(&service, &get("/close", "")).await;

        assert!(resp.is_close());
        assert!(!call(&service, &get("/servertime", "")).await.is_close());
    }

    #[tokio::test]
    async fn cart_flow() {
        let (service, _dir) = service();

        let resp = call(&service, &get("/addcart?item=apple", "username=bob")).await;
        assert_eq!(body(&resp), "Username: bob\n1. apple\n");
        assert_eq!(resp.set_cookies(), [SetCookie::new("item1", "apple", ITEM_TTL)]);

        let jar = "username=bob; item1=apple; item2=pear; item3=fig";
        let resp = call(&service, &get("/addcart?item=green+tea", jar)).await;
        assert_eq!(
            body(&resp),
            "Username: bob\n1. apple\n2. pear\n3. fig\n4. green tea\n"
        );
        assert_eq!(resp.set_cookies(), [SetCookie::new("item4", "green tea", ITEM_TTL)]);

        let resp = call(&service, &get("/delcart?itemnr=2", jar)).await;
        assert_eq!(body(&resp), "Username: bob\n1. apple\n2. fig\n");
        assert_eq!(
            resp.set_cookies(),
            [
                SetCookie::new("item2", "fig", ITEM_TTL),
                SetCookie::expire("item3"),
            ]
        );

        let resp = call(&service, &get("/delcart?itemnr=4", jar)).await;
        assert_eq!(resp.status_code(), StatusCode::Forbidden);
        assert!(resp.set_cookies().is_empty());
    }

    #[tokio::test]
    async fn full_cart() {
        let (service, _dir) = service();
        let jar: Vec<String> = (1..=MAX_SLOTS).map(|n| format!("item{n}=x{n}")).collect();

        let resp = call(&service, &get("/addcart?item=more", &jar.join("; "))).await;
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(body(&resp), "Cart is full\n");
        assert!(resp.set_cookies().is_empty());
    }

    #[tokio::test]
    async fn checkout_appends_to_log() {
        let (service, dir) = service();
        let jar = "username=bob; item1=apple; item2=pear";

        let resp = call(&service, &get("/checkout", jar)).await;
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(body(&resp), "Username: bob\n1. apple\n2. pear\n");
        assert_eq!(
            resp.set_cookies(),
            [SetCookie::expire("item1"), SetCookie::expire("item2")]
        );

        call(&service, &get("/checkout", "username=eve; item1=fig")).await;

        let log = std::fs::read_to_string(dir.path().join("CHECKOUT.txt")).unwrap();
        assert_eq!(log, "1. apple\n2. pear\n1. fig\n");
    }

    #[tokio::test]
    async fn put_then_get_file() {
        let (service, dir) = service();
        let put = "POST /putfile HTTP/1.1\r\nContent-Length: 35\r\n\r\nfilename=notes.txt&content=hi+there";

        let resp = call(&service, put).await;
        assert_eq!(body(&resp), "notes.txt has been saved successfully.\n");
        assert_eq!(resp.cache(), CacheControl::NoCache);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "hi there"
        );

        let resp = call(&service, &get("/getfile?filename=notes.txt", "username=bob")).await;
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(resp.body_kind(), &Body::Chunked(b"hi there".to_vec()));
    }

    #[tokio::test]
    async fn put_file_requires_both_params() {
        let (service, _dir) = service();

        #[rustfmt::skip]
        let cases = [
            "filename=a.txt",
            "content=abc",
            "filename=&content=abc",
            "filename=..%2Fa.txt&content=abc",
        ];

        for form in cases {
            let put = format!(
                "POST /putfile HTTP/1.1\r\nContent-Length: {}\r\n\r\n{form}",
                form.len()
            );
            let resp = call(&service, &put).await;
            assert_eq!(resp.status_code(), StatusCode::Forbidden, "{form}");
        }
    }

    #[tokio::test]
    async fn oversized_file_is_refused() {
        let (service, dir) = service_with(4);
        std::fs::write(dir.path().join("small"), b"1234").unwrap();
        std::fs::write(dir.path().join("big"), b"12345").unwrap();

        let resp = call(&service, &get("/getfile?filename=small", "")).await;
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(resp.body_kind(), &Body::Chunked(b"1234".to_vec()));

        let resp = call(&service, &get("/getfile?filename=big", "")).await;
        assert_eq!(resp.status_code(), StatusCode::Forbidden);
        assert_eq!(body(&resp), "File too large\n");
    }

    #[tokio::test]
    async fn conditional_get() {
        let (service, dir) = service();
        std::fs::write(dir.path().join("data.bin"), b"\x00\xFFpayload").unwrap();

        let path = service.files().resolve("data.bin").unwrap();
        let modified = service.files().metadata(&path).await.unwrap().modified;

        let request = |since: std::time::SystemTime| {
            format!(
                "GET /getfile?filename=data.bin HTTP/1.1\r\nIf-Modified-Since: {}\r\n\r\n",
                httpdate::fmt_http_date(since)
            )
        };

        for since in [modified, modified + Duration::from_secs(60)] {
            let resp = call(&service, &request(since)).await;
            assert_eq!(resp.status_code(), StatusCode::NotModified);
            assert_eq!(resp.body_bytes(), None);
        }

        let resp = call(&service, &request(modified - Duration::from_secs(1))).await;
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(resp.body_bytes(), Some(&b"\x00\xFFpayload"[..]));

        let resp = call(
            &service,
            "GET /getfile?filename=data.bin HTTP/1.1\r\nIf-Modified-Since: yesterday\r\n\r\n",
        )
        .await;
        assert_eq!(resp.status_code(), StatusCode::Ok);
    }
}
