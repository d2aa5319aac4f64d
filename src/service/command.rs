/// Logical operation a request maps to, chosen by the prefix of its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Login,
    Logout,
    ServerTime,
    Browser,
    Redirect,
    GetFile,
    PutFile,
    AddCart,
    DelCart,
    Checkout,
    Close,
    /// No prefix matched; answered with `404`.
    Unknown,
}

impl Command {
    /// Searched in order, first match wins.
    #[rustfmt::skip]
    pub(crate) const PREFIXES: [(&'static [u8], Command); 11] = [
        (b"/login",      Command::Login),
        (b"/logout",     Command::Logout),
        (b"/servertime", Command::ServerTime),
        (b"/browser",    Command::Browser),
        (b"/redirect",   Command::Redirect),
        (b"/getfile",    Command::GetFile),
        (b"/putfile",    Command::PutFile),
        (b"/addcart",    Command::AddCart),
        (b"/delcart",    Command::DelCart),
        (b"/checkout",   Command::Checkout),
        (b"/close",      Command::Close),
    ];

    /// Case-insensitive prefix match of `path` against [`Self::PREFIXES`].
    #[inline]
    pub(crate) fn from_path(path: &[u8]) -> Self {
        Self::PREFIXES
            .iter()
            .find(|(prefix, _)| {
                path.len() >= prefix.len() && path[..prefix.len()].eq_ignore_ascii_case(prefix)
            })
            .map(|&(_, command)| command)
            .unwrap_or(Command::Unknown)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Command::Login => "LOGIN",
            Command::Logout => "LOGOUT",
            Command::ServerTime => "SERVERTIME",
            Command::Browser => "BROWSER",
            Command::Redirect => "REDIRECT",
            Command::GetFile => "GET_FILE",
            Command::PutFile => "PUT_FILE",
            Command::AddCart => "ADD_CART",
            Command::DelCart => "DEL_CART",
            Command::Checkout => "CHECKOUT",
            Command::Close => "CLOSE",
            Command::Unknown => "UNKNOWN",
        }
    }
}
