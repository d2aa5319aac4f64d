use std::{error, fmt, io};

/// Failures that end a connection.
///
/// Client mistakes inside a well-framed request are not errors: handlers
/// answer them with ordinary 403/404 responses.
#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    HeaderTooLarge,
    BodyTooLarge,

    ServiceUnavailable,

    Timeout,
    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr, $len:literal => $text:literal; )*) => {
        /// Canned response sent before closing, or `None` if the connection
        /// should just be dropped.
        pub(crate) const fn as_http(&self) -> Option<&'static [u8]> {
            match self {
                $(
                    Self::$name { .. } => Some(concat!(
                        "HTTP/1.1 ", $status_code, "\r\n",
                        "Connection: close\r\n",
                        "Content-Length: ", $len, "\r\n",
                        "Content-Type: text/plain\r\n",
                        "\r\n",
                        $text
                    ).as_bytes()),
                )*
                Self::Timeout | Self::Io(_) => None,
            }
        }
    };
}

impl ErrorKind {
    http_errors! {
        HeaderTooLarge: "431 Request Header Fields Too Large", "32"
            => "Request header fields too large\n";
        BodyTooLarge: "413 Payload Too Large", "23"
            => "Request body too large\n";

        ServiceUnavailable: "503 Service Unavailable", "37"
            => "Service unavailable, try again later\n";
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Io(err) => write!(f, "Io({})", err.0),
            other => write!(f, "{:?}", other),
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::frame::Frame;

    #[test]
    fn canned_responses_are_well_formed() {
        for kind in [
            ErrorKind::HeaderTooLarge,
            ErrorKind::BodyTooLarge,
            ErrorKind::ServiceUnavailable,
        ] {
            let wire = kind.as_http().unwrap();
            let frame = Frame::from_buffer(wire).unwrap();

            // Content-Length matches the text exactly.
            assert_eq!(frame.total_len(), wire.len(), "{kind}");
        }
    }

    #[test]
    fn silent_kinds() {
        assert_eq!(ErrorKind::Timeout.as_http(), None);

        let io = ErrorKind::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(io.as_http(), None);
        assert_eq!(io, ErrorKind::Io(IoError(io::ErrorKind::BrokenPipe.into())));
    }
}
