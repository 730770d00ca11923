//! Error and Result types for the flow core.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Result type returned from fallible flow operations.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Errors that can occur while driving a connection.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// The request or status line could not be parsed.
    Parse,
    /// A header line was malformed.
    Header,
    /// The peer's major HTTP version is not supported (>= 2).
    UnsupportedVersion,
    /// `Transfer-Encoding: chunked` was present; chunked bodies are unsupported.
    UnsupportedTransferEncoding,
    /// The declared `Content-Length` exceeds the configured cap.
    BodyTooLarge,
    /// The peer closed mid-message.
    IncompleteMessage,
    /// An `io::Error` occurred reading or writing the transport.
    Io,
    /// `AsyncWrite::shutdown` (or its equivalent) failed.
    Shutdown,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with_cause<C: Into<Cause>>(kind: Kind, cause: C) -> Error {
        Error {
            inner: Box::new(ErrorImpl {
                kind,
                cause: Some(cause.into()),
            }),
        }
    }

    pub(crate) fn new_parse() -> Error {
        Error::new(Kind::Parse)
    }

    pub(crate) fn new_header() -> Error {
        Error::new(Kind::Header)
    }

    pub(crate) fn new_version() -> Error {
        Error::new(Kind::UnsupportedVersion)
    }

    pub(crate) fn new_chunked_unsupported() -> Error {
        Error::new(Kind::UnsupportedTransferEncoding)
    }

    pub(crate) fn new_body_too_large() -> Error {
        Error::new(Kind::BodyTooLarge)
    }

    pub(crate) fn new_incomplete() -> Error {
        Error::new(Kind::IncompleteMessage)
    }

    pub(crate) fn new_io(cause: io::Error) -> Error {
        Error::with_cause(Kind::Io, cause)
    }

    pub(crate) fn new_shutdown(cause: io::Error) -> Error {
        Error::with_cause(Kind::Shutdown, cause)
    }

    /// Returns true if this error originated while parsing the wire format.
    pub fn is_parse(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Parse | Kind::Header | Kind::UnsupportedTransferEncoding
        )
    }

    /// Returns true if this error is an unsupported major HTTP version.
    pub fn is_version_error(&self) -> bool {
        matches!(self.inner.kind, Kind::UnsupportedVersion)
    }

    /// Returns true if the declared body exceeded the configured cap.
    pub fn is_body_too_large(&self) -> bool {
        matches!(self.inner.kind, Kind::BodyTooLarge)
    }

    /// Returns true if this error came from the underlying transport.
    pub fn is_io(&self) -> bool {
        matches!(self.inner.kind, Kind::Io | Kind::Shutdown)
    }

    pub(crate) fn kind(&self) -> &Kind {
        &self.inner.kind
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("Error");
        builder.field("kind", &self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            builder.field("cause", cause);
        }
        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Parse => f.write_str("invalid request or status line"),
            Kind::Header => f.write_str("invalid header"),
            Kind::UnsupportedVersion => f.write_str("unsupported HTTP major version"),
            Kind::UnsupportedTransferEncoding => {
                f.write_str("chunked transfer-encoding is not supported")
            }
            Kind::BodyTooLarge => f.write_str("declared body exceeds the configured limit"),
            Kind::IncompleteMessage => f.write_str("connection closed mid-message"),
            Kind::Io => f.write_str("transport error"),
            Kind::Shutdown => f.write_str("error shutting down transport"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.cause.as_ref().map(|c| &**c as _)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::new_io(err)
    }
}
