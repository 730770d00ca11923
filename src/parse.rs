//! Line-at-a-time parsing of request lines, status lines, and headers.
//!
//! Unlike a whole-buffer parser, which wants the entire head in one slice,
//! the flow hands us one already-delimited line at a time (the transport
//! guarantees a complete line is present before handing it back). So the
//! first-line and header-line parsers here work on a single `&[u8]` with
//! no leftover-bytes bookkeeping of their own.

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

use crate::error::Error;

/// A wire HTTP version, kept as raw `(major, minor)` rather than
/// `http::Version` because the flow must reject *any* major >= 2,
/// including values `http::Version` has no constant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl HttpVersion {
    pub const HTTP_10: HttpVersion = HttpVersion { major: 1, minor: 0 };
    pub const HTTP_11: HttpVersion = HttpVersion { major: 1, minor: 1 };

    /// True iff this is a version the flow can speak (HTTP/1.0 or HTTP/1.1).
    pub fn is_supported(self) -> bool {
        self.major == 1
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

fn parse_version(token: &[u8]) -> Result<HttpVersion, Error> {
    let s = std::str::from_utf8(token).map_err(|_| Error::new_parse())?;
    let rest = s.strip_prefix("HTTP/").ok_or_else(Error::new_parse)?;
    let (major_s, minor_s) = rest.split_once('.').ok_or_else(Error::new_parse)?;
    let major: u8 = major_s.parse().map_err(|_| Error::new_parse())?;
    let minor: u8 = minor_s.parse().map_err(|_| Error::new_parse())?;
    Ok(HttpVersion { major, minor })
}

/// The parsed first line of an inbound request.
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: Method,
    pub uri: Uri,
    pub version: HttpVersion,
}

/// The parsed first line of an inbound status reply.
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub version: HttpVersion,
    pub status: StatusCode,
    pub reason: String,
}

/// Strips a trailing `\r\n` or `\n` from a line read up to (and including) `\n`.
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parses `METHOD SP resource SP HTTP/MAJOR.MINOR`.
pub fn parse_request_line(line: &[u8]) -> Result<RequestLine, Error> {
    let line = trim_line_ending(line);
    let mut parts = line.splitn(3, |&b| b == b' ');
    let method = parts.next().ok_or_else(Error::new_parse)?;
    let target = parts.next().ok_or_else(Error::new_parse)?;
    let version = parts.next().ok_or_else(Error::new_parse)?;

    let method = Method::from_bytes(method).map_err(|_| Error::new_parse())?;
    let uri: Uri = std::str::from_utf8(target)
        .map_err(|_| Error::new_parse())?
        .parse()
        .map_err(|_| Error::new_parse())?;
    let version = parse_version(version)?;

    Ok(RequestLine {
        method,
        uri,
        version,
    })
}

/// Parses `HTTP/MAJOR.MINOR SP code SP reason`.
pub fn parse_status_line(line: &[u8]) -> Result<StatusLine, Error> {
    let line = trim_line_ending(line);
    let mut parts = line.splitn(3, |&b| b == b' ');
    let version = parts.next().ok_or_else(Error::new_parse)?;
    let code = parts.next().ok_or_else(Error::new_parse)?;
    let reason = parts.next().unwrap_or(b"");

    let version = parse_version(version)?;
    let code_str = std::str::from_utf8(code).map_err(|_| Error::new_parse())?;
    let status = StatusCode::from_bytes(code_str.as_bytes()).map_err(|_| Error::new_parse())?;
    let reason = String::from_utf8_lossy(reason).into_owned();

    Ok(StatusLine {
        version,
        status,
        reason,
    })
}

/// Outcome of absorbing one line while in the `Header` state.
pub enum HeaderLine {
    /// A `Name: Value` pair was parsed and should be inserted.
    Field(HeaderName, HeaderValue),
    /// The blank line terminating the header block was seen.
    Blank,
}

/// Absorbs one header line, mirroring the source's `absorb(line) -> complete?`
/// contract: returns `HeaderLine::Blank` when the header block is done.
pub fn absorb_header_line(line: &[u8]) -> Result<HeaderLine, Error> {
    let line = trim_line_ending(line);
    if line.is_empty() {
        return Ok(HeaderLine::Blank);
    }

    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(Error::new_header)?;
    let (name, value) = line.split_at(colon);
    let value = &value[1..];
    let value = trim_ascii_whitespace(value);

    let name = HeaderName::from_bytes(name).map_err(|_| Error::new_header())?;
    let value = HeaderValue::from_bytes(value).map_err(|_| Error::new_header())?;
    Ok(HeaderLine::Field(name, value))
}

fn trim_ascii_whitespace(buf: &[u8]) -> &[u8] {
    let start = buf.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(buf.len());
    let end = buf.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &buf[start..end]
}

/// Determines the declared body length for an inbound message.
///
/// Per RFC 7230 §3.3.3: a `Transfer-Encoding: chunked` header means chunked
/// decoding would be required (rejected, see [`Error::new_chunked_unsupported`]);
/// otherwise a single, valid `Content-Length` sets the length; its absence
/// means no body (length 0).
pub fn content_length(headers: &HeaderMap) -> Result<u64, Error> {
    if headers.contains_key(http::header::TRANSFER_ENCODING) {
        return Err(Error::new_chunked_unsupported());
    }

    let mut values = headers.get_all(http::header::CONTENT_LENGTH).iter();
    let Some(first) = values.next() else {
        return Ok(0);
    };
    if values.next().is_some() {
        // Multiple differing Content-Length headers: malformed per spec.
        return Err(Error::new_header());
    }
    let s = first.to_str().map_err(|_| Error::new_header())?;
    s.parse::<u64>().map_err(|_| Error::new_header())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_get_request_line() {
        let rl = parse_request_line(b"GET /widgets?id=9 HTTP/1.1\r\n").unwrap();
        assert_eq!(rl.method, Method::GET);
        assert_eq!(rl.uri.to_string(), "/widgets?id=9");
        assert_eq!(rl.version, HttpVersion::HTTP_11);
    }

    #[test]
    fn rejects_a_request_line_missing_a_field() {
        assert!(parse_request_line(b"GET /\r\n").is_err());
    }

    #[test]
    fn rejects_an_unknown_major_version() {
        let rl = parse_request_line(b"GET / HTTP/2.0\r\n").unwrap();
        assert!(!rl.version.is_supported());
    }

    #[test]
    fn parses_a_status_line_with_multiword_reason() {
        let sl = parse_status_line(b"HTTP/1.1 404 Not Found\r\n").unwrap();
        assert_eq!(sl.status, StatusCode::NOT_FOUND);
        assert_eq!(sl.reason, "Not Found");
    }

    #[test]
    fn absorbs_a_header_field_trimming_value_whitespace() {
        match absorb_header_line(b"X-Token:  abc123  \r\n").unwrap() {
            HeaderLine::Field(name, value) => {
                assert_eq!(name, "x-token");
                assert_eq!(value, "abc123");
            }
            HeaderLine::Blank => panic!("expected a field"),
        }
    }

    #[test]
    fn absorbs_a_blank_line_as_the_header_terminator() {
        assert!(matches!(absorb_header_line(b"\r\n").unwrap(), HeaderLine::Blank));
    }

    #[test]
    fn rejects_a_header_line_without_a_colon() {
        assert!(absorb_header_line(b"not-a-header\r\n").is_err());
    }

    #[test]
    fn content_length_defaults_to_zero_when_absent() {
        let headers = HeaderMap::new();
        assert_eq!(content_length(&headers).unwrap(), 0);
    }

    #[test]
    fn content_length_reads_a_single_valid_header() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_LENGTH, "42".parse().unwrap());
        assert_eq!(content_length(&headers).unwrap(), 42);
    }

    #[test]
    fn content_length_rejects_duplicate_headers() {
        let mut headers = HeaderMap::new();
        headers.append(http::header::CONTENT_LENGTH, "1".parse().unwrap());
        headers.append(http::header::CONTENT_LENGTH, "2".parse().unwrap());
        assert!(content_length(&headers).is_err());
    }

    #[test]
    fn content_length_rejects_chunked_transfer_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        let err = content_length(&headers).unwrap_err();
        assert!(matches!(err.kind(), crate::error::Kind::UnsupportedTransferEncoding));
    }
}
