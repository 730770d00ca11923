//! Pure, I/O-free session state and its helpers.

use std::collections::{HashSet, VecDeque};

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

use crate::config::FlowConfig;
use crate::parse::{HttpVersion, RequestLine, StatusLine};
use crate::status::{Role, Status};

/// Methods ignored when deciding 404-vs-405, per `spec.md` §4.1
/// `trigger405`: a resource that only supports `OPTIONS`/`TRACE` (or
/// nothing) is treated as not found rather than method-not-allowed.
const IGNORED_METHODS: &[&Method] = &[&Method::OPTIONS, &Method::TRACE];

/// A single content-negotiation axis: intersect an inbound preference
/// header against a fixed list of values this session supports.
pub struct Negotiation {
    /// The inbound header carrying the client's preference (e.g. `Accept`).
    pub input_header: HeaderName,
    /// The outbound header to write the chosen value to, if any (e.g.
    /// `Accept` negotiates `Content-Type`).
    pub output_header: Option<HeaderName>,
    /// The values this session is able to produce, in preference order.
    pub supported: Vec<String>,
}

/// All per-connection mutable state, exactly as named in `spec.md` §3,
/// minus the `input` buffer (owned by the transport, see `SPEC_FULL.md`).
pub struct SessionData {
    pub(crate) status: Status,
    role: Role,
    pub(crate) request_line: Option<RequestLine>,
    pub(crate) status_line: Option<StatusLine>,
    pub(crate) inbound: HeaderMap,
    header_count: usize,
    pub(crate) outbound: HeaderMap,
    content: BytesMut,
    pub(crate) content_length: u64,
    pub(crate) outbound_queue: VecDeque<Bytes>,
    pub(crate) write_pending: bool,
    pub(crate) close_after_send: bool,
    free: bool,
    pub(crate) is_head: bool,
    requests: u64,
    replies: u64,
    errors: u64,
    negotiated: HeaderMap,
    config: FlowConfig,
}

impl SessionData {
    /// Creates a fresh session for the given role.
    pub fn new(role: Role, config: FlowConfig) -> SessionData {
        SessionData {
            status: Status::initial(role),
            role,
            request_line: None,
            status_line: None,
            inbound: HeaderMap::new(),
            header_count: 0,
            outbound: HeaderMap::new(),
            content: BytesMut::new(),
            content_length: 0,
            outbound_queue: VecDeque::new(),
            write_pending: false,
            close_after_send: false,
            free: false,
            is_head: false,
            requests: 0,
            replies: 0,
            errors: 0,
            negotiated: HeaderMap::new(),
            config,
        }
    }

    /// Resets everything but the lifetime counters, readying the session
    /// to be handed to a new `Flow` over a new transport. Counters are
    /// cumulative per `spec.md` §3's lifecycle note.
    pub fn reset_for_reuse(&mut self) {
        self.status = Status::initial(self.role);
        self.request_line = None;
        self.status_line = None;
        self.inbound = HeaderMap::new();
        self.header_count = 0;
        self.outbound = HeaderMap::new();
        self.content.clear();
        self.content_length = 0;
        self.outbound_queue.clear();
        self.write_pending = false;
        self.close_after_send = false;
        self.free = false;
        self.is_head = false;
        self.negotiated = HeaderMap::new();
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn is_head(&self) -> bool {
        self.is_head
    }

    pub fn is_free(&self) -> bool {
        self.free
    }

    pub(crate) fn mark_free(&mut self) {
        self.free = true;
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn replies(&self) -> u64 {
        self.replies
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub(crate) fn bump_errors(&mut self) {
        self.errors += 1;
    }

    pub fn inbound(&self) -> &HeaderMap {
        &self.inbound
    }

    pub fn outbound(&self) -> &HeaderMap {
        &self.outbound
    }

    pub fn outbound_mut(&mut self) -> &mut HeaderMap {
        &mut self.outbound
    }

    pub fn negotiated(&self) -> &HeaderMap {
        &self.negotiated
    }

    pub fn request_line(&self) -> Option<&RequestLine> {
        self.request_line.as_ref()
    }

    pub fn status_line(&self) -> Option<&StatusLine> {
        self.status_line.as_ref()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// `contentLength - content.size()`, per `spec.md` §4.1.
    pub fn remaining_bytes(&self) -> u64 {
        self.content_length - self.content.len() as u64
    }

    /// Appends body bytes, clamping to `remaining_bytes()`. Invariant:
    /// `content.size() <= content_length` holds both before and after.
    pub(crate) fn append_content(&mut self, chunk: &[u8]) {
        let take = (self.remaining_bytes() as usize).min(chunk.len());
        self.content.extend_from_slice(&chunk[..take]);
    }

    /// Drops any stray bytes left in the body buffer from a prior message,
    /// without touching `content_length` — called right after the header
    /// block completes, before `content_length` governs the upcoming read.
    pub(crate) fn reset_content_buffer(&mut self) {
        self.content.clear();
    }

    /// Clears both the body buffer and its declared length, once a
    /// message has been fully handed to the processor.
    pub(crate) fn clear_content(&mut self) {
        self.content.clear();
        self.content_length = 0;
    }

    /// `inbound` is reset to empty when moving from `Request`/`Status`
    /// into `Header`.
    pub(crate) fn reset_inbound_headers(&mut self) {
        self.inbound = HeaderMap::new();
        self.header_count = 0;
    }

    /// Records one more absorbed header line; returns false once
    /// `config.max_headers` has been exceeded.
    pub(crate) fn note_header_line(&mut self) -> bool {
        self.header_count += 1;
        self.header_count <= self.config.max_headers
    }

    /// Constructs a complete HTTP/1.1 response per `spec.md` §4.1 rules 1-5.
    pub fn generate_reply(
        &self,
        status: StatusCode,
        body: &[u8],
        extra_headers: &HeaderMap,
    ) -> Bytes {
        let mut buf = BytesMut::with_capacity(128 + body.len());
        buf.extend_from_slice(b"HTTP/1.1 ");
        buf.extend_from_slice(status.as_str().as_bytes());
        buf.extend_from_slice(b" ");
        buf.extend_from_slice(status.canonical_reason().unwrap_or("").as_bytes());
        buf.extend_from_slice(b"\r\n");

        let mut written: HashSet<HeaderName> = HashSet::new();

        if status.as_u16() >= 200 {
            write_header(&mut buf, "Content-Length", body.len().to_string().as_bytes());
            written.insert(http::header::CONTENT_LENGTH);
        }
        if status.as_u16() >= 400 {
            write_header(&mut buf, "Connection", b"close");
            written.insert(http::header::CONNECTION);
        }

        write_unclaimed_headers(&mut buf, extra_headers, &mut written);
        write_unclaimed_headers(&mut buf, &self.outbound, &mut written);

        buf.extend_from_slice(b"\r\n");

        let emit_body = status.as_u16() >= 200 && !self.is_head;
        if emit_body {
            buf.extend_from_slice(body);
        }

        buf.freeze()
    }

    /// Appends `generate_reply(...)` to the outbound queue. Latches
    /// `close_after_send` on any `status >= 400` and increments `replies`.
    pub fn reply(&mut self, status: StatusCode, body: &[u8], extra_headers: &HeaderMap) {
        let msg = self.generate_reply(status, body, extra_headers);
        self.outbound_queue.push_back(msg);
        if status.as_u16() >= 400 {
            self.close_after_send = true;
        }
        self.replies += 1;
    }

    /// Serializes and queues an outbound request (client role).
    pub fn request(&mut self, method: Method, uri: &Uri, extra_headers: &HeaderMap, body: &[u8]) {
        self.is_head = method == Method::HEAD;

        let mut buf = BytesMut::with_capacity(128 + body.len());
        buf.extend_from_slice(method.as_str().as_bytes());
        buf.extend_from_slice(b" ");
        buf.extend_from_slice(uri.to_string().as_bytes());
        buf.extend_from_slice(b" HTTP/1.1\r\n");

        let mut written: HashSet<HeaderName> = HashSet::new();
        write_unclaimed_headers(&mut buf, extra_headers, &mut written);
        if !written.contains(&http::header::USER_AGENT) {
            write_header(&mut buf, "User-Agent", self.config.default_user_agent.as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(body);

        self.outbound_queue.push_back(buf.freeze());
        self.requests += 1;
    }

    /// Intersects each inbound preference header against its supported
    /// values, recording the outcome into `negotiated` and appending to
    /// the outbound `Vary`. Returns false iff any negotiation produced an
    /// empty value.
    pub fn negotiate(&mut self, negotiations: &[Negotiation]) -> bool {
        self.negotiated = HeaderMap::new();
        let mut all_satisfied = true;

        for neg in negotiations {
            let client_pref = self
                .inbound
                .get(&neg.input_header)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            match choose(client_pref, &neg.supported) {
                Some(chosen) => {
                    if let Ok(value) = HeaderValue::from_str(&chosen) {
                        self.negotiated.insert(neg.input_header.clone(), value.clone());
                        if let Ok(vary_value) = HeaderValue::from_str(neg.input_header.as_str()) {
                            self.outbound.append(http::header::VARY, vary_value);
                        }
                        if let Some(ref out_name) = neg.output_header {
                            self.outbound.insert(out_name.clone(), value);
                        }
                    } else {
                        all_satisfied = false;
                    }
                }
                None => all_satisfied = false,
            }
        }

        all_satisfied
    }

    /// True iff `allowed_methods` contains a method other than `OPTIONS`
    /// or `TRACE` — used to disambiguate a `404` (nothing handles this
    /// resource) from a `405` (something does, just not this method).
    pub fn trigger_405(allowed_methods: &[Method]) -> bool {
        allowed_methods
            .iter()
            .any(|m| !IGNORED_METHODS.contains(&m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> SessionData {
        SessionData::new(role, FlowConfig::new())
    }

    #[test]
    fn generate_reply_omits_body_length_below_200() {
        let s = session(Role::Server);
        let msg = s.generate_reply(StatusCode::CONTINUE, b"", &HeaderMap::new());
        let text = String::from_utf8(msg.to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 100 Continue\r\n"));
        assert!(!text.contains("Content-Length"));
    }

    #[test]
    fn generate_reply_adds_content_length_and_closes_on_error() {
        let s = session(Role::Server);
        let msg = s.generate_reply(StatusCode::BAD_REQUEST, b"bad\n", &HeaderMap::new());
        let text = String::from_utf8(msg.to_vec()).unwrap();
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("bad\n"));
    }

    #[test]
    fn generate_reply_suppresses_body_for_head() {
        let mut s = session(Role::Server);
        s.is_head = true;
        let msg = s.generate_reply(StatusCode::OK, b"hello", &HeaderMap::new());
        let text = String::from_utf8(msg.to_vec()).unwrap();
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(!text.ends_with("hello"));
    }

    #[test]
    fn generate_reply_computed_headers_beat_extra_and_outbound() {
        let mut s = session(Role::Server);
        s.outbound
            .insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("999"));
        let mut extra = HeaderMap::new();
        extra.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("111"));
        let msg = s.generate_reply(StatusCode::OK, b"hi", &extra);
        let text = String::from_utf8(msg.to_vec()).unwrap();
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(!text.contains("999"));
        assert!(!text.contains("111"));
    }

    #[test]
    fn generate_reply_title_cases_wire_header_names() {
        let mut s = session(Role::Server);
        s.outbound
            .insert(http::header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let msg = s.generate_reply(StatusCode::OK, b"", &HeaderMap::new());
        let text = String::from_utf8(msg.to_vec()).unwrap();
        assert!(text.contains("Cache-Control: no-cache\r\n"));
    }

    #[test]
    fn remaining_bytes_and_append_content_clamp_to_declared_length() {
        let mut s = session(Role::Server);
        s.content_length = 4;
        assert_eq!(s.remaining_bytes(), 4);
        s.append_content(b"hello world");
        assert_eq!(s.content(), b"hell");
        assert_eq!(s.remaining_bytes(), 0);
    }

    #[test]
    fn trigger_405_ignores_options_and_trace() {
        assert!(!SessionData::trigger_405(&[Method::OPTIONS, Method::TRACE]));
        assert!(SessionData::trigger_405(&[Method::OPTIONS, Method::POST]));
        assert!(!SessionData::trigger_405(&[]));
    }

    #[test]
    fn negotiate_picks_first_supported_match_and_records_vary() {
        let mut s = session(Role::Server);
        s.inbound
            .insert(http::header::ACCEPT, HeaderValue::from_static("text/plain, application/json;q=0.9"));
        let ok = s.negotiate(&[Negotiation {
            input_header: http::header::ACCEPT,
            output_header: Some(http::header::CONTENT_TYPE),
            supported: vec!["application/json".to_owned(), "text/plain".to_owned()],
        }]);
        assert!(ok);
        assert_eq!(
            s.outbound().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(s.outbound().get(http::header::VARY).unwrap(), "accept");
    }

    #[test]
    fn negotiate_fails_when_nothing_overlaps() {
        let mut s = session(Role::Server);
        s.inbound
            .insert(http::header::ACCEPT, HeaderValue::from_static("application/xml"));
        let ok = s.negotiate(&[Negotiation {
            input_header: http::header::ACCEPT,
            output_header: None,
            supported: vec!["application/json".to_owned()],
        }]);
        assert!(!ok);
    }

    #[test]
    fn header_line_limit_is_enforced_and_reset_by_header_reset() {
        let mut s = session(Role::Server);
        s.config.max_headers = 2;
        assert!(s.note_header_line());
        assert!(s.note_header_line());
        assert!(!s.note_header_line());
        s.reset_inbound_headers();
        assert!(s.note_header_line());
    }
}

/// Picks the first value in `supported` that also appears (case
/// insensitively, ignoring `;q=` parameters) in the comma-separated
/// `client_pref` list. An empty or `*`-only preference accepts whatever
/// we support first.
fn choose(client_pref: &str, supported: &[String]) -> Option<String> {
    if supported.is_empty() {
        return None;
    }
    let trimmed = client_pref.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Some(supported[0].clone());
    }

    let wanted: Vec<&str> = trimmed
        .split(',')
        .map(|part| part.split(';').next().unwrap_or("").trim())
        .filter(|part| !part.is_empty())
        .collect();

    for want in &wanted {
        if *want == "*" {
            return Some(supported[0].clone());
        }
        for candidate in supported {
            if candidate.eq_ignore_ascii_case(want) {
                return Some(candidate.clone());
            }
        }
    }
    None
}

/// Writes header lines for every entry in `headers` whose name is not
/// already in `written`, then marks those names written.
fn write_unclaimed_headers(buf: &mut BytesMut, headers: &HeaderMap, written: &mut HashSet<HeaderName>) {
    for name in headers.keys() {
        if written.contains(name) {
            continue;
        }
        for value in headers.get_all(name) {
            write_header(buf, &title_case(name), value.as_bytes());
        }
        written.insert(name.clone());
    }
}

fn write_header(buf: &mut BytesMut, name: &str, value: &[u8]) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\n");
}

/// `http::HeaderName` only stores the lowercase form; title-case it back
/// for the wire the way hyper's `title_case_headers` option does.
fn title_case(name: &HeaderName) -> String {
    let mut out = String::with_capacity(name.as_str().len());
    let mut capitalize = true;
    for ch in name.as_str().chars() {
        if ch == '-' {
            out.push(ch);
            capitalize = true;
        } else if capitalize {
            out.extend(ch.to_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Reject any request line whose major version is unsupported, per
/// `spec.md` §6: `major >= 2` gets a `505` and the connection closes.
pub fn is_unsupported_version(version: HttpVersion) -> bool {
    !version.is_supported()
}
