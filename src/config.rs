//! Tunables left implementation-defined by the flow's contract.

/// The default maximum length, in bytes, of a request or status line.
///
/// Mirrors the order of magnitude of `hyper`'s own read-buffer ceiling;
/// a line longer than this is rejected with `400` rather than grown
/// without bound.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

/// The default maximum number of header lines accepted per message.
pub const DEFAULT_MAX_HEADERS: usize = 100;

/// The default cap on a declared `Content-Length`.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;

/// The default `User-Agent` sent by `SessionData::request` when the caller
/// doesn't supply one.
pub const DEFAULT_USER_AGENT: &str = concat!("h1flow/", env!("CARGO_PKG_VERSION"));

/// Per-session tunables.
///
/// Constructed with sane defaults via [`FlowConfig::new`]; adjust with the
/// builder-style `with_*` methods.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub(crate) max_line_length: usize,
    pub(crate) max_headers: usize,
    pub(crate) max_body_bytes: u64,
    pub(crate) default_user_agent: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig::new()
    }
}

impl FlowConfig {
    /// Creates a config with the crate's defaults.
    pub fn new() -> FlowConfig {
        FlowConfig {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_headers: DEFAULT_MAX_HEADERS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            default_user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Sets the maximum accepted length of a request/status line.
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Sets the maximum accepted number of header lines.
    pub fn with_max_headers(mut self, max: usize) -> Self {
        self.max_headers = max;
        self
    }

    /// Sets the maximum accepted declared body size, in bytes.
    pub fn with_max_body_bytes(mut self, max: u64) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Sets the default `User-Agent` used by outbound requests.
    pub fn with_default_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.default_user_agent = user_agent.into();
        self
    }
}
