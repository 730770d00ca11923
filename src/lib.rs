//! The per-connection HTTP/1.x flow core: session state, the async I/O
//! driver that advances it, and the `Processor` contract a server or
//! client plugs in to answer requests or consume responses.
//!
//! This crate owns parsing, half-duplex write sequencing, and teardown;
//! it does not open sockets, run an executor, or know about keep-alive
//! pooling across connections — see `SPEC_FULL.md` for the boundary.
//!
//! ```no_run
//! use h1flow::{Flow, FlowConfig, Processor, Role, SessionData, SingleHandleTransport, Status};
//!
//! struct Echo;
//!
//! impl Processor for Echo {
//!     fn after_headers(&mut self, _session: &mut SessionData) -> Status {
//!         Status::Processing
//!     }
//!
//!     fn handle(&mut self, session: &mut SessionData) {
//!         session.reply(http::StatusCode::OK, b"hello\n", &http::HeaderMap::new());
//!     }
//!
//!     fn after_processing(&mut self, _session: &mut SessionData) -> Status {
//!         Status::Shutdown
//!     }
//! }
//!
//! # async fn run<T>(stream: T) -> h1flow::Result<()>
//! # where T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {
//! let transport = SingleHandleTransport::new(stream);
//! let mut session = SessionData::new(Role::Server, FlowConfig::new());
//! let mut flow = Flow::new(transport, Echo);
//! flow.run(&mut session).await
//! # }
//! ```

mod config;
mod error;
mod flow;
mod parse;
mod processor;
mod session;
mod status;
mod transport;

pub mod error_reply;

pub use config::{FlowConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADERS, DEFAULT_MAX_LINE_LENGTH, DEFAULT_USER_AGENT};
pub use error::{Error, Result};
pub use flow::Flow;
pub use parse::{HeaderLine, HttpVersion, RequestLine, StatusLine};
pub use processor::Processor;
pub use session::{Negotiation, SessionData};
pub use status::{Role, Status};
pub use transport::{SingleHandleTransport, SplitHandleTransport, Transport};
