//! The pluggable collaborator a [`crate::Flow`] drives at each transition.
//!
//! `Flow` holds a `&mut dyn Processor` (or a generic `P: Processor`) for
//! its lifetime; the processor never reaches back into `Flow` itself —
//! it only mutates the `SessionData` it's handed, per `spec.md` §9's
//! note on modeling the Flow/Processor relationship as message passing
//! rather than a cyclic reference.

use crate::session::SessionData;
use crate::status::Status;

/// Server-routing or client-request behavior plugged into a [`crate::Flow`].
///
/// Implementations are given `&mut SessionData` at each hook and may read
/// or mutate it (including calling `reply`/`request` to queue outbound
/// messages); they must never retain a reference to it across hooks.
pub trait Processor: Send {
    /// Called once when the connection starts; may seed `outbound`
    /// headers (e.g. a fixed `Server:` header).
    fn start(&mut self, session: &mut SessionData) {
        let _ = session;
    }

    /// Called when inbound headers are fully parsed. Returns the next
    /// status: typically `Content` (a body is expected), `Processing`
    /// (no body), or `Error` (the processor has queued its own
    /// rejection reply and `Flow` should recycle after it drains).
    fn after_headers(&mut self, session: &mut SessionData) -> Status;

    /// Called once a complete inbound message is available. Must queue
    /// at least one reply via `session.reply(...)` (server role) or
    /// otherwise consume the response (client role).
    fn handle(&mut self, session: &mut SessionData);

    /// Called after `handle` and after each successful write. Returns
    /// `Request`/`Status` to keep the connection open for another
    /// message, or `Shutdown` to close it.
    fn after_processing(&mut self, session: &mut SessionData) -> Status;

    /// Called from `Flow::recycle`; release any per-session resources.
    fn recycle(&mut self, session: &mut SessionData) {
        let _ = session;
    }
}
