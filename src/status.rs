//! Connection-progress states.

/// The role a session plays on its connection, which first-line it expects
/// to read and which first-line it serializes when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// We read requests and write responses.
    Server,
    /// We write requests and read responses.
    Client,
}

/// The phase of the parse/process/reply cycle a session is in.
///
/// See the module-level flow documentation for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Awaiting the first line of an inbound request (server role).
    Request,
    /// Awaiting the first line of an inbound status reply (client role).
    Status,
    /// Awaiting additional header lines or the terminating blank line.
    Header,
    /// Awaiting body bytes up to `content_length`.
    Content,
    /// The processor is handling the completed message.
    Processing,
    /// A parse or protocol error occurred.
    Error,
    /// The connection has been recycled; all resources are released.
    Shutdown,
}

impl Status {
    /// The state a fresh session starts `start()` from, given its role.
    pub fn initial(role: Role) -> Status {
        match role {
            Role::Server => Status::Request,
            Role::Client => Status::Status,
        }
    }

    pub(crate) fn is_first_line(self) -> bool {
        matches!(self, Status::Request | Status::Status)
    }
}
