//! The per-session I/O state machine: drives one full message exchange
//! at a time over a [`Transport`], dispatching to a [`Processor`].
//!
//! `spec.md` §4.2 describes this in a callback-continuation style
//! (`async_read_until(..., handleRead)`), the idiom of an
//! event-loop-and-completion-handler library. The idiomatic async/await
//! realization collapses each `issue-read` + `completion-handler` pair
//! into one `async fn` that awaits the read and runs the handler body as
//! ordinary post-await code — see `SPEC_FULL.md` §4.2 for the mapping
//! from the source's named operations to this module's methods.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::error_reply;
use crate::parse::{self, HeaderLine};
use crate::processor::Processor;
use crate::session::SessionData;
use crate::status::Status;
use crate::transport::Transport;

/// Drives one [`SessionData`] through repeated request/reply cycles over
/// one [`Transport`], invoking a [`Processor`] at the transition points
/// named in `spec.md` §4.3.
pub struct Flow<T, P> {
    transport: T,
    processor: P,
}

enum ReadOutcome {
    Line(bytes::Bytes),
    Body(bytes::Bytes),
    Eof,
    ReadError(Error),
}

impl<T, P> Flow<T, P>
where
    T: Transport,
    P: Processor,
{
    /// Builds a flow over `transport`, driving `processor`'s hooks.
    pub fn new(transport: T, processor: P) -> Flow<T, P> {
        Flow { transport, processor }
    }

    /// Consumes the flow, returning its transport and processor.
    pub fn into_parts(self) -> (T, P) {
        (self.transport, self.processor)
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }

    /// Runs `session` to completion: one or more request/reply cycles,
    /// ending when `session.status()` reaches `Shutdown`.
    pub async fn run(&mut self, session: &mut SessionData) -> Result<()> {
        self.start(session).await?;
        while session.status != Status::Shutdown {
            self.drive_once(session).await?;
        }
        Ok(())
    }

    /// `spec.md` §4.2 `start()`: calls `Processor.start`, then
    /// `handleStart()`.
    pub async fn start(&mut self, session: &mut SessionData) -> Result<()> {
        self.processor.start(session);
        self.handle_start(session).await
    }

    /// `spec.md` §4.2 `handleStart()`. `send()` drains anything already
    /// queued (e.g. the reply `handle()` just produced) and recycles
    /// once the queue is empty and `status` is `Shutdown` — see
    /// `send()`'s doc comment for why the recycle is folded in there
    /// rather than ordered ahead of it here.
    async fn handle_start(&mut self, session: &mut SessionData) -> Result<()> {
        self.send(session).await
    }

    /// One `readLine()`/`readRemainingContent()` + `handleRead()` cycle,
    /// chosen by the session's current status. Public so tests can drive
    /// (and assert on) a single message exchange at a time.
    pub async fn drive_once(&mut self, session: &mut SessionData) -> Result<()> {
        let was_request = session.status == Status::Request;
        let was_header = session.status == Status::Header;
        let was_start = session.status.is_first_line();

        let outcome = match session.status {
            Status::Request | Status::Status | Status::Header => {
                match self.transport.read_line(session.config().max_line_length).await {
                    Ok(Some(line)) => ReadOutcome::Line(line),
                    Ok(None) => ReadOutcome::Eof,
                    Err(e) => ReadOutcome::ReadError(e),
                }
            }
            Status::Content => {
                let remaining = session.remaining_bytes().max(1) as usize;
                match self.transport.read_body(remaining).await {
                    Ok(chunk) if !chunk.is_empty() => ReadOutcome::Body(chunk),
                    Ok(_) => ReadOutcome::Eof,
                    Err(e) => ReadOutcome::ReadError(e),
                }
            }
            Status::Processing | Status::Error | Status::Shutdown => {
                debug_assert!(
                    false,
                    "drive_once called while status is {:?}; run() never does this",
                    session.status
                );
                return Ok(());
            }
        };

        let mut parsed_version = None;
        let mut is_parse_failure = false;

        // step 2: any read failure becomes `Error`. A failure that reflects
        // something the peer sent wrong (an over-long or unparsable line)
        // is eligible for the canned reply in step 7; a genuine transport
        // error is not — the connection is just dropped.
        match outcome {
            ReadOutcome::ReadError(ref e) => {
                if e.is_parse() {
                    debug!("parse error ({e}) reading in status {:?}", session.status);
                    is_parse_failure = true;
                } else {
                    debug!("transport error ({e}) reading in status {:?}", session.status);
                }
                session.status = Status::Error;
                session.bump_errors();
            }
            ReadOutcome::Eof => {
                if was_start {
                    // Nothing of a new message has arrived: a graceful close.
                    debug!("read eof on idle connection");
                    session.status = Status::Shutdown;
                    return self.recycle(session).await;
                }
                debug!("read eof mid-message");
                session.status = Status::Error;
                session.bump_errors();
            }
            ReadOutcome::Line(ref line) => {
                // step 4
                match session.status {
                    Status::Request => match parse::parse_request_line(line) {
                        Ok(parsed) => {
                            parsed_version = Some(parsed.version);
                            session.request_line = Some(parsed);
                            session.status = Status::Header;
                        }
                        Err(e) => {
                            debug!("parse error ({e}) reading request line");
                            session.status = Status::Error;
                            is_parse_failure = true;
                        }
                    },
                    Status::Status => match parse::parse_status_line(line) {
                        Ok(parsed) => {
                            parsed_version = Some(parsed.version);
                            session.status_line = Some(parsed);
                            session.status = Status::Header;
                        }
                        Err(e) => {
                            debug!("parse error ({e}) reading status line");
                            session.status = Status::Error;
                            is_parse_failure = true;
                        }
                    },
                    Status::Header => match parse::absorb_header_line(line) {
                        Ok(HeaderLine::Field(name, value)) => {
                            if session.note_header_line() {
                                session.inbound.append(name, value);
                            } else {
                                debug!("header count exceeds configured max, rejecting");
                                session.status = Status::Error;
                                is_parse_failure = true;
                            }
                        }
                        Ok(HeaderLine::Blank) => {
                            session.reset_content_buffer();
                            self.finish_headers(session);
                            if session.status == Status::Error {
                                self.send(session).await?;
                            }
                        }
                        Err(e) => {
                            debug!("parse error ({e}) reading header line");
                            session.status = Status::Error;
                            is_parse_failure = true;
                        }
                    },
                    _ => unreachable!(),
                }
            }
            ReadOutcome::Body(chunk) => {
                session.append_content(&chunk);
            }
        }

        // step 5: reject major versions >= 2, right after a first line parses.
        if was_start && session.status != Status::Error {
            if let Some(version) = parsed_version {
                if crate::session::is_unsupported_version(version) {
                    let err = Error::new_version();
                    debug_assert!(err.is_version_error());
                    warn!("{err} (peer sent {version})");
                    session.status = Status::Error;
                    is_parse_failure = true;
                }
            }
        }

        // step 6: the header map starts fresh once the first line is in.
        if was_start && session.status == Status::Header {
            session.reset_inbound_headers();
        }

        // step 7 (broadened to cover header parse/limit failures too, per
        // `SPEC_FULL.md` §7's "parse error — malformed first line or
        // headers" rule): a bad first line or a bad header gets a canned
        // reply before closing. A bad header *line* (was_header, found in
        // the nested match above) and a bad first line both land here
        // rather than queuing their own reply, so there is exactly one
        // place that decides between `400` and `505`.
        if (was_request || was_header) && session.status == Status::Error && is_parse_failure {
            let (status, body, headers) = if parsed_version.is_some() {
                error_reply::version_not_supported()
            } else {
                error_reply::bad_request()
            };
            session.reply(status, &body, &headers);
            session.status = Status::Processing;
            self.send(session).await?;
        }

        // step 9 (extended to cover a zero-body message resolved directly
        // from `after_headers`, per `Processor::after_headers`'s contract
        // that it may return `Processing` when no body is expected).
        let ready_to_process = match session.status {
            Status::Processing => true,
            Status::Content if session.remaining_bytes() == 0 => true,
            _ => false,
        };
        if ready_to_process {
            session.status = Status::Processing;
            self.processor.handle(session);
            session.clear_content();
            self.handle_start(session).await?;
        }

        // step 10: any error left standing after the above is terminal.
        if session.status == Status::Error {
            self.recycle(session).await?;
        }

        Ok(())
    }

    /// The blank-line branch of `spec.md` §4.2 step 4's `Header` case:
    /// determines the body length, rejects what `SPEC_FULL.md` §7
    /// resolves as 413/501, or hands off to `Processor::after_headers`.
    fn finish_headers(&mut self, session: &mut SessionData) {
        match parse::content_length(session.inbound()) {
            Ok(len) if len > session.config().max_body_bytes => {
                let err = Error::new_body_too_large();
                debug_assert!(err.is_body_too_large());
                warn!("{err} ({len} > {})", session.config().max_body_bytes);
                let (status, body, headers) = error_reply::payload_too_large();
                session.status = Status::Error;
                session.reply(status, &body, &headers);
            }
            Ok(len) => {
                session.content_length = len;
                if let Some(request_line) = session.request_line() {
                    session.is_head = request_line.method == http::Method::HEAD;
                }
                let next = self.processor.after_headers(session);
                session.status = next;
            }
            Err(e) if matches!(e.kind(), crate::error::Kind::UnsupportedTransferEncoding) => {
                debug!("{e}, rejecting with 501");
                let (status, body, headers) = error_reply::not_implemented();
                session.status = Status::Error;
                session.reply(status, &body, &headers);
            }
            Err(e) => {
                debug!("{e}, rejecting with 400");
                let (status, body, headers) = error_reply::bad_request();
                session.status = Status::Error;
                session.reply(status, &body, &headers);
            }
        }
    }

    /// `spec.md` §4.2 `send()`/`handleWrite()`: drains the outbound queue
    /// one message at a time, FIFO, with at most one write in flight
    /// (`write_pending`).
    ///
    /// Once the queue is empty, if `status` is still `Processing` this
    /// runs `Processor::after_processing` and adopts its return as the
    /// next status — `spec.md` §4.2 step 2 ("if `status == Processing`:
    /// `status <- Processor.afterProcessing`") and §4.3 ("called after
    /// `handle` *and after each successful write*"). `drive_once`'s step 9
    /// leaves `status` at `Processing` across the call into here
    /// specifically so this is the single place that transition happens,
    /// rather than firing once right after `handle()` and again here.
    ///
    /// Then recycles, if either `close_after_send` was latched (an error
    /// reply closing the connection after it drains) or `status` has
    /// reached `Shutdown` (by the above, or because the processor decided
    /// not to keep the connection alive). Folding both triggers in here,
    /// after the drain rather than before it, is what keeps a reply
    /// queued in the same call that decides to close from being wiped by
    /// a premature recycle — see `handle_start`.
    pub async fn send(&mut self, session: &mut SessionData) -> Result<()> {
        while let Some(msg) = session.outbound_queue.pop_front() {
            session.write_pending = true;
            let result = self.transport.write_all(&msg).await;
            session.write_pending = false;
            if let Err(err) = result {
                debug_assert!(err.is_io());
                warn!("write error ({err}), closing connection");
                session.bump_errors();
                self.recycle(session).await?;
                return Err(err);
            }
        }

        if session.status == Status::Processing {
            session.status = self.processor.after_processing(session);
        }

        if session.close_after_send || session.status == Status::Shutdown {
            self.recycle(session).await?;
        }

        Ok(())
    }

    /// `spec.md` §4.2 `recycle()`: idempotent via `free`. Tears down the
    /// processor's per-session resources, clears the outbound queue,
    /// shuts the transport down, and marks the session reusable.
    ///
    /// Unlike the source's `recycle()`, this does not separately `close()`
    /// the handle or drain `input` to its end first — `shutdown()` is the
    /// one teardown primitive [`Transport`] exposes, and a transport over
    /// one aliased handle ([`crate::SingleHandleTransport`]) vs. two
    /// distinct ones ([`crate::SplitHandleTransport`]) already resolves
    /// the source's double-close concern at the type level rather than at
    /// a runtime handle check, so there is no second handle left to close.
    /// Consuming whatever is left of `input` before closing would need its
    /// own bound (an unbounded read-to-drain against a slow or hostile
    /// peer never returns), which is out of scope here; the transport is
    /// simply shut down with whatever is unread still unread.
    pub async fn recycle(&mut self, session: &mut SessionData) -> Result<()> {
        if session.is_free() && session.status == Status::Shutdown {
            return Ok(());
        }

        self.processor.recycle(session);
        session.status = Status::Shutdown;
        session.close_after_send = false;
        session.outbound_queue.clear();

        if self.transport.supports_shutdown() {
            if let Err(err) = self.transport.shutdown().await {
                debug!("{err} during recycle, ignoring");
                session.bump_errors();
            }
        }

        session.mark_free();
        Ok(())
    }
}
