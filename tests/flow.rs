//! End-to-end exercises of `Flow` over an in-memory duplex transport,
//! the same style of mock I/O hyper's own `tests/` directory drives its
//! connections with.

use h1flow::{Flow, FlowConfig, Processor, Role, SessionData, SingleHandleTransport, Status};
use http::{HeaderMap, Method, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A minimal server processor: replies `200 OK` with a fixed body to any
/// request whose headers it accepts, closing after one exchange.
struct Canned {
    body: &'static [u8],
}

impl Processor for Canned {
    fn after_headers(&mut self, _session: &mut SessionData) -> Status {
        Status::Content
    }

    fn handle(&mut self, session: &mut SessionData) {
        session.reply(StatusCode::OK, self.body, &HeaderMap::new());
    }

    fn after_processing(&mut self, _session: &mut SessionData) -> Status {
        Status::Shutdown
    }
}

/// Echoes the request body back as the response body.
struct EchoBody;

impl Processor for EchoBody {
    fn after_headers(&mut self, _session: &mut SessionData) -> Status {
        Status::Content
    }

    fn handle(&mut self, session: &mut SessionData) {
        let body = session.content().to_vec();
        session.reply(StatusCode::OK, &body, &HeaderMap::new());
    }

    fn after_processing(&mut self, _session: &mut SessionData) -> Status {
        Status::Shutdown
    }
}

/// Queues two replies from a single `handle()` call, to check FIFO drain.
struct TwoReplies;

impl Processor for TwoReplies {
    fn after_headers(&mut self, _session: &mut SessionData) -> Status {
        Status::Content
    }

    fn handle(&mut self, session: &mut SessionData) {
        session.reply(StatusCode::OK, b"first\n", &HeaderMap::new());
        session.reply(StatusCode::OK, b"second\n", &HeaderMap::new());
    }

    fn after_processing(&mut self, _session: &mut SessionData) -> Status {
        Status::Shutdown
    }
}

/// A processor that rejects every method but `GET`, exercising
/// `SessionData::trigger_405`.
struct GetOnly;

impl Processor for GetOnly {
    fn after_headers(&mut self, session: &mut SessionData) -> Status {
        let method = session.request_line().map(|rl| rl.method.clone()).unwrap_or(Method::GET);
        if method != Method::GET {
            if SessionData::trigger_405(&[Method::GET]) {
                let (status, body, headers) = h1flow::error_reply::method_not_allowed("GET");
                session.reply(status, &body, &headers);
            }
            return Status::Error;
        }
        Status::Content
    }

    fn handle(&mut self, session: &mut SessionData) {
        session.reply(StatusCode::OK, b"ok\n", &HeaderMap::new());
    }

    fn after_processing(&mut self, _session: &mut SessionData) -> Status {
        Status::Shutdown
    }
}

async fn exchange_with_config(
    request: &[u8],
    processor: impl Processor + 'static,
    config: FlowConfig,
) -> (SessionData, Vec<u8>) {
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    client.write_all(request).await.unwrap();

    let transport = SingleHandleTransport::new(server);
    let mut session = SessionData::new(Role::Server, config);
    let mut flow = Flow::new(transport, processor);
    flow.run(&mut session).await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    (session, response)
}

async fn exchange(request: &[u8], processor: impl Processor + 'static) -> (SessionData, Vec<u8>) {
    exchange_with_config(request, processor, FlowConfig::new()).await
}

#[tokio::test]
async fn minimal_get_without_a_body() {
    let (session, response) = exchange(
        b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n",
        Canned { body: b"hi\n" },
    )
    .await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
    assert!(text.contains("Content-Length: 3\r\n"));
    assert!(text.ends_with("hi\n"));
    assert!(session.is_free());
    assert_eq!(session.status(), Status::Shutdown);
}

#[tokio::test]
async fn head_request_gets_headers_but_no_body() {
    let (_session, response) = exchange(
        b"HEAD / HTTP/1.1\r\nHost: example.com\r\n\r\n",
        Canned { body: b"hidden body" },
    )
    .await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.contains("Content-Length: 11\r\n"));
    assert!(!text.contains("hidden body"));
}

#[tokio::test]
async fn unsupported_major_version_gets_505_then_closes() {
    let (_session, response) = exchange(
        b"GET / HTTP/2.0\r\nHost: example.com\r\n\r\n",
        Canned { body: b"unused" },
    )
    .await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 505 "), "{text}");
    assert!(text.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn malformed_request_line_gets_400() {
    let (_session, response) = exchange(b"not a request line\r\n\r\n", Canned { body: b"unused" }).await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 400 "), "{text}");
}

#[tokio::test]
async fn request_line_longer_than_configured_max_gets_400() {
    let mut request = b"GET /".to_vec();
    request.extend(std::iter::repeat(b'a').take(64));
    request.extend_from_slice(b" HTTP/1.1\r\n\r\n");

    let (_session, response) =
        exchange_with_config(&request, Canned { body: b"unused" }, FlowConfig::new().with_max_line_length(16)).await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 400 "), "{text}");
}

#[tokio::test]
async fn post_with_body_is_available_to_the_processor() {
    let request = b"POST /widgets HTTP/1.1\r\nHost: example.com\r\nContent-Length: 11\r\n\r\nhello world";
    let (_session, response) = exchange(request, EchoBody).await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.contains("Content-Length: 11\r\n"));
    assert!(text.ends_with("hello world"));
}

#[tokio::test]
async fn body_exactly_content_length_moves_straight_to_processing() {
    let request = b"POST /widgets HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
    let (_session, response) = exchange(request, EchoBody).await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.ends_with("\r\n\r\n"));
}

#[tokio::test]
async fn body_over_the_configured_cap_gets_413() {
    let request = b"POST /widgets HTTP/1.1\r\nContent-Length: 999999\r\n\r\n";
    let (_session, response) =
        exchange_with_config(request, EchoBody, FlowConfig::new().with_max_body_bytes(16)).await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 413 "), "{text}");
}

#[tokio::test]
async fn chunked_transfer_encoding_gets_501() {
    let request = b"POST /widgets HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
    let (_session, response) = exchange(request, EchoBody).await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 501 "), "{text}");
}

#[tokio::test]
async fn queued_replies_drain_in_fifo_order() {
    let request = b"GET / HTTP/1.1\r\n\r\n";
    let (_session, response) = exchange(request, TwoReplies).await;

    let text = String::from_utf8(response).unwrap();
    let first_at = text.find("first").expect("first reply present");
    let second_at = text.find("second").expect("second reply present");
    assert!(first_at < second_at, "replies arrived out of order: {text}");
}

#[tokio::test]
async fn disallowed_method_gets_405_with_allow_header() {
    let request = b"DELETE / HTTP/1.1\r\n\r\n";
    let (_session, response) = exchange(request, GetOnly).await;

    let text = String::from_utf8(response).unwrap();
    assert!(text.starts_with("HTTP/1.1 405 "), "{text}");
    assert!(text.contains("Allow: GET\r\n"));
}

#[tokio::test]
async fn idle_connection_closes_gracefully_on_eof() {
    let (client, server) = tokio::io::duplex(1024);
    drop(client); // immediate EOF, nothing ever sent

    let transport = SingleHandleTransport::new(server);
    let mut session = SessionData::new(Role::Server, FlowConfig::new());
    let mut flow = Flow::new(transport, Canned { body: b"unused" });
    flow.run(&mut session).await.unwrap();

    assert_eq!(session.status(), Status::Shutdown);
    assert_eq!(session.errors(), 0);
}

#[tokio::test]
async fn recycle_is_idempotent() {
    let (client, server) = tokio::io::duplex(1024);
    drop(client);

    let transport = SingleHandleTransport::new(server);
    let mut session = SessionData::new(Role::Server, FlowConfig::new());
    let mut flow = Flow::new(transport, Canned { body: b"unused" });
    flow.run(&mut session).await.unwrap();

    flow.recycle(&mut session).await.unwrap();
    flow.recycle(&mut session).await.unwrap();
    assert!(session.is_free());
}
