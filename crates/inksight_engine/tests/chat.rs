use std::sync::{Arc, Mutex};
use std::time::Duration;

use inksight_engine::{
    ChatFrame, ChatRequest, ChatSettings, ChatTransport, EngineEvent, EventSink, FailureKind,
    HistoryEntry, HistoryRole, ReqwestChatTransport, SourceImage,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn frames(&self) -> Vec<ChatFrame> {
        self.events
            .lock()
            .unwrap()
            .drain(..)
            .filter_map(|event| match event {
                EngineEvent::Chat { frame, .. } => Some(frame),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn request(query: &str) -> ChatRequest {
    ChatRequest {
        query: query.to_string(),
        history: Vec::new(),
        model: None,
    }
}

fn transport_for(server: &MockServer) -> ReqwestChatTransport {
    ReqwestChatTransport::new(ChatSettings {
        endpoint: format!("{}/api/chat", server.uri()),
        ..ChatSettings::default()
    })
}

async fn serve_stream(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn streams_frames_in_arrival_order() {
    inksight_logging::initialize_for_tests();
    let body = concat!(
        "data: {\"type\":\"source_images\",\"images\":[{\"page_number\":\"2\",\"image_path\":\"/api/images/p2.jpg\",\"score\":0.91}]}\n\n",
        "data: {\"type\":\"response\",\"content\":\"Hel\"}\n\n",
        "data: {\"type\":\"response\",\"content\":\"lo\"}\n\n",
    );
    let server = serve_stream(body).await;
    let sink = TestSink::new();

    let summary = transport_for(&server)
        .stream_reply(1, &request("hi"), &sink, &CancellationToken::new())
        .await
        .expect("stream ok");

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.bytes, body.len() as u64);
    assert_eq!(
        sink.frames(),
        vec![
            ChatFrame::SourceImages(vec![SourceImage {
                page_number: "2".to_string(),
                image_path: "/api/images/p2.jpg".to_string(),
                score: 0.91,
            }]),
            ChatFrame::Response("Hel".to_string()),
            ChatFrame::Response("lo".to_string()),
        ]
    );
}

#[tokio::test]
async fn malformed_and_unknown_frames_are_skipped() {
    inksight_logging::initialize_for_tests();
    let body = concat!(
        "data: An error occurred while processing your request\n\n",
        "data: {\"type\":\"progress\",\"value\":3}\n\n",
        ": keep-alive\n",
        "data: {\"type\":\"response\",\"content\":\"ok\"}",
    );
    let server = serve_stream(body).await;
    let sink = TestSink::new();

    let summary = transport_for(&server)
        .stream_reply(1, &request("hi"), &sink, &CancellationToken::new())
        .await
        .expect("stream ok");

    assert_eq!(summary.frames, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(sink.frames(), vec![ChatFrame::Response("ok".to_string())]);
}

#[tokio::test]
async fn posts_query_history_and_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "query": "and then?",
            "history": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "answer"}
            ],
            "model": "gemini"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let chat_request = ChatRequest {
        query: "and then?".to_string(),
        history: vec![
            HistoryEntry {
                role: HistoryRole::User,
                content: "first".to_string(),
            },
            HistoryEntry {
                role: HistoryRole::Assistant,
                content: "answer".to_string(),
            },
        ],
        model: Some("gemini".to_string()),
    };
    let sink = TestSink::new();

    let summary = transport_for(&server)
        .stream_reply(4, &chat_request, &sink, &CancellationToken::new())
        .await
        .expect("stream ok");
    assert_eq!(summary.frames, 0);
}

#[tokio::test]
async fn error_status_fails_the_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let sink = TestSink::new();

    let err = transport_for(&server)
        .stream_reply(1, &request("hi"), &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(500));
    assert!(sink.frames().is_empty());
}

#[tokio::test]
async fn no_content_is_a_missing_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let err = transport_for(&server)
        .stream_reply(1, &request("hi"), &TestSink::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::MissingBody);
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_raw("data: {\"type\":\"response\",\"content\":\"late\"}\n", "text/event-stream"),
        )
        .mount(&server)
        .await;
    let transport = ReqwestChatTransport::new(ChatSettings {
        endpoint: format!("{}/api/chat", server.uri()),
        request_timeout: Some(Duration::from_millis(50)),
        ..ChatSettings::default()
    });

    let err = transport
        .stream_reply(1, &request("hi"), &TestSink::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn cancelled_token_stops_the_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_raw("", "text/event-stream"),
        )
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = transport_for(&server)
        .stream_reply(1, &request("hi"), &TestSink::new(), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Cancelled);
}

#[tokio::test]
async fn unparseable_endpoint_is_rejected() {
    let transport = ReqwestChatTransport::new(ChatSettings {
        endpoint: "not a url".to_string(),
        ..ChatSettings::default()
    });

    let err = transport
        .stream_reply(1, &request("hi"), &TestSink::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

/// Reads one request, headers and body, so the socket closes cleanly later.
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            return;
        }
    }
}

/// Announces a longer body than it sends, then hangs up.
async fn serve_truncated(sent: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: {}\r\n\r\n",
            sent.len() + 4096
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(sent.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    });
    format!("http://{addr}/api/chat")
}

#[tokio::test]
async fn body_cut_short_fails_after_delivering_frames() {
    inksight_logging::initialize_for_tests();
    let endpoint = serve_truncated(concat!(
        "data: {\"type\":\"response\",\"content\":\"Hel\"}\n\n",
        "data: {\"type\":\"response\",\"content\":\"lo\"}\n\n",
    ))
    .await;
    let transport = ReqwestChatTransport::new(ChatSettings {
        endpoint,
        ..ChatSettings::default()
    });
    let sink = TestSink::new();

    let err = transport
        .stream_reply(1, &request("hi"), &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Network);
    assert_eq!(
        sink.frames(),
        vec![
            ChatFrame::Response("Hel".to_string()),
            ChatFrame::Response("lo".to_string()),
        ]
    );
}

#[tokio::test]
async fn lines_over_the_limit_are_skipped() {
    let body = format!(
        "data: {{\"type\":\"response\",\"content\":\"{}\"}}\n\ndata: {{\"type\":\"response\",\"content\":\"short\"}}\n\n",
        "w".repeat(512)
    );
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;
    let transport = ReqwestChatTransport::new(ChatSettings {
        endpoint: format!("{}/api/chat", server.uri()),
        max_line_bytes: 128,
        ..ChatSettings::default()
    });
    let sink = TestSink::new();

    let summary = transport
        .stream_reply(1, &request("hi"), &sink, &CancellationToken::new())
        .await
        .expect("stream ok");

    assert_eq!(summary.frames, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(sink.frames(), vec![ChatFrame::Response("short".to_string())]);
}
