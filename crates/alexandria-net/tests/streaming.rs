//! End-to-end tests of the streaming query transport against a local HTTP
//! server speaking the newline-delimited event protocol.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use alexandria_net::{ApiClient, NetError};
use alexandria_shared::protocol::AnswerEvent;
use alexandria_shared::types::OrganizationId;

/// One scripted HTTP response.  The body is close-delimited (no
/// content-length) so a stream only "completes" when the socket closes.
struct ServedResponse {
    status: u16,
    reason: &'static str,
    pieces: Vec<&'static str>,
    piece_delay: Duration,
    hold_open: Duration,
}

impl ServedResponse {
    fn ok(pieces: Vec<&'static str>) -> Self {
        Self {
            status: 200,
            reason: "OK",
            pieces,
            piece_delay: Duration::ZERO,
            hold_open: Duration::ZERO,
        }
    }
}

/// Accept one connection per scripted response, in order.
async fn spawn_server(responses: Vec<ServedResponse>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                read_request(&mut socket).await;

                let header = format!(
                    "HTTP/1.1 {} {}\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
                    response.status, response.reason
                );
                let _ = socket.write_all(header.as_bytes()).await;

                for piece in response.pieces {
                    let _ = socket.write_all(piece.as_bytes()).await;
                    let _ = socket.flush().await;
                    if response.piece_delay > Duration::ZERO {
                        tokio::time::sleep(response.piece_delay).await;
                    }
                }

                if response.hold_open > Duration::ZERO {
                    tokio::time::sleep(response.hold_open).await;
                }
            });
        }
    });

    format!("http://{addr}")
}

/// Read one HTTP request (headers plus a content-length body).
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];

    loop {
        let n = socket.read(&mut tmp).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&tmp[..n]);

        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]);
            let content_length = headers
                .lines()
                .find_map(|line| {
                    let line = line.to_ascii_lowercase();
                    line.strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);

            if buf.len() >= pos + 4 + content_length {
                return;
            }
        }
    }
}

fn delta(text: &str) -> AnswerEvent {
    AnswerEvent::TextDelta {
        text: text.into(),
        insufficient_info: false,
    }
}

async fn collect(stream: &mut alexandria_net::QueryStream) -> Vec<AnswerEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn streams_deltas_sources_and_completion() {
    let base = spawn_server(vec![ServedResponse::ok(vec![
        "data: {\"answer\": \"Searching the corpus...\", \"thinking\": true}\n",
        "data: {\"answer\": \"The spleen \"}\n",
        "data: {\"answer\": \"filters blood.\"}\ndata: {\"sources\": [\"http://a/smith2021.pdf\"]}\n",
        "data: {\"enhanced_sources\": [{\"url\": \"http://a/smith2021.pdf\", \"title\": \"Smith (2021)\", \"citation\": null}]}\n",
    ])])
    .await;

    let api = ApiClient::new(base, "token");
    let mut stream = api
        .streaming_query("what does the spleen do?", &OrganizationId::new())
        .await
        .unwrap();

    let events = collect(&mut stream).await;
    assert_eq!(events.len(), 6);
    assert_eq!(
        events[0],
        AnswerEvent::Thinking {
            text: "Searching the corpus...".into()
        }
    );
    assert_eq!(events[1], delta("The spleen "));
    assert_eq!(events[2], delta("filters blood."));
    assert!(matches!(&events[3], AnswerEvent::Sources(refs) if refs.len() == 1));
    assert!(
        matches!(&events[4], AnswerEvent::EnhancedSources(refs) if refs[0].title.as_deref() == Some("Smith (2021)"))
    );
    assert_eq!(events[5], AnswerEvent::Completed);
}

#[tokio::test]
async fn non_success_status_fails_fast() {
    let base = spawn_server(vec![ServedResponse {
        status: 422,
        reason: "Unprocessable Entity",
        pieces: vec!["{\"detail\": \"organization not found\"}"],
        piece_delay: Duration::ZERO,
        hold_open: Duration::ZERO,
    }])
    .await;

    let api = ApiClient::new(base, "token");
    let err = api
        .streaming_query("q", &OrganizationId::new())
        .await
        .unwrap_err();

    match err {
        NetError::Status { status, detail } => {
            assert_eq!(status, 422);
            assert_eq!(detail, "organization not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn protocol_error_ends_the_stream_without_completion() {
    let base = spawn_server(vec![ServedResponse::ok(vec![
        "data: {\"answer\": \"partial\"}\n",
        "data: {\"error\": \"index unavailable\"}\n",
        "data: {\"answer\": \"never delivered\"}\n",
    ])])
    .await;

    let api = ApiClient::new(base, "token");
    let mut stream = api
        .streaming_query("q", &OrganizationId::new())
        .await
        .unwrap();

    let events = collect(&mut stream).await;
    assert_eq!(
        events,
        vec![
            delta("partial"),
            AnswerEvent::Error("index unavailable".into()),
        ]
    );
}

#[tokio::test]
async fn aborting_a_stream_delivers_no_further_events() {
    let base = spawn_server(vec![ServedResponse {
        status: 200,
        reason: "OK",
        pieces: vec!["data: {\"answer\": \"first\"}\n"],
        piece_delay: Duration::ZERO,
        hold_open: Duration::from_secs(30),
    }])
    .await;

    let api = ApiClient::new(base, "token");
    let mut stream = api
        .streaming_query("q", &OrganizationId::new())
        .await
        .unwrap();

    assert_eq!(stream.next_event().await, Some(delta("first")));

    stream.abort();

    // The reader task is gone; the channel drains to nothing, with no
    // completion marker.
    assert_eq!(stream.next_event().await, None);
}

#[tokio::test]
async fn events_split_across_network_writes_arrive_in_order() {
    let base = spawn_server(vec![ServedResponse {
        status: 200,
        reason: "OK",
        pieces: vec![
            "data: {\"ans",
            "wer\": \"a\"}\ndata: {\"answer\"",
            ": \"b\"}\n",
        ],
        piece_delay: Duration::from_millis(10),
        hold_open: Duration::ZERO,
    }])
    .await;

    let api = ApiClient::new(base, "token");
    let mut stream = api
        .streaming_query("q", &OrganizationId::new())
        .await
        .unwrap();

    let events = collect(&mut stream).await;
    assert_eq!(events, vec![delta("a"), delta("b"), AnswerEvent::Completed]);
}
