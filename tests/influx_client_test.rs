use guild_metrics::app::ports::MetricsBackendPort;
use guild_metrics::domain::MetricPoint;
use guild_metrics::error::RelayError;
use guild_metrics::infra::InfluxHttpClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct RecordedRequest {
    head: String,
    body: String,
}

/// Answer each incoming connection with the next canned `(status, body)`.
async fn spawn_stub(responses: Vec<(u16, &'static str)>) -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            sink.lock().await.push(request);

            let response = format!(
                "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
    });

    (addr, recorded)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    RecordedRequest {
        head,
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    }
}

fn client(addr: SocketAddr) -> InfluxHttpClient {
    InfluxHttpClient::with_base_url(format!("http://{}", addr), "root", "secret").unwrap()
}

#[tokio::test]
async fn test_list_databases_parses_series() {
    let (addr, recorded) = spawn_stub(vec![(
        200,
        r#"{"results":[{"statement_id":0,"series":[{"name":"databases","columns":["name"],"values":[["_internal"],["bot"]]}]}]}"#,
    )])
    .await;

    let names = client(addr).list_databases().await.unwrap();
    assert_eq!(names, vec!["_internal".to_string(), "bot".to_string()]);

    let requests = recorded.lock().await;
    assert!(requests[0].head.starts_with("GET /query?"));
    assert!(requests[0].head.contains("q=SHOW+DATABASES"));
    assert!(requests[0].head.contains("u=root"));
}

#[tokio::test]
async fn test_create_database_posts_quoted_statement() {
    let (addr, recorded) = spawn_stub(vec![(200, r#"{"results":[{"statement_id":0}]}"#)]).await;

    client(addr).create_database("bot").await.unwrap();

    let requests = recorded.lock().await;
    assert!(requests[0].head.starts_with("POST /query?"));
    assert_eq!(requests[0].body, "q=CREATE+DATABASE+%22bot%22");
}

#[tokio::test]
async fn test_write_points_sends_line_protocol() {
    let (addr, recorded) = spawn_stub(vec![(204, "")]).await;
    let point = MetricPoint::new("members")
        .tag("guild_id", "G")
        .field("member_count", 42i64);

    client(addr).write_points(&[point], "bot").await.unwrap();

    let requests = recorded.lock().await;
    assert!(requests[0].head.starts_with("POST /write?"));
    assert!(requests[0].head.contains("db=bot"));
    assert!(requests[0].head.contains("precision=ms"));
    assert_eq!(requests[0].body, "members,guild_id=G member_count=42i");
}

#[tokio::test]
async fn test_write_rejection_surfaces_status_and_body() {
    let (addr, _) = spawn_stub(vec![(400, r#"{"error":"field type conflict"}"#)]).await;
    let point = MetricPoint::new("events").field("count", 1i64);

    let err = client(addr).write_points(&[point], "bot").await.unwrap_err();
    match err {
        RelayError::Backend { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("field type conflict"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_statement_error_is_a_backend_error() {
    let (addr, _) = spawn_stub(vec![(
        200,
        r#"{"results":[{"statement_id":0,"error":"authorization failed"}]}"#,
    )])
    .await;

    assert!(matches!(
        client(addr).list_databases().await,
        Err(RelayError::Backend { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_an_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(matches!(
        client(addr).list_databases().await,
        Err(RelayError::Http(_))
    ));
}
