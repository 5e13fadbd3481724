use podsentry_daemon::collector::{MetricsSource, PrometheusClient};
use podsentry_daemon::error::QueryError;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve a single canned HTTP response and hand back the request head
async fn one_shot(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let mut read = 0;
        while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf[read..]).await.unwrap();
            if n == 0 {
                break;
            }
            read += n;
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        String::from_utf8_lossy(&buf[..read]).to_string()
    });
    (base, handle)
}

fn client(base: &str) -> PrometheusClient {
    PrometheusClient::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_query_sends_expression_and_parses_vector() {
    let body = r#"{"status":"success","data":{"resultType":"vector","result":[
        {"metric":{"pod":"api-0","namespace":"shop","container":"app"},"value":[1700000000.1,"1"]}
    ]}}"#;
    let (base, server) = one_shot("200 OK", body).await;

    let samples = client(&base)
        .query("pod_running_flag", r#"kube_pod_status_phase{phase="Running"}"#)
        .await;
    let request = server.await.unwrap();

    assert!(request.starts_with("GET /api/v1/query?query="), "{}", request);
    assert!(request.contains("kube_pod_status_phase"));
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].name, "api-0");
    assert_eq!(samples[0].namespace, "shop");
    assert_eq!(samples[0].value, 1.0);
}

#[tokio::test]
async fn test_http_error_status_returns_empty() {
    let (base, server) = one_shot("503 Service Unavailable", "overloaded").await;
    let prometheus = client(&base);

    let err = prometheus.fetch("up").await.unwrap_err();
    server.await.unwrap();
    assert!(matches!(err, QueryError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_malformed_json_returns_empty() {
    let (base, server) = one_shot("200 OK", "{\"status\": \"succ").await;
    let samples = client(&base).query("restart_rate", "up").await;
    server.await.unwrap();
    assert!(samples.is_empty());
}

#[tokio::test]
async fn test_backend_error_status_returns_empty() {
    let body = r#"{"status":"error","errorType":"bad_data","error":"invalid parameter"}"#;
    let (base, server) = one_shot("200 OK", body).await;
    let samples = client(&base).query("restart_rate", "up{").await;
    server.await.unwrap();
    assert!(samples.is_empty());
}

#[tokio::test]
async fn test_unreachable_backend_returns_empty() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let prometheus = client(&base);
    assert!(prometheus.query("liveness", "up").await.is_empty());
    assert!(matches!(prometheus.fetch("up").await, Err(QueryError::Http(_))));
}

#[tokio::test]
async fn test_silent_backend_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            held.push(stream);
        }
    });

    let prometheus = PrometheusClient::new(&base, Duration::from_millis(200)).unwrap();
    let started = Instant::now();
    assert!(prometheus.query("restart_rate", "up").await.is_empty());
    assert!(matches!(prometheus.fetch("up").await, Err(QueryError::Http(_))));
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    server.abort();
}
