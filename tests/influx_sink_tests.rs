// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// InfluxDB sink tests against a minimal HTTP stub

use parameter_listener::config::{InfluxConfig, TimestampSource};
use parameter_listener::{
    ChannelSubscription, EventSink, InfluxSink, Listener, ListenerError, Message, ParameterEvent,
    ParameterFilter, SinkError,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Requests = Arc<Mutex<Vec<String>>>;

/// Answer one request per entry of `statuses`, capturing each raw request
async fn spawn_stub(statuses: Vec<u16>) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Requests::default();
    let seen = requests.clone();

    tokio::spawn(async move {
        for status in statuses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            seen.lock().unwrap().push(request);

            let response = format!(
                "HTTP/1.1 {} Stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), requests)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body_len = head
                .lines()
                .filter_map(|line| line.strip_prefix("content-length:"))
                .find_map(|len| len.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

fn influx_config(url: &str) -> InfluxConfig {
    InfluxConfig {
        url: url.to_string(),
        token: "s3cret".to_string(),
        org: "lab".to_string(),
        bucket: "fridge".to_string(),
        measurement: "my_measurement".to_string(),
        timeout_seconds: 5,
        timestamp_source: TimestampSource::Record,
    }
}

fn event(name: &str, value: f64) -> ParameterEvent {
    ParameterEvent::new(name, value, "V", chrono::Utc::now()).unwrap()
}

#[tokio::test]
async fn test_write_request_shape() {
    let (url, requests) = spawn_stub(vec![204]).await;
    let mut sink = InfluxSink::new(influx_config(&url)).unwrap();

    sink.record(event("gate1", 0.5)).await.unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.starts_with("POST /api/v2/write?org=lab&bucket=fridge&precision=ns HTTP/1.1"));
    assert!(request.to_lowercase().contains("authorization: token s3cret"));
    assert!(request.contains("my_measurement,name=gate1 value=0.5 "));
}

#[tokio::test]
async fn test_each_event_is_written_independently() {
    let (url, requests) = spawn_stub(vec![204, 500]).await;
    let mut sink = InfluxSink::new(influx_config(&url)).unwrap();

    assert!(sink.record(event("gate1", 0.5)).await.is_ok());
    let second = sink.record(event("gate2", 0.7)).await;

    match second {
        Err(SinkError::Status { status, .. }) => assert_eq!(status, 500),
        other => panic!("Expected a status error, got {:?}", other),
    }

    // The first point went out on its own and is unaffected by the failure
    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("name=gate1 value=0.5"));
    assert!(!requests[0].contains("gate2"));
    assert!(requests[1].contains("name=gate2 value=0.7"));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (url, requests) = spawn_stub(vec![503, 204]).await;
    let mut sink = InfluxSink::new(influx_config(&url)).unwrap();

    sink.record_with_retry(event("gate1", 0.5), 3).await.unwrap();
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (url, requests) = spawn_stub(vec![400]).await;
    let mut sink = InfluxSink::new(influx_config(&url)).unwrap();

    let result = sink.record_with_retry(event("gate1", 0.5), 3).await;

    assert!(matches!(result, Err(SinkError::Status { status: 400, .. })));
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_health_check() {
    let (url, requests) = spawn_stub(vec![200]).await;
    let sink = InfluxSink::new(influx_config(&url)).unwrap();

    assert!(sink.health_check().await);
    assert!(requests.lock().unwrap()[0].starts_with("GET /health "));
}

#[tokio::test]
async fn test_unreachable_server_fails_health_check() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let sink = InfluxSink::new(influx_config(&url)).unwrap();
    assert!(!sink.health_check().await);
}

#[tokio::test]
async fn test_listener_stops_after_failed_write() {
    let (url, requests) = spawn_stub(vec![204, 500]).await;
    let sink = InfluxSink::new(influx_config(&url)).unwrap();
    let mut listener = Listener::new(
        "tcp://127.0.0.1:5555",
        ParameterFilter::new(["gate1", "gate2"]),
        Box::new(sink),
    );

    let (sender, mut subscription) = ChannelSubscription::new(4);
    for (name, value) in [("gate1", 0.5), ("gate3", 9.0), ("gate2", 0.7)] {
        let payload = json!({"name": name, "action": "set", "value": value, "unit": "V"});
        sender
            .send(Message::new("params", serde_json::to_vec(&payload).unwrap()))
            .await
            .unwrap();
    }

    let result = listener.consume(&mut subscription).await;

    assert!(matches!(result, Err(ListenerError::SinkWrite(_))));
    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("name=gate1"));
    assert!(requests[1].contains("name=gate2"));
    drop(sender);
}
