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

// Zenoh transport tests on the same runtime flavour as the binary

use parameter_listener::config::LoggingConfig;
use parameter_listener::logging::build_dispatch;
use parameter_listener::{
    CsvSink, Listener, ListenerError, ParameterFilter, Subscription, ZenohSubscription,
};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// A local port nobody is listening on
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Peer session accepting connections on `port`, used as the publisher
async fn publisher_session(port: u16) -> zenoh::Session {
    let mut config = zenoh::Config::default();
    config.insert_json5("mode", "\"peer\"").unwrap();
    config
        .insert_json5("listen/endpoints", &format!("[\"tcp/127.0.0.1:{}\"]", port))
        .unwrap();
    config
        .insert_json5("scouting/multicast/enabled", "false")
        .unwrap();
    zenoh::open(config).await.unwrap()
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_unreachable_endpoint_fails_in_peer_mode() {
    let address = format!("tcp://127.0.0.1:{}", free_port());

    let result = ZenohSubscription::connect(&address, "peer").await;

    match result {
        Err(ListenerError::Connect { address: failed, .. }) => assert_eq!(failed, address),
        Err(other) => panic!("Expected a connect error, got {}", other),
        Ok(_) => panic!("Connected to an endpoint nobody listens on"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_unreachable_endpoint_fails_in_client_mode() {
    let address = format!("tcp://127.0.0.1:{}", free_port());

    let result = ZenohSubscription::connect(&address, "client").await;
    assert!(matches!(result, Err(ListenerError::Connect { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_closed_subscription_delivers_nothing() {
    let port = free_port();
    let publisher = publisher_session(port).await;

    let mut subscription =
        ZenohSubscription::connect(&format!("tcp://127.0.0.1:{}", port), "peer")
            .await
            .unwrap();
    subscription.close().await.unwrap();

    publisher
        .put("instruments/dac", r#"{"name": "gate1", "value": 0.5}"#)
        .await
        .unwrap();

    let next = tokio::time::timeout(Duration::from_millis(300), subscription.recv()).await;
    assert!(!matches!(next, Ok(Ok(_))));

    publisher.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_run_until_records_and_shuts_down_cleanly() {
    let captured = Captured::default();
    let logging = LoggingConfig {
        level: "debug".to_string(),
        format: "text".to_string(),
    };
    let dispatch = build_dispatch(&logging, captured.clone()).unwrap();
    let _guard = tracing::dispatcher::set_default(&dispatch);

    let port = free_port();
    let publisher = publisher_session(port).await;

    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("run.csv");
    let sink = CsvSink::open(&csv_path).unwrap();
    let mut listener = Listener::new(
        format!("tcp://127.0.0.1:{}", port),
        ParameterFilter::new(["gate1"]),
        Box::new(sink),
    );

    // Keep publishing until the subscriber has had time to appear
    let feed = tokio::spawn(async move {
        for _ in 0..15 {
            publisher
                .put(
                    "instruments/dac",
                    r#"{"name": "gate1", "action": "parameter-update", "value": 0.5, "unit": "V"}"#,
                )
                .await
                .unwrap();
            publisher
                .put("instruments/dac", r#"{"name": "gate2", "value": 1.5, "unit": "V"}"#)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        publisher
    });

    let result = listener
        .run_until(tokio::time::sleep(Duration::from_secs(2)))
        .await;
    assert!(result.is_ok(), "run_until failed: {:?}", result.err());

    let contents = std::fs::read_to_string(&csv_path).unwrap();
    assert!(contents.starts_with("time,name,value,unit\n"));
    assert!(contents.contains(",gate1,0.5,V"));
    assert!(!contents.contains("gate2"));

    let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Program stopped manually"));
    assert!(output.contains("Closing Zenoh session"));
    assert!(!output.contains("Failed to release subscription"));

    let publisher = feed.await.unwrap();
    publisher.close().await.unwrap();
}
