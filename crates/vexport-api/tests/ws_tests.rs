//! End-to-end realtime protocol tests over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use vexport_api::{create_router, ApiConfig, AppState};
use vexport_models::{JobResult, MediaSource, ResultRef};
use vexport_queue::{JobQueue, ProgressReporter};
use vexport_worker::{
    JobProcessor, ProcessingRequest, QueueScheduler, WorkerConfig, WorkerError, WorkerResult,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Succeeds with a location result unless the video URL mentions `fail`.
/// URLs mentioning `slow` take a moment.
struct EchoProcessor;

#[async_trait]
impl JobProcessor for EchoProcessor {
    async fn process(
        &self,
        request: ProcessingRequest,
        progress: ProgressReporter,
    ) -> WorkerResult<JobResult> {
        let url = match &request.inputs.video {
            MediaSource::Url { url } => url.clone(),
            MediaSource::Inline { .. } => "inline".to_string(),
        };
        progress.report_with_message(25, "Working").await;
        if url.contains("slow") {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        if url.contains("fail") {
            return Err(WorkerError::processing_failed("could not decode video"));
        }
        progress.report(100).await;
        Ok(JobResult {
            result_ref: ResultRef::Location {
                url: format!("{}.out", url),
            },
            size_bytes: 2048,
        })
    }
}

async fn start_server() -> SocketAddr {
    let queue = Arc::new(JobQueue::new());
    let scheduler = Arc::new(QueueScheduler::new(
        Arc::clone(&queue),
        Arc::new(EchoProcessor),
        &WorkerConfig::default(),
    ));
    tokio::spawn(async move { scheduler.run().await });

    let config = ApiConfig {
        metrics_enabled: false,
        ..ApiConfig::default()
    };
    let app = create_router(AppState::new(config, queue), None);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    client
}

/// Next JSON frame of any type.
async fn next_frame(client: &mut Client) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Next JSON frame that is not a queue snapshot.
async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = next_frame(client).await;
        if frame["type"] != "queue_status" {
            return frame;
        }
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

fn submit(url: &str) -> Value {
    json!({
        "type": "submit_job",
        "inputs": { "video": { "kind": "url", "url": url } },
        "parameters": { "video_speed": 1.5, "intro_animation": "fade_in" }
    })
}

#[tokio::test]
async fn connect_receives_welcome_then_queue_status() {
    let addr = start_server().await;
    let mut client = connect(addr).await;

    let welcome = next_frame(&mut client).await;
    assert_eq!(welcome["type"], "welcome");
    assert!(welcome["connection_id"].is_string());

    let status = next_frame(&mut client).await;
    assert_eq!(status["type"], "queue_status");
    assert_eq!(status["connected_users"], 1);
    assert_eq!(status["queue_length"], 0);
    assert_eq!(status["processing"], false);
    assert!(status.get("your_position").is_none());
}

#[tokio::test]
async fn submitted_job_runs_to_success() {
    let addr = start_server().await;
    let mut client = connect(addr).await;
    next_event(&mut client).await; // welcome

    send_json(&mut client, submit("https://example.com/clip.mp4")).await;

    let accepted = next_event(&mut client).await;
    assert_eq!(accepted["type"], "job_accepted");
    assert_eq!(accepted["position"], 1);
    let job_id = accepted["job_id"].clone();

    let started = next_event(&mut client).await;
    assert_eq!(started["type"], "job_started");
    assert_eq!(started["job_id"], job_id);

    let progress = next_event(&mut client).await;
    assert_eq!(progress["type"], "progress");
    assert_eq!(progress["percent"], 25);
    assert_eq!(progress["message"], "Working");

    let progress = next_event(&mut client).await;
    assert_eq!(progress["percent"], 100);

    let done = next_event(&mut client).await;
    assert_eq!(done["type"], "job_succeeded");
    assert_eq!(done["job_id"], job_id);
    assert_eq!(done["size_bytes"], 2048);
    assert_eq!(done["result_ref"]["kind"], "location");
    assert_eq!(
        done["result_ref"]["url"],
        "https://example.com/clip.mp4.out"
    );
}

#[tokio::test]
async fn failing_job_reports_reason() {
    let addr = start_server().await;
    let mut client = connect(addr).await;
    next_event(&mut client).await; // welcome

    send_json(&mut client, submit("https://example.com/fail.mp4")).await;

    loop {
        let event = next_event(&mut client).await;
        if event["type"] == "job_failed" {
            assert!(event["reason"]
                .as_str()
                .unwrap()
                .contains("could not decode video"));
            break;
        }
        assert_ne!(event["type"], "job_succeeded");
    }
}

#[tokio::test]
async fn invalid_parameters_are_rejected() {
    let addr = start_server().await;
    let mut client = connect(addr).await;
    next_event(&mut client).await; // welcome

    send_json(
        &mut client,
        json!({
            "type": "submit_job",
            "inputs": { "video": { "kind": "url", "url": "https://example.com/a.mp4" } },
            "parameters": { "video_speed": 5.0, "color_overlay": "red" }
        }),
    )
    .await;

    let rejected = next_event(&mut client).await;
    assert_eq!(rejected["type"], "job_rejected");
    let fields: Vec<&str> = rejected["violations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["color_overlay", "video_speed"]);
}

#[tokio::test]
async fn malformed_frames_get_an_error_and_keep_the_connection() {
    let addr = start_server().await;
    let mut client = connect(addr).await;
    next_event(&mut client).await; // welcome

    client
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();
    let error = next_event(&mut client).await;
    assert_eq!(error["type"], "error");

    send_json(&mut client, json!({ "type": "dance" })).await;
    let error = next_event(&mut client).await;
    assert_eq!(error["type"], "error");

    // Still usable afterwards
    send_json(&mut client, submit("https://example.com/after.mp4")).await;
    assert_eq!(next_event(&mut client).await["type"], "job_accepted");
}

#[tokio::test]
async fn second_submission_is_a_duplicate() {
    let addr = start_server().await;
    let mut client = connect(addr).await;
    next_event(&mut client).await; // welcome

    send_json(&mut client, submit("https://example.com/slow.mp4")).await;
    send_json(&mut client, submit("https://example.com/two.mp4")).await;

    assert_eq!(next_event(&mut client).await["type"], "job_accepted");

    let mut saw_duplicate = false;
    loop {
        let event = next_event(&mut client).await;
        match event["type"].as_str() {
            Some("job_rejected") => saw_duplicate = true,
            Some("job_succeeded") => break,
            _ => {}
        }
    }
    assert!(saw_duplicate);
}

#[tokio::test]
async fn other_connections_see_queue_changes() {
    let addr = start_server().await;
    let mut observer = connect(addr).await;
    assert_eq!(next_frame(&mut observer).await["type"], "welcome");
    assert_eq!(next_frame(&mut observer).await["connected_users"], 1);

    let mut client = connect(addr).await;
    let status = next_frame(&mut observer).await;
    assert_eq!(status["type"], "queue_status");
    assert_eq!(status["connected_users"], 2);

    next_event(&mut client).await; // welcome
    send_json(&mut client, submit("https://example.com/x.mp4")).await;

    // The observer never sees owner-scoped events, only snapshots
    let mut saw_processing = false;
    loop {
        let frame = next_frame(&mut observer).await;
        assert_eq!(frame["type"], "queue_status");
        assert!(frame.get("your_position").is_none());
        if frame["processing"] == true {
            saw_processing = true;
        } else if saw_processing {
            break;
        }
    }

    drop(client);
    loop {
        let frame = next_frame(&mut observer).await;
        if frame["connected_users"] == 1 {
            break;
        }
    }
}
