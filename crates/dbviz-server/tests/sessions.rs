//! Session manager end to end: frames in, frames out.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

use dbviz_server::manager::SessionManager;
use dbviz_server::playback::Mode;
use dbviz_server::schema::{ServerMessage, StatePayload, StepUpdatePayload};

struct Client {
    manager: SessionManager,
    id: Uuid,
    rx: UnboundedReceiver<ServerMessage>,
}

impl Client {
    async fn connect() -> Self {
        let manager = SessionManager::new(Duration::from_millis(10));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = manager.open(tx).await.id();
        // Initial state announcement.
        rx.recv().await.unwrap();
        Client { manager, id, rx }
    }

    async fn send(&mut self, kind: &str, payload: Value) -> ServerMessage {
        let frame = json!({ "type": kind, "payload": payload }).to_string();
        self.manager.dispatch(self.id, &frame).await.unwrap();
        self.next().await
    }

    async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("channel closed")
    }

    async fn state(&mut self, kind: &str, payload: Value) -> StatePayload {
        match self.send(kind, payload).await {
            ServerMessage::SimulationState(state) => state,
            other => panic!("expected simulation_state, got {other:?}"),
        }
    }

    async fn step(&mut self, kind: &str) -> StepUpdatePayload {
        match self.send(kind, Value::Null).await {
            ServerMessage::StepUpdate(update) => update,
            other => panic!("expected step_update, got {other:?}"),
        }
    }

    async fn error(&mut self, kind: &str, payload: Value) -> String {
        match self.send(kind, payload).await {
            ServerMessage::Error(err) => err.code,
            other => panic!("expected error, got {other:?}"),
        }
    }

    async fn insert(&mut self, key: i64) -> StatePayload {
        self.state(
            "start_operation",
            json!({ "project": "btree", "operation": "insert", "params": { "key": key } }),
        )
        .await
    }
}

#[tokio::test]
async fn control_before_any_operation_is_not_initialized() {
    let mut client = Client::connect().await;
    assert_eq!(client.error("step_forward", Value::Null).await, "not_initialized");
    assert_eq!(client.error("play", Value::Null).await, "not_initialized");
}

#[tokio::test]
async fn stepping_walks_the_trace_and_reports_bounds() {
    let mut client = Client::connect().await;
    let state = client.insert(10).await;
    let total = state.total_steps;
    assert!(total >= 2);

    for i in 0..total {
        let update = client.step("step_forward").await;
        assert_eq!(update.step_index, i as i64);
        assert_eq!(update.step.unwrap().index, i);
    }
    assert_eq!(client.error("step_forward", Value::Null).await, "no_more_steps");

    for _ in 0..total {
        client.step("step_backward").await;
    }
    assert_eq!(client.error("step_backward", Value::Null).await, "no_previous_steps");
}

#[tokio::test]
async fn forward_then_backward_serves_identical_snapshot() {
    let mut client = Client::connect().await;
    client
        .state(
            "select_project",
            json!({ "project": "btree", "config": { "initialKeys": [10, 20, 30] } }),
        )
        .await;
    client.insert(40).await;

    client.step("step_forward").await;
    let at_first = client.step("step_forward").await;
    client.step("step_forward").await;
    let back = client.step("step_backward").await;
    assert_eq!(back.data, at_first.data);
    assert_eq!(back.step, at_first.step);
}

#[tokio::test]
async fn stepping_back_to_the_start_serves_initial_snapshot() {
    let mut client = Client::connect().await;
    let state = client.insert(5).await;
    client.step("step_forward").await;
    let update = client.step("step_backward").await;
    assert_eq!(update.step_index, -1);
    assert!(update.step.is_none());
    assert_eq!(update.data, state.data);
}

#[tokio::test]
async fn get_state_is_idempotent() {
    let mut client = Client::connect().await;
    client.insert(1).await;
    client.step("step_forward").await;
    let a = client.state("get_state", Value::Null).await;
    let b = client.state("get_state", Value::Null).await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn speed_is_clamped() {
    let mut client = Client::connect().await;
    assert_eq!(client.state("set_speed", json!({ "speed": 10.0 })).await.speed, 4.0);
    assert_eq!(client.state("set_speed", json!({ "speed": 0.01 })).await.speed, 0.25);
}

#[tokio::test]
async fn autoplay_runs_to_the_end_and_pauses_itself() {
    let mut client = Client::connect().await;
    let total = client.insert(7).await.total_steps;
    client.state("set_speed", json!({ "speed": 4.0 })).await;

    let playing = client.state("play", Value::Null).await;
    assert_eq!(playing.mode, Mode::Playing);

    for i in 0..total {
        match client.next().await {
            ServerMessage::StepUpdate(update) => assert_eq!(update.step_index, i as i64),
            other => panic!("expected step_update, got {other:?}"),
        }
    }
    match client.next().await {
        ServerMessage::SimulationState(state) => {
            assert_eq!(state.mode, Mode::Paused);
            assert_eq!(state.step_index, total as i64 - 1);
        }
        other => panic!("expected simulation_state, got {other:?}"),
    }
    assert_eq!(client.error("play", Value::Null).await, "no_more_steps");
}

#[tokio::test]
async fn play_twice_is_already_playing() {
    let mut client = Client::connect().await;
    client.insert(3).await;
    client.state("set_speed", json!({ "speed": 0.25 })).await;
    client.state("play", Value::Null).await;
    assert_eq!(client.error("play", Value::Null).await, "already_playing");
    let paused = client.state("pause", Value::Null).await;
    assert_eq!(paused.mode, Mode::Paused);
}

#[tokio::test]
async fn pause_outside_playback_acknowledges_with_state() {
    let mut client = Client::connect().await;
    let idle = client.state("pause", Value::Null).await;
    assert_eq!(idle.mode, Mode::Idle);

    client.insert(2).await;
    client.step("step_forward").await;
    let stepping = client.state("pause", Value::Null).await;
    assert_eq!(stepping.mode, Mode::Step);
    assert_eq!(stepping.step_index, 0);
}

#[tokio::test]
async fn reset_keeps_the_structure() {
    let mut client = Client::connect().await;
    client.insert(3).await;
    let state = client.state("reset", Value::Null).await;
    assert_eq!(state.mode, Mode::Idle);
    assert_eq!(state.total_steps, 0);
    assert_eq!(state.project.as_deref(), Some("btree"));

    let after = client.insert(4).await;
    let root = after.data["rootId"].as_str().unwrap();
    assert_eq!(after.data["nodes"][root]["keys"], json!([3]));
}

#[tokio::test]
async fn semantic_failures_arrive_as_steps() {
    let mut client = Client::connect().await;
    let state = client
        .state(
            "start_operation",
            json!({ "project": "query-parser", "operation": "parse", "params": { "query": "SELECT FROM" } }),
        )
        .await;
    for _ in 0..state.total_steps - 1 {
        client.step("step_forward").await;
    }
    let last = client.step("step_forward").await.step.unwrap();
    assert!(last.error);
    assert_eq!(last.title, "Parse Error");
}

#[tokio::test]
async fn bad_frames_are_reported_without_closing_the_session() {
    let mut client = Client::connect().await;
    client.manager.dispatch(client.id, "{{{").await.unwrap();
    match client.next().await {
        ServerMessage::Error(err) => assert_eq!(err.code, "parse_error"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(client.error("explode", Value::Null).await, "unknown_message");
    assert_eq!(
        client
            .error(
                "start_operation",
                json!({ "project": "nope", "operation": "insert", "params": {} }),
            )
            .await,
        "unknown_project"
    );
    assert_eq!(
        client
            .error(
                "start_operation",
                json!({ "project": "btree", "operation": "insert", "params": { "key": "x" } }),
            )
            .await,
        "invalid_payload"
    );
    client.state("get_state", Value::Null).await;
}
