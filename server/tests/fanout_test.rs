//! End-to-end pipeline tests: emit an activity over HTTP and observe the
//! durable record plus the derived notification pushes over WebSocket.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type WsWrite = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsRead = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Helper: start the server on a random port. Returns the DB pool too so
/// tests can seed the enrollment mirror and inspect the activity log.
async fn start_test_server() -> (String, SocketAddr, classpulse_server::db::DbPool) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = classpulse_server::db::init_db(&data_dir).expect("Failed to init DB");
    let state = classpulse_server::state::AppState::new(db.clone());
    let app = classpulse_server::routes::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr, db)
}

/// Seed a class roster the way the platform's sync job would.
fn seed_class(db: &classpulse_server::db::DbPool, class_id: &str, members: &[&str]) {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO classes (id, name) VALUES (?1, ?1)",
        [class_id],
    )
    .unwrap();
    for member in members {
        conn.execute(
            "INSERT INTO enrollments (class_id, user_id) VALUES (?1, ?2)",
            [class_id, member],
        )
        .unwrap();
    }
}

fn activity_count(db: &classpulse_server::db::DbPool, activity_type: &str) -> i64 {
    let conn = db.lock().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM activities WHERE type = ?1",
        [activity_type],
        |row| row.get(0),
    )
    .unwrap()
}

async fn next_event(read: &mut WsRead) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Expected a frame within timeout")
            .expect("Stream ended unexpectedly")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("Frame should be JSON");
        }
    }
}

async fn connect_and_authenticate(addr: &SocketAddr, user_id: &str) -> (WsWrite, WsRead) {
    let ws_url = format!("ws://{}/ws", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");

    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(
            format!(
                r#"{{"event":"authenticate","data":{{"user_id":"{}"}}}}"#,
                user_id
            )
            .into(),
        ))
        .await
        .expect("Failed to send authenticate");

    let ack = next_event(&mut read).await;
    assert_eq!(ack["event"], "authenticated");

    (write, read)
}

/// POST an activity; returns (status, body).
async fn emit(base_url: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/activities", base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_grade_posted_pushes_to_connected_student() {
    let (base_url, addr, db) = start_test_server().await;
    let (_write, mut read) = connect_and_authenticate(&addr, "s1").await;

    let (status, record) = emit(
        &base_url,
        json!({
            "user_id": "t1",
            "type": "grade_posted",
            "payload": {"studentId": "s1", "assignmentTitle": "Algebra HW", "grade": 92}
        }),
    )
    .await;

    assert_eq!(status, 201);
    assert_eq!(record["type"], "grade_posted");

    let event = next_event(&mut read).await;
    assert_eq!(event["event"], "notification");
    assert_eq!(event["data"]["title"], "Grade Posted");
    assert!(event["data"]["message"]
        .as_str()
        .unwrap()
        .contains("Algebra HW"));
    assert_eq!(event["data"]["data"]["grade"], 92);

    assert_eq!(activity_count(&db, "grade_posted"), 1);
}

#[tokio::test]
async fn test_grade_posted_offline_student_still_records() {
    let (base_url, _addr, db) = start_test_server().await;

    let (status, _record) = emit(
        &base_url,
        json!({
            "user_id": "t1",
            "type": "grade_posted",
            "payload": {"studentId": "s1", "assignmentTitle": "Algebra HW", "grade": 92}
        }),
    )
    .await;

    // No error surfaces for the absent recipient; the durable record exists.
    assert_eq!(status, 201);
    assert_eq!(activity_count(&db, "grade_posted"), 1);
}

#[tokio::test]
async fn test_new_assignment_fans_out_to_connected_members_only() {
    let (base_url, addr, db) = start_test_server().await;
    seed_class(&db, "algebra", &["a", "b", "c"]);

    let (_write_a, mut read_a) = connect_and_authenticate(&addr, "a").await;
    let (_write_c, mut read_c) = connect_and_authenticate(&addr, "c").await;
    // "b" stays offline

    let (status, _record) = emit(
        &base_url,
        json!({
            "user_id": "t1",
            "type": "new_assignment",
            "payload": {"classId": "algebra", "assignmentTitle": "Chapter 5"}
        }),
    )
    .await;
    assert_eq!(status, 201);

    for read in [&mut read_a, &mut read_c] {
        let event = next_event(read).await;
        assert_eq!(event["event"], "notification");
        assert_eq!(event["data"]["title"], "New Assignment");
        assert!(event["data"]["message"]
            .as_str()
            .unwrap()
            .contains("Chapter 5"));
    }
}

#[tokio::test]
async fn test_submission_to_offline_teacher_records_without_error() {
    let (base_url, _addr, db) = start_test_server().await;

    let (status, record) = emit(
        &base_url,
        json!({
            "user_id": "s1",
            "type": "assignment_submitted",
            "payload": {"teacherId": "t1", "studentName": "Maya", "assignmentTitle": "Essay 2"}
        }),
    )
    .await;

    assert_eq!(status, 201);
    assert_eq!(record["user_id"], "s1");
    assert_eq!(activity_count(&db, "assignment_submitted"), 1);
}

#[tokio::test]
async fn test_unrecognized_type_records_but_pushes_nothing() {
    let (base_url, addr, db) = start_test_server().await;
    let (_write, mut read) = connect_and_authenticate(&addr, "u1").await;

    let (status, _record) = emit(
        &base_url,
        json!({
            "user_id": "u1",
            "type": "badge_earned",
            "payload": {"badge": "streak-7"}
        }),
    )
    .await;

    assert_eq!(status, 201);
    assert_eq!(activity_count(&db, "badge_earned"), 1);

    // No notification should arrive for an unrecognized type
    let result = tokio::time::timeout(Duration::from_millis(500), read.next()).await;
    assert!(result.is_err(), "Expected no push, got a frame");
}

#[tokio::test]
async fn test_missing_class_drops_broadcast_without_error() {
    let (base_url, _addr, db) = start_test_server().await;

    let (status, _record) = emit(
        &base_url,
        json!({
            "user_id": "t1",
            "type": "new_assignment",
            "payload": {"classId": "ghost", "assignmentTitle": "X"}
        }),
    )
    .await;

    // Producer still gets a 201 — the record is durable even though the
    // broadcast was dropped.
    assert_eq!(status, 201);
    assert_eq!(activity_count(&db, "new_assignment"), 1);
}

#[tokio::test]
async fn test_empty_user_id_is_rejected() {
    let (base_url, _addr, _db) = start_test_server().await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/activities", base_url))
        .json(&json!({"user_id": "", "type": "grade_posted", "payload": {}}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn test_stats_reports_connections_and_rooms() {
    let (base_url, addr, _db) = start_test_server().await;

    let (mut write, _read) = connect_and_authenticate(&addr, "u1").await;
    write
        .send(Message::Text(
            r#"{"event":"subscribe","data":{"room_id":"class-1"}}"#.into(),
        ))
        .await
        .unwrap();

    // Subscription is processed asynchronously by the actor
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats: Value = reqwest::get(format!("{}/api/stats", base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(stats["connected_count"], 1);
    assert_eq!(stats["active_rooms"], 1);
}
