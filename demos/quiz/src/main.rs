//! Runs the enhanced-quiz definition end-to-end in a local room.
//!
//! Two sessions join; Alice plays through the quiz while Bob idles, which
//! shows the per-player isolation: each player's phase, question, and score
//! live under their own `players.<sid>` entry. The definition is loaded
//! from this demo's `definitions/` directory, the same way a deployment
//! would resolve a `definition_id`.

use std::path::PathBuf;
use std::time::Duration;

use playcast::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), PlaycastError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let definitions_dir =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("definitions");

    let mut rooms = RoomManager::new();
    let room = rooms.create_room(RoomOptions {
        definition_id: Some("enhanced-quiz".into()),
        definitions_dir: Some(definitions_dir),
        ..Default::default()
    })?;
    println!("room {room} created from definition `enhanced-quiz`");

    let alice = SessionId::new("alice");
    let bob = SessionId::new("bob");

    let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
    let (bob_tx, _bob_rx) = mpsc::unbounded_channel();
    rooms
        .join_room(alice.clone(), room, Some("Alice".into()), alice_tx)
        .await?;
    rooms
        .join_room(bob.clone(), room, Some("Bob".into()), bob_tx)
        .await?;

    // Print Alice's broadcasts in the background; snapshots are summarized
    // inline below.
    tokio::spawn(async move {
        while let Some(msg) = alice_rx.recv().await {
            if let RoomOutbound::Broadcast { event, data } = msg {
                println!("  [broadcast] {event}: {data}");
            }
        }
    });

    rooms.route_message(alice.clone(), "start", json!({})).await?;
    print_player(&rooms, room, "alice").await?;

    // The first question is "What is the capital of France?" with answer
    // index 2 (Paris). Answer correctly, wait out the feedback window,
    // then answer the rest with a wrong value.
    rooms
        .route_message(alice.clone(), "answer", json!({"value": "2"}))
        .await?;
    print_player(&rooms, room, "alice").await?;

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(3200)).await;
        rooms
            .route_message(alice.clone(), "answer", json!({"value": "?"}))
            .await?;
    }
    tokio::time::sleep(Duration::from_millis(3200)).await;

    print_player(&rooms, room, "alice").await?;
    print_player(&rooms, room, "bob").await?;

    rooms.dispose_room(room).await?;
    Ok(())
}

async fn print_player(
    rooms: &RoomManager,
    room: RoomId,
    who: &str,
) -> Result<(), PlaycastError> {
    let snapshot = rooms.room_snapshot(room).await?;
    let p = &snapshot["players"][who];
    println!(
        "{who}: phase={} score={} question={}",
        p["phase"], p["score"],
        p["currentQuestion"]["text"]
    );
    Ok(())
}
