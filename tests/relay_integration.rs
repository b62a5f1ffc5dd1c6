//! End-to-end relay flows over the in-memory registry and room broadcaster.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, watch};

use stream_relay::adapters::{InMemoryConnectionRegistry, RoomBroadcaster};
use stream_relay::application::{Admitted, RelayService, RelayServiceConfig};
use stream_relay::domain::foundation::StreamId;
use stream_relay::domain::relay::{
    BroadcastOverlay, ClientEvent, JoinStream, LeaveStream, Role, ServerEvent,
};
use stream_relay::domain::scaling::ScalingState;

// =============================================================================
// Test Infrastructure
// =============================================================================

fn relay(max_connections: usize) -> (watch::Sender<ScalingState>, RelayService) {
    let (tx, rx) = watch::channel(ScalingState {
        active_connections: 0,
        max_connections,
        compression_level: 6,
        auto_scaling_enabled: true,
    });
    let relay = RelayService::new(
        Arc::new(InMemoryConnectionRegistry::new(rx)),
        Arc::new(RoomBroadcaster::new(4)),
        RelayServiceConfig::default(),
    );
    (tx, relay)
}

fn stream(id: &str) -> StreamId {
    StreamId::new(id).unwrap()
}

fn join(id: &str) -> ClientEvent {
    ClientEvent::JoinStream(JoinStream {
        stream_id: stream(id),
        user_type: Role::Viewer,
        user_id: None,
    })
}

fn leave(id: &str) -> ClientEvent {
    ClientEvent::LeaveStream(LeaveStream {
        stream_id: stream(id),
    })
}

fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn join_ack_count(events: &[ServerEvent]) -> Option<usize> {
    events.iter().find_map(|e| match e {
        ServerEvent::JoinStreamSuccess(ack) => Some(ack.viewer_count),
        _ => None,
    })
}

fn last_viewer_count(events: &[ServerEvent]) -> Option<usize> {
    events.iter().rev().find_map(|e| match e {
        ServerEvent::ViewerCountUpdate(update) => Some(update.count),
        _ => None,
    })
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn overlay_reaches_other_members_only() {
    let (_tx, relay) = relay(100);
    let Admitted {
        connection: a,
        outbound: mut a_rx,
    } = relay.connect(Role::Viewer).await.unwrap();
    let Admitted {
        connection: b,
        outbound: mut b_rx,
    } = relay.connect(Role::Viewer).await.unwrap();

    relay.dispatch(&a.id, join("s1")).await.unwrap();
    assert_eq!(join_ack_count(&drain(&mut a_rx)), Some(1));

    relay.dispatch(&b.id, join("s1")).await.unwrap();
    assert_eq!(join_ack_count(&drain(&mut b_rx)), Some(2));
    assert_eq!(last_viewer_count(&drain(&mut a_rx)), Some(2));

    relay
        .dispatch(
            &a.id,
            ClientEvent::BroadcastOverlay(BroadcastOverlay {
                stream_id: stream("s1"),
                overlay_type: "poll".to_string(),
                overlay_data: json!({"question": "Next map?"}),
                timestamp: None,
            }),
        )
        .await
        .unwrap();

    let received = drain(&mut b_rx);
    let overlays: Vec<_> = received
        .iter()
        .filter_map(|e| match e {
            ServerEvent::OverlayUpdate(update) => Some(update),
            _ => None,
        })
        .collect();
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].overlay_type, "poll");
    assert_eq!(overlays[0].overlay_data["question"], "Next map?");
    assert!(drain(&mut a_rx)
        .iter()
        .all(|e| !matches!(e, ServerEvent::OverlayUpdate(_))));

    relay.dispatch(&b.id, leave("s1")).await.unwrap();
    assert_eq!(last_viewer_count(&drain(&mut a_rx)), Some(1));
    assert_eq!(relay.stats().await.rooms, 1);

    relay.dispatch(&a.id, leave("s1")).await.unwrap();
    let stats = relay.stats().await;
    assert_eq!(stats.rooms, 0);
    assert_eq!(stats.viewers, 0);
    assert_eq!(stats.active_connections, 2);
}

#[tokio::test]
async fn rooms_are_isolated() {
    let (_tx, relay) = relay(100);
    let a = relay.connect(Role::Streamer).await.unwrap();
    let mut b = relay.connect(Role::Viewer).await.unwrap();

    relay.dispatch(&a.connection.id, join("s1")).await.unwrap();
    relay.dispatch(&b.connection.id, join("s2")).await.unwrap();
    drain(&mut b.outbound);

    let delivered = relay
        .publish_to_room(&stream("s1"), ServerEvent::viewer_count(stream("s1"), 9))
        .await;

    assert_eq!(delivered, 1);
    assert!(drain(&mut b.outbound).is_empty());
}

#[tokio::test]
async fn raised_ceiling_admits_more_connections() {
    let (tx, relay) = relay(1);
    let _first = relay.connect(Role::Viewer).await.unwrap();
    assert!(relay.connect(Role::Viewer).await.is_err());

    tx.send_modify(|s| s.max_connections = 2);

    assert!(relay.connect(Role::Viewer).await.is_ok());
    assert_eq!(relay.stats().await.max_connections, 2);
}

#[tokio::test]
async fn disconnect_mid_room_updates_remaining_members() {
    let (_tx, relay) = relay(100);
    let mut a = relay.connect(Role::Viewer).await.unwrap();
    let b = relay.connect(Role::Viewer).await.unwrap();

    relay.dispatch(&a.connection.id, join("s1")).await.unwrap();
    relay.dispatch(&b.connection.id, join("s1")).await.unwrap();
    drain(&mut a.outbound);

    relay.disconnect(&b.connection.id).await;

    assert_eq!(last_viewer_count(&drain(&mut a.outbound)), Some(1));
    assert!(relay.disconnect(&b.connection.id).await.is_none());
    assert_eq!(relay.active_connections().await, 1);
}

#[tokio::test]
async fn destroyed_room_is_recreated_fresh_on_rejoin() {
    let (_tx, relay) = relay(100);
    let mut a = relay.connect(Role::Viewer).await.unwrap();

    relay.dispatch(&a.connection.id, join("s1")).await.unwrap();
    relay.dispatch(&a.connection.id, leave("s1")).await.unwrap();
    assert_eq!(relay.stats().await.rooms, 0);
    drain(&mut a.outbound);

    relay.dispatch(&a.connection.id, join("s1")).await.unwrap();
    assert_eq!(join_ack_count(&drain(&mut a.outbound)), Some(1));
    assert_eq!(relay.stats().await.rooms, 1);
}

#[tokio::test]
async fn admission_resumes_as_soon_as_a_slot_frees() {
    let (_tx, relay) = relay(2);
    let first = relay.connect(Role::Viewer).await.unwrap();
    let _second = relay.connect(Role::Viewer).await.unwrap();
    assert!(relay.connect(Role::Viewer).await.is_err());

    relay.disconnect(&first.connection.id).await;

    assert!(relay.connect(Role::Viewer).await.is_ok());
    assert!(relay.connect(Role::Viewer).await.is_err());
}
