//! End-to-end listener lifecycle against files in an upload directory

mod common;

use std::sync::Arc;
use std::time::Duration;

use baraza_relay::{Error, PeerState, RoomId, SessionOutcome, SessionPhase, SignalingError};
use common::{Harness, OFFER};
use tokio_test::{assert_err, assert_ok};

fn room(id: &str) -> RoomId {
    RoomId::new(id).unwrap()
}

#[tokio::test]
async fn two_listeners_share_one_source() {
    let h = Harness::new();
    h.upload("r1");
    let registry = h.relay.registry();

    // Listener A creates the source
    let a = h.relay.open_session("r1").await.unwrap();
    assert_eq!(h.opener.opens(), 1);
    assert_ok!(a.handle_offer(OFFER, "offer").await);
    assert_eq!(a.phase().await, SessionPhase::Connected);
    let first_generation = registry.room_stats(&room("r1")).await.unwrap().generation;

    // Listener B joins without reopening the origin
    let b = h.relay.open_session("r1").await.unwrap();
    assert_ok!(b.handle_offer(OFFER, "offer").await);
    assert_eq!(h.opener.opens(), 1);
    let stats = registry.room_stats(&room("r1")).await.unwrap();
    assert_eq!(stats.subscriber_count, 2);
    assert_eq!(stats.generation, first_generation);
    assert_eq!(h.relay.sessions().len(), 2);

    // A leaves, the source stays up for B
    a.stop().await;
    assert_eq!(a.phase().await, SessionPhase::Closed);
    let stats = registry.room_stats(&room("r1")).await.unwrap();
    assert_eq!(stats.subscriber_count, 1);

    // B leaves, the source is torn down
    b.stop().await;
    assert!(!registry.has_room(&room("r1")).await);
    assert!(h.relay.sessions().is_empty());

    // A fresh listener gets a fresh source
    let c = h.relay.open_session("r1").await.unwrap();
    assert_eq!(h.opener.opens(), 2);
    let stats = registry.room_stats(&room("r1")).await.unwrap();
    assert!(stats.generation > first_generation);
    c.stop().await;
}

#[tokio::test]
async fn attached_track_carries_room_audio() {
    let h = Harness::new();
    h.upload("r1");

    let session = h.relay.open_session("r1").await.unwrap();
    session.handle_offer(OFFER, "offer").await.unwrap();

    let peer = h.connector.peer(0);
    assert!(peer.has_track());
    let mut track = peer.take_track().unwrap();
    assert_eq!(track.format().to_string(), "L16 8000Hz x1");

    // 10ms of 16-bit samples
    let frame = tokio::time::timeout(Duration::from_secs(2), track.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.data.len(), 160);

    session.stop().await;
}

#[tokio::test]
async fn wideband_stereo_upload_is_served() {
    let h = Harness::new();
    h.upload_as("studio", 48000, 2);

    let session = assert_ok!(h.relay.open_session("studio").await);
    let answer = assert_ok!(session.handle_offer(OFFER, "offer").await);
    assert!(answer.sdp.starts_with("v=0"));
    assert_eq!(session.phase().await, SessionPhase::Connected);

    let stats = h.relay.registry().room_stats(&room("studio")).await.unwrap();
    assert_eq!(stats.format.to_string(), "L16 8000Hz x1");

    let mut track = h.connector.peer(0).take_track().unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(2), track.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.data.len(), 160);
    assert_eq!(frame.duration, Duration::from_millis(10));

    session.stop().await;
}

#[tokio::test]
async fn cd_quality_upload_is_served() {
    let h = Harness::new();
    h.upload_as("podcast", 44100, 1);

    let session = assert_ok!(h.relay.open_session("podcast").await);
    assert_ok!(session.handle_offer(OFFER, "offer").await);

    let track = h.connector.peer(0).take_track().unwrap();
    assert_eq!(track.format().to_string(), "L16 8000Hz x1");

    session.stop().await;
}

#[tokio::test]
async fn missing_origin_leaves_no_session() {
    let h = Harness::new();

    let err = assert_err!(h.relay.open_session("r2").await);

    assert!(err.is_source_unavailable());
    assert!(h.relay.sessions().is_empty());
    assert_eq!(h.relay.registry().room_count().await, 0);
    assert_eq!(h.connector.created(), 0);

    let stats = h.relay.stats().await;
    assert_eq!(stats.sources_unavailable, 1);
    assert_eq!(stats.sessions_opened, 0);
}

#[tokio::test]
async fn failed_connection_cleans_up_once() {
    let h = Harness::new();
    h.upload("r1");

    let a = h.relay.open_session("r1").await.unwrap();
    let b = h.relay.open_session("r1").await.unwrap();
    a.handle_offer(OFFER, "offer").await.unwrap();
    b.handle_offer(OFFER, "offer").await.unwrap();

    let peer = h.connector.peer(0);
    peer.report(PeerState::Connected);
    peer.report(PeerState::Failed);

    let outcome = tokio::time::timeout(Duration::from_secs(2), a.terminated())
        .await
        .unwrap();
    assert_eq!(outcome, SessionOutcome::ConnectionFailed);
    assert_eq!(a.phase().await, SessionPhase::Failed);
    assert!(!h.relay.sessions().contains(a.id()));
    assert_eq!(peer.closes(), 1);

    // A later stop and a repeated failure report change nothing
    a.stop().await;
    peer.report(PeerState::Failed);
    tokio::task::yield_now().await;
    assert_eq!(peer.closes(), 1);

    let stats = h.relay.registry().room_stats(&room("r1")).await.unwrap();
    assert_eq!(stats.subscriber_count, 1);
    assert!(h.relay.sessions().contains(b.id()));
    assert_eq!(h.relay.stats().await.sessions_failed, 1);

    let err = a.handle_offer(OFFER, "offer").await.unwrap_err();
    assert!(matches!(
        err,
        SignalingError::SessionTerminated(SessionPhase::Failed)
    ));

    b.stop().await;
}

#[tokio::test]
async fn stop_racing_failure_is_safe() {
    let h = Harness::new();
    h.upload("r1");

    for _ in 0..16 {
        let session = h.relay.open_session("r1").await.unwrap();
        session.handle_offer(OFFER, "offer").await.unwrap();
        let peer = h.connector.peer(h.connector.created() - 1);

        peer.report(PeerState::Failed);
        let (s1, s2) = (session.clone(), session.clone());
        tokio::join!(s1.stop(), s2.stop());

        assert!(session.phase().await.is_terminal());
        assert_eq!(peer.closes(), 1);
    }

    assert!(h.relay.sessions().is_empty());
    assert_eq!(h.relay.registry().room_count().await, 0);
}

#[tokio::test]
async fn concurrent_first_listeners_open_origin_once() {
    let h = Arc::new(Harness::new());
    h.upload("r1");

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(
            async move { h.relay.open_session("r1").await.unwrap() },
        ));
    }
    let mut sessions = Vec::new();
    for task in tasks {
        sessions.push(task.await.unwrap());
    }

    assert_eq!(h.opener.opens(), 1);
    assert_eq!(h.relay.sessions().len(), 16);
    let stats = h.relay.registry().room_stats(&room("r1")).await.unwrap();
    assert_eq!(stats.subscriber_count, 16);

    for session in &sessions {
        session.stop().await;
    }
    assert_eq!(h.relay.registry().room_count().await, 0);
}

#[tokio::test]
async fn connector_failure_releases_source() {
    let h = Harness::new();
    h.upload("r1");
    h.connector.fail_connects(true);

    let err = h.relay.open_session("r1").await.unwrap_err();

    assert!(matches!(err, Error::Peer(_)));
    assert!(h.relay.sessions().is_empty());
    assert!(!h.relay.registry().has_room(&room("r1")).await);
}

#[tokio::test]
async fn path_traversal_is_rejected() {
    let h = Harness::new();

    let err = h.relay.open_session("../etc/passwd").await.unwrap_err();

    assert!(!err.is_source_unavailable());
    assert_eq!(h.opener.opens(), 0);
}

#[tokio::test]
async fn host_close_stops_listeners() {
    let h = Harness::new();
    h.upload("r1");
    h.upload("r2");

    let a = h.relay.open_session("r1").await.unwrap();
    let b = h.relay.open_session("r1").await.unwrap();
    let other = h.relay.open_session("r2").await.unwrap();
    a.handle_offer(OFFER, "offer").await.unwrap();

    assert!(h.relay.close_room("r1").await.unwrap());

    for session in [&a, &b] {
        let outcome = tokio::time::timeout(Duration::from_secs(2), session.terminated())
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Stopped);
    }
    assert_eq!(h.relay.sessions().len(), 1);
    assert!(h.relay.sessions().contains(other.id()));
    assert!(h.relay.registry().has_room(&room("r2")).await);

    other.stop().await;
}

#[tokio::test]
async fn listener_limit_frees_on_stop() {
    let h = Harness::with_config(baraza_relay::RelayConfig::default().max_listeners(1));
    h.upload("r1");

    let a = h.relay.open_session("r1").await.unwrap();
    assert!(matches!(
        h.relay.open_session("r1").await,
        Err(Error::CapacityReached(1))
    ));

    a.stop().await;
    let b = assert_ok!(h.relay.open_session("r1").await);
    b.stop().await;
}
