//! Signaling driver over in-memory text channels

mod common;

use std::time::Duration;

use baraza_relay::signaling::{InboundMessage, OutboundMessage};
use baraza_relay::{serve_signaling, PeerState, SessionOutcome, SessionPhase};
use common::{Harness, OFFER};
use tokio::sync::mpsc;

fn offer_text() -> String {
    serde_json::to_string(&InboundMessage::offer(OFFER)).unwrap()
}

async fn next_reply(rx: &mut mpsc::Receiver<String>) -> OutboundMessage {
    let text = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn offer_is_answered_and_disconnect_stops() {
    let h = Harness::new();
    h.upload("r1");
    let session = h.relay.open_session("r1").await.unwrap();

    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let driver = tokio::spawn(serve_signaling(session.clone(), in_rx, out_tx));

    in_tx.send(offer_text()).await.unwrap();
    match next_reply(&mut out_rx).await {
        OutboundMessage::Answer { sdp } => assert!(sdp.starts_with("v=0")),
        other => panic!("expected answer, got {other:?}"),
    }
    assert_eq!(session.phase().await, SessionPhase::Connected);

    drop(in_tx);
    let outcome = driver.await.unwrap();

    assert_eq!(outcome, SessionOutcome::Stopped);
    assert_eq!(session.phase().await, SessionPhase::Closed);
    assert!(h.relay.sessions().is_empty());
    assert_eq!(h.connector.peer(0).closes(), 1);
}

#[tokio::test]
async fn noise_is_skipped_and_second_offer_rejected() {
    let h = Harness::new();
    h.upload("r1");
    let session = h.relay.open_session("r1").await.unwrap();

    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let driver = tokio::spawn(serve_signaling(session.clone(), in_rx, out_tx));

    in_tx.send("not json".to_string()).await.unwrap();
    in_tx.send(r#"{"type":"ping"}"#.to_string()).await.unwrap();
    in_tx.send(offer_text()).await.unwrap();
    assert!(matches!(
        next_reply(&mut out_rx).await,
        OutboundMessage::Answer { .. }
    ));

    in_tx.send(offer_text()).await.unwrap();
    match next_reply(&mut out_rx).await {
        OutboundMessage::Error { message } => assert!(message.contains("already negotiated")),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(session.phase().await, SessionPhase::Connected);

    drop(in_tx);
    driver.await.unwrap();
}

#[tokio::test]
async fn malformed_offer_closes_session() {
    let h = Harness::new();
    h.upload("r1");
    let session = h.relay.open_session("r1").await.unwrap();

    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let driver = tokio::spawn(serve_signaling(session.clone(), in_rx, out_tx));

    in_tx.send(r#"{"type":"offer"}"#.to_string()).await.unwrap();
    assert!(matches!(
        next_reply(&mut out_rx).await,
        OutboundMessage::Error { .. }
    ));

    // Malformed SDP is rejected before negotiation starts
    assert_eq!(session.phase().await, SessionPhase::New);

    drop(in_tx);
    assert_eq!(driver.await.unwrap(), SessionOutcome::Stopped);
}

#[tokio::test]
async fn connection_failure_ends_driver() {
    let h = Harness::new();
    h.upload("r1");
    let session = h.relay.open_session("r1").await.unwrap();

    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let driver = tokio::spawn(serve_signaling(session.clone(), in_rx, out_tx));

    in_tx.send(offer_text()).await.unwrap();
    next_reply(&mut out_rx).await;

    h.connector.peer(0).report(PeerState::Failed);

    let outcome = tokio::time::timeout(Duration::from_secs(2), driver)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, SessionOutcome::ConnectionFailed);
    assert!(h.relay.sessions().is_empty());

    // The inbound side is still open; nothing leaks through it
    drop(in_tx);
}

#[tokio::test]
async fn dropped_driver_stops_session() {
    let h = Harness::new();
    h.upload("r1");
    let session = h.relay.open_session("r1").await.unwrap();

    let (_in_tx, in_rx) = mpsc::channel::<String>(8);
    let (out_tx, _out_rx) = mpsc::channel(8);
    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        serve_signaling(session.clone(), in_rx, out_tx),
    )
    .await;
    assert!(cancelled.is_err());

    let outcome = tokio::time::timeout(Duration::from_secs(2), session.terminated())
        .await
        .unwrap();
    assert_eq!(outcome, SessionOutcome::Stopped);
    assert!(h.relay.sessions().is_empty());
    assert_eq!(h.relay.registry().room_count().await, 0);
}

#[tokio::test]
async fn closed_outbound_ends_driver() {
    let h = Harness::new();
    h.upload("r1");
    let session = h.relay.open_session("r1").await.unwrap();

    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, out_rx) = mpsc::channel(8);
    drop(out_rx);

    in_tx.send(offer_text()).await.unwrap();
    let outcome = serve_signaling(session.clone(), in_rx, out_tx).await;

    assert_eq!(outcome, SessionOutcome::Stopped);
    assert!(session.phase().await.is_terminal());
}
