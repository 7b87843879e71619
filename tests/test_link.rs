mod common;
use common::*;

use sma_bridge::error::ProtocolError;
use sma_bridge::sma::frame::command;
use sma_bridge::sma::link::LinkSession;
use sma_bridge::sma::record::SIGNATURE;
use sma_bridge::sma::stuffing::{DELIMITER, REASSEMBLY_BOUND};
use sma_bridge::sma::transport::ScriptedTransport;

fn open(transport: ScriptedTransport) -> LinkSession {
    LinkSession::open(
        Box::new(transport),
        Factory::local_address(),
        Factory::peer_address(),
    )
}

#[tokio::test]
async fn runaway_reassembly_is_rejected_at_the_bound() {
    let mut transport = ScriptedTransport::new();

    // A record that opens normally but never ends: continuation frames
    // keep arriving until the reassembly buffer would overflow.
    let mut opening = vec![DELIMITER];
    opening.extend_from_slice(&SIGNATURE.to_le_bytes());
    opening.extend_from_slice(&[0xAA; 100]);
    transport.push_read(Factory::frame(
        Factory::peer_address(),
        command::FRAGMENT,
        &opening,
    ));
    for _ in 0..6 {
        transport.push_read(Factory::frame(
            Factory::peer_address(),
            command::FRAGMENT,
            &[0xAA; 100],
        ));
    }

    let mut link = open(transport);
    let err = link.receive(command::DATA).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Reassembly(n) if n == REASSEMBLY_BOUND));
    // Not a transport fault; the link survives.
    assert!(link.is_open());
}

#[tokio::test]
async fn closed_stream_surfaces_as_a_transport_error() {
    // An empty script reads like a stream the peer closed.
    let transport = ScriptedTransport::new();

    let mut link = open(transport);
    let err = link.receive(command::DATA).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Transport(_)));
    assert!(err.is_fatal());
    assert!(!link.is_open());
}

#[tokio::test]
async fn malformed_header_is_discarded_and_listening_continues() {
    let mut transport = ScriptedTransport::new();

    // Garbage where a header should be, then a well-formed frame. The
    // garbage is header-sized so the stream stays aligned.
    let mut garbage = Factory::frame(Factory::peer_address(), command::DATA, &[]);
    garbage[3] ^= 0xFF; // break the header checksum
    transport.push_read(garbage);
    transport.push_read(Factory::response_frame(1, 0, &[1, 2, 3, 4]));

    let mut link = open(transport);
    let buf = link.receive(command::DATA).await.unwrap();
    assert_eq!(buf[0], DELIMITER);
    assert_eq!(
        u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]),
        SIGNATURE
    );
}

#[tokio::test]
async fn close_is_idempotent_and_releases_the_transport() {
    let transport = ScriptedTransport::new();
    let closed = transport.closed();

    let mut link = open(transport);
    assert!(link.is_open());
    link.close().await;
    assert!(!link.is_open());
    assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    link.close().await;

    let err = link.send(&[0x7E]).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Closed));
}
