mod common;
use common::*;

use std::str::FromStr;
use std::time::Duration;

use sma_bridge::error::ProtocolError;
use sma_bridge::sma::address::BtAddress;
use sma_bridge::sma::catalog::{Category, Lri};
use sma_bridge::sma::frame::command;
use sma_bridge::sma::link::LinkSession;
use sma_bridge::sma::query::{QuerySession, UserGroup, POLL_CATEGORIES};
use sma_bridge::sma::snapshot::TelemetrySnapshot;
use sma_bridge::sma::transport::ScriptedTransport;

fn session(transport: ScriptedTransport) -> QuerySession {
    let link = LinkSession::open(
        Box::new(transport),
        Factory::local_address(),
        Factory::peer_address(),
    );
    QuerySession::new(link)
}

fn energy_response_data() -> Vec<u8> {
    let (first, last) = Category::EnergyProduction.range();
    let mut data = Factory::prologue(Category::EnergyProduction.command(), first, last);
    data.extend(Factory::energy_record(0x0026_0100, 1_700_000_000, 12_345_678));
    data.extend(Factory::energy_record(0x0026_2200, 1_700_000_000, 4_200));
    data
}

#[tokio::test]
async fn energy_category_decodes_from_a_single_frame() {
    let mut transport = ScriptedTransport::new();
    transport.push_read(Factory::response_frame(1, 0, &energy_response_data()));

    let mut session = session(transport);
    let mut snapshot = TelemetrySnapshot::new();
    let applied = session
        .request_category(Category::EnergyProduction, &mut snapshot)
        .await
        .unwrap();

    assert_eq!(applied, 2);
    assert_eq!(
        snapshot.get(Lri::MeteringTotWhOut).unwrap().as_f64(),
        Some(12_345.678)
    );
    assert_eq!(snapshot.get(Lri::MeteringDyWhOut).unwrap().as_f64(), Some(4.2));
}

#[tokio::test]
async fn response_split_across_frames_decodes_identically() {
    // Same response bytes, delivered as a continuation fragment plus the
    // closing data frame, cut at an arbitrary point mid-record.
    let payload = Factory::response_payload(1, 0, &energy_response_data());
    let cut = 21;

    let mut transport = ScriptedTransport::new();
    transport.push_read(Factory::frame(
        Factory::peer_address(),
        command::FRAGMENT,
        &payload[..cut],
    ));
    transport.push_read(Factory::frame(
        Factory::peer_address(),
        command::DATA,
        &payload[cut..],
    ));

    let mut session = session(transport);
    let mut snapshot = TelemetrySnapshot::new();
    let applied = session
        .request_category(Category::EnergyProduction, &mut snapshot)
        .await
        .unwrap();

    assert_eq!(applied, 2);
    assert_eq!(
        snapshot.get(Lri::MeteringTotWhOut).unwrap().as_f64(),
        Some(12_345.678)
    );
}

#[tokio::test]
async fn frames_from_other_senders_are_discarded() {
    let other = BtAddress::from_str("AA:BB:CC:DD:EE:FF").unwrap();

    let mut transport = ScriptedTransport::new();
    transport.push_read(Factory::frame(other, command::DATA, &[0xAA; 8]));
    transport.push_read(Factory::response_frame(1, 0, &energy_response_data()));

    let mut session = session(transport);
    let mut snapshot = TelemetrySnapshot::new();
    let applied = session
        .request_category(Category::EnergyProduction, &mut snapshot)
        .await
        .unwrap();

    assert_eq!(applied, 2);
}

#[tokio::test]
async fn rejected_category_gives_up_after_three_attempts() {
    let mut transport = ScriptedTransport::new();
    // One rejection per attempt; the packet id advances with each retry.
    for packet_id in 1..=3 {
        transport.push_read(Factory::response_frame(packet_id, 0x0017, &[]));
    }

    let mut session = session(transport);
    let mut snapshot = TelemetrySnapshot::new();
    let err = session
        .request_category(Category::EnergyProduction, &mut snapshot)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProtocolError::CategoryFetch(Category::EnergyProduction, 3)
    ));
    assert!(!err.is_fatal());
    assert!(snapshot.is_empty());
    assert!(session.is_open());
}

#[tokio::test]
async fn fetch_absorbs_an_exhausted_category_and_continues() {
    let mut transport = ScriptedTransport::new();
    // Energy production rejects every attempt; AC voltage then answers
    // normally under the next packet id.
    for packet_id in 1..=3 {
        transport.push_read(Factory::response_frame(packet_id, 0x0017, &[]));
    }
    let (first, last) = Category::SpotAcVoltage.range();
    let mut data = Factory::prologue(Category::SpotAcVoltage.command(), first, last);
    data.extend(Factory::spot_record(0x0046_4800, 1_700_000_000, 23012));
    transport.push_read(Factory::response_frame(4, 0, &data));

    let mut session = session(transport);
    let snapshot = session
        .fetch_categories(&[Category::EnergyProduction, Category::SpotAcVoltage])
        .await
        .unwrap();

    // The failed category's keys are simply absent; the later one is not.
    assert!(snapshot.get(Lri::MeteringTotWhOut).is_none());
    assert!(snapshot.get(Lri::MeteringDyWhOut).is_none());
    assert_eq!(snapshot.get(Lri::GridMsPhVphsA).unwrap().as_f64(), Some(230.12));
    assert!(session.is_open());
}

#[tokio::test]
async fn silent_link_times_out_and_closes_the_session() {
    let mut transport = ScriptedTransport::new();
    transport.push_stall();

    let link = LinkSession::open(
        Box::new(transport),
        Factory::local_address(),
        Factory::peer_address(),
    )
    .with_timeout(Duration::from_millis(50));
    let mut session = QuerySession::new(link);

    let mut snapshot = TelemetrySnapshot::new();
    let err = session
        .request_category(Category::EnergyProduction, &mut snapshot)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout(_)));
    assert!(err.is_fatal());
    assert!(!session.is_open());

    // Everything after a fatal error is refused until a fresh open.
    let err = session
        .request_category(Category::EnergyProduction, &mut snapshot)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Closed));
}

#[tokio::test]
async fn full_cycle_produces_a_snapshot_despite_empty_categories() {
    let mut transport = ScriptedTransport::new();
    transport.push_read(Factory::logon_reply(1, 0));

    // One reply per polled category, in order; only energy production
    // carries records, the rest answer with a bare prologue.
    let mut packet_id = 1;
    for &category in POLL_CATEGORIES {
        packet_id += 1;
        let data = if category == Category::EnergyProduction {
            energy_response_data()
        } else {
            let (first, last) = category.range();
            Factory::prologue(category.command(), first, last)
        };
        transport.push_read(Factory::response_frame(packet_id, 0, &data));
    }

    let mut session = session(transport);
    let snapshot = session
        .read_snapshot(UserGroup::User, "0000")
        .await
        .unwrap();

    assert_eq!(snapshot.serial, Some(Factory::device_serial()));
    assert_eq!(
        snapshot.get(Lri::MeteringTotWhOut).unwrap().as_f64(),
        Some(12_345.678)
    );
    // Categories that answered with no records simply leave no values.
    assert!(snapshot.get(Lri::GridMsHz).is_none());
}
