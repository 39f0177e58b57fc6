//! End-to-end session tests over a scripted transport.

use elliptec_bus::transport::{MockTransport, Transport, DEFAULT_BUS_TIMEOUT};
use elliptec_bus::{BusError, BusSession, SessionConfig};
use elliptec_protocol::{BusAddress, MotorDirection, ProtocolError};

fn addr(id: u8) -> BusAddress {
    BusAddress::new(id).unwrap()
}

/// Identity reply for an ELL14 rotation mount: 360 degrees travel,
/// 143360 pulses per revolution.
fn ell14(address: char, serial: &str) -> String {
    format!("{address}IN0E{serial}20231701016800023000")
}

/// Identity reply for an ELL3 paddle polarization controller.
fn ell3(address: char) -> String {
    format!("{address}IN03123456782021170100A000000000")
}

fn quiet_config(ids: &[u8]) -> SessionConfig {
    SessionConfig {
        motor_ids: ids.to_vec(),
        home_on_open: false,
        frequency_search_on_open: false,
        ..SessionConfig::default()
    }
}

/// One ELL14 at address 0, no homing or frequency search.
fn open_single_ell14() -> BusSession<MockTransport> {
    let mut link = MockTransport::new();
    link.push_reply(ell14('0', "11400516"));
    link.push_reply("0PO00000000");
    BusSession::open(link, quiet_config(&[0])).unwrap()
}

#[test]
fn discovery_registers_devices_and_restores_timeout() {
    let mut link = MockTransport::new();
    link.push_reply(ell14('0', "11400516"));
    link.push_reply("0PO00000000");
    link.push_reply(ell14('1', "11400517"));
    link.push_reply("1PO00000000");

    let bus = BusSession::open(link, quiet_config(&[1, 0, 1])).unwrap();

    assert_eq!(bus.registry().len(), 2);
    assert_eq!(bus.addresses(), &[addr(0), addr(1)]);
    assert_eq!(bus.transport().writes(), &["0in", "0gp", "1in", "1gp"]);
    assert_eq!(bus.transport().timeout(), Some(DEFAULT_BUS_TIMEOUT));
    // Discovery seeds the position cache for calibrated stages.
    assert_eq!(bus.registry().last_position(addr(0)), Some(0.0));
}

#[test]
fn discovery_skips_silent_addresses() {
    let mut link = MockTransport::new();
    link.push_reply(ell14('0', "11400516"));
    link.push_reply("0PO00000000");
    // Nothing scripted for address 1: it times out and is skipped.

    let bus = BusSession::open(link, quiet_config(&[0, 1])).unwrap();

    assert_eq!(bus.registry().len(), 1);
    assert!(bus.registry().lookup(addr(1)).is_none());
}

#[test]
fn discovery_searches_frequencies_and_homes() {
    let mut link = MockTransport::new();
    link.push_reply(ell14('0', "11400516"));
    for _ in 0..4 {
        // s1, us, s2, us
        link.push_reply("0GS00");
    }
    link.push_reply("0PO00000000"); // ho0
    link.push_reply("0PO00000000"); // gp

    let config = SessionConfig {
        motor_ids: vec![0],
        ..SessionConfig::default()
    };
    let bus = BusSession::open(link, config).unwrap();

    assert_eq!(
        bus.transport().writes(),
        &["0in", "0s1", "0us", "0s2", "0us", "0ho0", "0gp"]
    );
}

#[test]
fn move_absolute_converges_on_first_attempt() {
    let mut bus = open_single_ell14();
    // 0x4600 steps = 17920 = exactly 45 degrees at 143360 pulses/rev.
    bus.transport_mut().push_reply("0PO00004600");

    let outcome = bus.move_absolute(addr(0), 45.0).unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.reached, Some(45.0));
    assert_eq!(bus.transport().writes().last().unwrap(), "0ma00004600");
    assert_eq!(bus.registry().last_position(addr(0)), Some(45.0));
}

#[test]
fn move_absolute_gives_up_after_bounded_retries() {
    let mut bus = open_single_ell14();
    // Every reply lands 0x100 steps (about 0.64 degrees) short of target.
    for _ in 0..5 {
        bus.transport_mut().push_reply("0PO00004500");
    }

    let writes_before = bus.transport().writes().len();
    let outcome = bus.move_absolute(addr(0), 45.0).unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.attempts, 5);
    let reached = outcome.reached.unwrap();
    assert!((reached - 44.35).abs() < 0.01, "reached {reached}");
    assert_eq!(bus.transport().writes().len(), writes_before + 5);
    assert_eq!(bus.transport().pending_replies(), 0);
}

#[test]
fn move_relative_verifies_against_prior_position() {
    let mut bus = open_single_ell14();
    bus.transport_mut().push_reply("0PO00000000"); // gp before the move
    bus.transport_mut().push_reply("0PO00000F8E"); // 3982 steps, 9.9994 deg

    let outcome = bus.move_relative(addr(0), 10.0).unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.target, 10.0);
    let writes = bus.transport().writes();
    assert_eq!(&writes[writes.len() - 2..], &["0gp", "0mr00000F8E"]);
}

#[test]
fn out_of_range_velocity_is_rejected_before_any_write() {
    let mut bus = open_single_ell14();
    let writes_before = bus.transport().writes().len();

    let err = bus.set_velocity(addr(0), 150).unwrap_err();

    assert!(matches!(
        err,
        BusError::Protocol(ProtocolError::InvalidArgument(_))
    ));
    assert_eq!(bus.transport().writes().len(), writes_before);
}

#[test]
fn nonzero_status_reply_is_a_device_error() {
    let mut bus = open_single_ell14();
    bus.transport_mut().push_reply("0GS09"); // busy

    let err = bus
        .home(addr(0), elliptec_protocol::HomeDirection::Clockwise)
        .unwrap_err();

    match err {
        BusError::Device { address, status } => {
            assert_eq!(address, addr(0));
            assert_eq!(status.code(), 9);
        }
        other => panic!("expected a device error, got {other:?}"),
    }
}

#[test]
fn get_status_reports_nonzero_codes_without_erroring() {
    let mut bus = open_single_ell14();
    bus.transport_mut().push_reply("0GS0A");

    let status = bus.get_status(addr(0)).unwrap();

    assert_eq!(status.code(), 10);
    assert!(!status.is_ok());
}

#[test]
fn change_address_persists_and_renames() {
    let mut bus = open_single_ell14();
    bus.transport_mut().push_reply("0GS00"); // ca ack at the old address
    bus.transport_mut().push_reply("1GS00"); // us ack at the new one

    bus.change_address(addr(0), addr(1)).unwrap();

    let writes = bus.transport().writes();
    assert_eq!(&writes[writes.len() - 2..], &["0ca1", "1us"]);
    assert!(bus.registry().lookup(addr(0)).is_none());
    assert!(bus.registry().lookup(addr(1)).is_some());
    assert_eq!(bus.addresses(), &[addr(1)]);
}

#[test]
fn change_address_rejects_an_address_already_in_use() {
    let mut link = MockTransport::new();
    link.push_reply(ell14('0', "11400516"));
    link.push_reply("0PO00000000");
    link.push_reply(ell14('1', "11400517"));
    link.push_reply("1PO00000000");
    let mut bus = BusSession::open(link, quiet_config(&[0, 1])).unwrap();
    let writes_before = bus.transport().writes().len();

    let err = bus.change_address(addr(0), addr(1)).unwrap_err();

    assert!(matches!(err, BusError::AddressInUse(a) if a == addr(1)));
    assert_eq!(bus.transport().writes().len(), writes_before);
    assert!(bus.registry().lookup(addr(0)).is_some());
}

#[test]
fn optimize_restores_the_deadline_after_success() {
    let mut bus = open_single_ell14();
    bus.transport_mut().push_reply("0GS00");

    bus.optimize_motors(addr(0)).unwrap();

    assert_eq!(bus.transport().writes().last().unwrap(), "0om");
    assert_eq!(bus.transport().timeout(), Some(DEFAULT_BUS_TIMEOUT));
}

#[test]
fn optimize_restores_the_deadline_after_a_failure() {
    let mut bus = open_single_ell14();
    // No reply scripted: the read fails while the deadline is disabled.

    let err = bus.optimize_motors(addr(0)).unwrap_err();

    assert!(matches!(err, BusError::CommTimeout));
    assert_eq!(bus.transport().timeout(), Some(DEFAULT_BUS_TIMEOUT));
}

#[test]
fn isolate_writes_without_expecting_a_reply() {
    let mut bus = open_single_ell14();
    let pending_before = bus.transport().pending_replies();

    bus.isolate(addr(0), 10).unwrap();

    assert_eq!(bus.transport().writes().last().unwrap(), "0is0A");
    assert_eq!(bus.transport().pending_replies(), pending_before);
}

#[test]
fn paddle_moves_convert_through_the_fixed_scale() {
    let mut link = MockTransport::new();
    link.push_reply(ell3('2'));
    let mut bus = BusSession::open(link, quiet_config(&[2])).unwrap();

    // 33 degrees at 0.33 deg/step is 100 steps.
    bus.transport_mut().push_reply("2P10064");
    let degrees = bus.paddle_move_absolute(addr(2), 1, 33.0).unwrap();
    assert!((degrees - 33.0).abs() < 1e-9);
    assert_eq!(bus.transport().writes().last().unwrap(), "2a10064");

    bus.transport_mut().push_reply("2P20032");
    let degrees = bus
        .paddle_drive_time(addr(2), 2, 500, MotorDirection::Forward)
        .unwrap();
    assert!((degrees - 16.5).abs() < 1e-9);
    assert_eq!(bus.transport().writes().last().unwrap(), "2t201F4");
}

#[test]
fn paddle_commands_require_a_paddle_device() {
    let mut bus = open_single_ell14();
    let writes_before = bus.transport().writes().len();

    let err = bus.paddle_move_absolute(addr(0), 1, 10.0).unwrap_err();

    assert!(matches!(
        err,
        BusError::Protocol(ProtocolError::UnsupportedOperation(_))
    ));
    assert_eq!(bus.transport().writes().len(), writes_before);
}

#[test]
fn commands_to_unknown_devices_fail_fast() {
    let mut bus = open_single_ell14();

    let err = bus.move_absolute(addr(7), 1.0).unwrap_err();

    assert!(matches!(err, BusError::DeviceNotFound(a) if a == addr(7)));
}
