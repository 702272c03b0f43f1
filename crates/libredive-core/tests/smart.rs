//! Enumeration-family driver tests: IrDA discovery and name filtering,
//! the binary handshake, fingerprint-gated bulk transfer and the
//! self-describing record extractor.

use std::sync::{Arc, Mutex};

use libredive_core::device::smart::{self, SmartDevice};
use libredive_core::device::{Device, DeviceEvent};
use libredive_core::error::Error;
use libredive_core::transport::{IrdaDeviceInfo, MockDiscovery, MockTransport};

fn endpoint(address: u32, name: &str) -> IrdaDeviceInfo {
    IrdaDeviceInfo {
        address,
        name: name.to_string(),
    }
}

/// Script the two-stage handshake acknowledgements.
fn queue_handshake(mock: &MockTransport) {
    mock.push_response(&[0x01]);
    mock.push_response(&[0x01]);
}

/// Script the identification exchange: model, serial, device clock.
fn queue_identification(mock: &MockTransport, model: u8, serial: u32, devtime: u32) {
    mock.push_response(&[model]);
    mock.push_response(&serial.to_le_bytes());
    mock.push_response(&devtime.to_le_bytes());
}

/// One self-describing dive record: marker, total length, timestamp,
/// padding up to `length` bytes.
fn record(timestamp: u32, length: usize) -> Vec<u8> {
    assert!(length >= 12);
    let mut out = vec![0xA5, 0xA5, 0x5A, 0x5A];
    out.extend_from_slice(&(length as u32).to_le_bytes());
    out.extend_from_slice(&timestamp.to_le_bytes());
    out.resize(length, 0x42);
    out
}

fn record_events(device: &mut SmartDevice<MockTransport>) -> Arc<Mutex<Vec<DeviceEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    device.set_event_handler(Some(Box::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    })));
    events
}

#[test]
fn test_open_filters_by_advertised_name() {
    let mock = MockTransport::new();
    queue_handshake(&mock);

    let mut discovery = MockDiscovery::new(
        vec![
            endpoint(1, "Some Phone"),
            endpoint(2, "Aladin Smart Com"),
            endpoint(3, "UWATEC Galileo"),
        ],
        mock.clone(),
    );

    let _device = SmartDevice::open(&mut discovery).unwrap();

    // The first recognized endpoint won; the later one was never reached.
    assert_eq!(discovery.connected().unwrap().address, 2);

    // Both handshake stages went out verbatim.
    assert_eq!(mock.written(), vec![0x1B, 0x1C, 0x10, 0x27, 0x00, 0x00]);
}

#[test]
fn test_open_without_match_reports_no_device() {
    let mut discovery = MockDiscovery::new(
        vec![endpoint(1, "Some Phone"), endpoint(2, "Aladin Smart")],
        MockTransport::new(),
    );
    assert!(matches!(
        SmartDevice::open(&mut discovery),
        Err(Error::NoDevice)
    ));
}

#[test]
fn test_open_rejects_bad_handshake() {
    let mock = MockTransport::new();
    mock.push_response(&[0x00]);

    let mut discovery = MockDiscovery::new(vec![endpoint(2, "Aladin Smart Z")], mock);
    assert!(matches!(
        SmartDevice::open(&mut discovery),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn test_empty_log_download() {
    let mock = MockTransport::new();
    queue_handshake(&mock);
    queue_identification(&mock, 0x18, 0x12345678, 1000);
    mock.push_response(&[0x00, 0x00, 0x00, 0x00]); // no new data

    let mut discovery = MockDiscovery::new(vec![endpoint(2, "Aladin Smart Tec")], mock.clone());
    let mut device = SmartDevice::open(&mut discovery).unwrap();
    let events = record_events(&mut device);
    mock.clear_written();

    let mut ndives = 0;
    device
        .foreach(&mut |_| {
            ndives += 1;
            true
        })
        .unwrap();
    assert_eq!(ndives, 0);

    // Identification queries and the length probe with a zero fingerprint.
    assert_eq!(
        mock.written(),
        vec![0x10, 0x14, 0x1A, 0xC6, 0x00, 0x00, 0x00, 0x00, 0x10, 0x27, 0x00, 0x00]
    );

    let events = events.lock().unwrap();
    let devinfo: Vec<&DeviceEvent> = events
        .iter()
        .filter(|e| matches!(e, DeviceEvent::DeviceInfo { .. }))
        .collect();
    assert_eq!(
        devinfo,
        vec![&DeviceEvent::DeviceInfo {
            model: 0x18,
            firmware: 0,
            serial: 0x12345678,
        }]
    );

    let clocks: Vec<&DeviceEvent> = events
        .iter()
        .filter(|e| matches!(e, DeviceEvent::Clock { .. }))
        .collect();
    assert_eq!(clocks.len(), 1);
    assert!(matches!(clocks[0], DeviceEvent::Clock { devtime: 1000, .. }));
}

#[test]
fn test_full_download_delivers_newest_first() {
    let older = record(100, 20);
    let newer = record(200, 24);
    let mut payload = older.clone();
    payload.extend_from_slice(&newer);
    let length = payload.len() as u32;

    let mock = MockTransport::new();
    queue_handshake(&mock);
    queue_identification(&mock, 0x11, 7, 5000);
    mock.push_response(&length.to_le_bytes()); // length probe
    mock.push_response(&(length + 4).to_le_bytes()); // data announcement
    mock.push_response(&payload);

    let mut discovery = MockDiscovery::new(vec![endpoint(9, "UWATEC Galileo Sol")], mock.clone());
    let mut device = SmartDevice::open(&mut discovery).unwrap();
    let events = record_events(&mut device);

    let mut timestamps = Vec::new();
    device
        .foreach(&mut |dive| {
            timestamps.push(u32::from_le_bytes(dive.fingerprint.try_into().unwrap()));
            true
        })
        .unwrap();

    // The buffer is scanned from the tail: records come out newest first.
    assert_eq!(timestamps, vec![200, 100]);

    // Progress settles at the refined maximum.
    let events = events.lock().unwrap();
    let mut last = (0, 0);
    for event in events.iter() {
        if let DeviceEvent::Progress { current, maximum } = event {
            assert!(*current >= last.0);
            assert!(*current <= *maximum);
            last = (*current, *maximum);
        }
    }
    assert_eq!(last.1, 13 + (length as u64) + 4);
    assert_eq!(last.0, last.1);
}

#[test]
fn test_fingerprint_is_sent_with_bulk_request() {
    let mock = MockTransport::new();
    queue_handshake(&mock);
    queue_identification(&mock, 0x11, 7, 5000);
    mock.push_response(&[0x00, 0x00, 0x00, 0x00]);

    let mut discovery = MockDiscovery::new(vec![endpoint(9, "UWATEC Galileo")], mock.clone());
    let mut device = SmartDevice::open(&mut discovery).unwrap();
    device.set_fingerprint(&[0x78, 0x56, 0x34, 0x12]).unwrap();
    mock.clear_written();

    let mut buffer = Vec::new();
    device.dump(&mut buffer).unwrap();
    assert!(buffer.is_empty());

    // The stored timestamp rides in the length probe.
    let written = mock.written();
    let probe = &written[written.len() - 9..];
    assert_eq!(probe, &[0xC6, 0x78, 0x56, 0x34, 0x12, 0x10, 0x27, 0x00, 0x00]);
}

#[test]
fn test_fingerprint_length_validation() {
    let mock = MockTransport::new();
    queue_handshake(&mock);
    let mut discovery = MockDiscovery::new(vec![endpoint(2, "Aladin Smart Pro")], mock);
    let mut device = SmartDevice::open(&mut discovery).unwrap();

    assert!(device.set_fingerprint(&[1, 2, 3, 4]).is_ok());
    assert!(device.set_fingerprint(&[]).is_ok());
    assert!(matches!(
        device.set_fingerprint(&[1, 2]),
        Err(Error::InvalidArgs(_))
    ));
}

#[test]
fn test_dump_rejects_unexpected_total() {
    let mock = MockTransport::new();
    queue_handshake(&mock);
    queue_identification(&mock, 0x11, 7, 5000);
    mock.push_response(&40u32.to_le_bytes());
    mock.push_response(&40u32.to_le_bytes()); // should be length + 4

    let mut discovery = MockDiscovery::new(vec![endpoint(9, "UWATEC Galileo")], mock);
    let mut device = SmartDevice::open(&mut discovery).unwrap();

    let mut buffer = Vec::new();
    assert!(matches!(device.dump(&mut buffer), Err(Error::Protocol(_))));
}

#[test]
fn test_cancellation_short_circuits_dump() {
    let mock = MockTransport::new();
    queue_handshake(&mock);

    let mut discovery = MockDiscovery::new(vec![endpoint(9, "Uwatec Aladin")], mock.clone());
    let mut device = SmartDevice::open(&mut discovery).unwrap();
    mock.clear_written();

    device.cancel_token().cancel();

    let mut buffer = Vec::new();
    assert!(matches!(device.dump(&mut buffer), Err(Error::Cancelled)));
    assert!(mock.written().is_empty());
}

#[test]
fn test_extract_rejects_overlapping_records() {
    // The older record claims a length that runs into the newer one.
    let mut data = record(100, 20);
    data[4..8].copy_from_slice(&48u32.to_le_bytes());
    data.extend_from_slice(&record(200, 24));

    let result = smart::extract_dives(&data, &mut |_| true);
    assert!(matches!(result, Err(Error::DataFormat(_))));
}

#[test]
fn test_extract_consumer_stop() {
    let mut data = record(100, 20);
    data.extend_from_slice(&record(200, 24));

    let mut ndives = 0;
    smart::extract_dives(&data, &mut |_| {
        ndives += 1;
        false
    })
    .unwrap();
    assert_eq!(ndives, 1);
}
