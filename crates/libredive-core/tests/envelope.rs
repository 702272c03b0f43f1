//! Wire framing properties: envelope round-trips, rejection of malformed
//! frames, and checksum behavior.

use libredive_core::error::Error;
use libredive_core::proto::{checksum, envelope, hex};

#[test]
fn test_read_request_envelope_shape() {
    // A 6-byte payload frames as '{', twelve hex characters, four checksum
    // characters and '}': 2n + 6 bytes on the wire.
    let frame = envelope::encode(&[0x00, 0x00, 0x00, 0x04, 0x00, 0x04]);
    assert_eq!(frame.len(), 18);
    assert_eq!(&frame[..13], b"{000000040004");
    assert_eq!(*frame.last().unwrap(), b'}');

    let crc_ascii = &frame[13..17];
    let crc_bytes = hex::hex2bin(crc_ascii).unwrap();
    let crc = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
    assert_eq!(crc, checksum::crc_ccitt(b"000000040004"));
}

#[test]
fn test_roundtrip() {
    let payloads: &[&[u8]] = &[
        &[],
        &[0x00],
        &[0x01, 0x00, 0x00, 0x20],
        &[0xFF; 32],
    ];
    for payload in payloads {
        let frame = envelope::encode(payload);
        assert_eq!(envelope::decode(&frame).unwrap(), *payload);
    }
}

#[test]
fn test_rejects_wrong_brackets() {
    let mut frame = envelope::encode(&[0x11, 0x22]);
    frame[0] = b'(';
    assert!(matches!(envelope::decode(&frame), Err(Error::Protocol(_))));

    let mut frame = envelope::encode(&[0x11, 0x22]);
    let last = frame.len() - 1;
    frame[last] = b']';
    assert!(matches!(envelope::decode(&frame), Err(Error::Protocol(_))));
}

#[test]
fn test_rejects_odd_length() {
    // Splice an extra hex digit into the payload.
    let frame = envelope::encode(&[0x11, 0x22]);
    let mut odd = frame.clone();
    odd.insert(1, b'0');
    assert!(matches!(envelope::decode(&odd), Err(Error::Protocol(_))));
}

#[test]
fn test_rejects_non_hex_digits() {
    let mut frame = envelope::encode(&[0x11, 0x22]);
    frame[2] = b'G';
    assert!(matches!(envelope::decode(&frame), Err(Error::Protocol(_))));
}

#[test]
fn test_rejects_crc_mismatch() {
    let mut frame = envelope::encode(&[0x11, 0x22]);
    // Corrupt a payload character without touching the stored checksum.
    frame[1] = if frame[1] == b'1' { b'2' } else { b'1' };
    assert!(matches!(envelope::decode(&frame), Err(Error::Protocol(_))));
}

#[test]
fn test_crc_incremental_stability() {
    let a = b"{1234";
    let b = b"ABCD}";
    let mut whole = a.to_vec();
    whole.extend_from_slice(b);
    assert_eq!(
        checksum::crc_ccitt_update(checksum::crc_ccitt(a), b),
        checksum::crc_ccitt(&whole)
    );
}

#[test]
fn test_crc_known_value() {
    assert_eq!(checksum::crc_ccitt(b"123456789"), 0x29B1);
}
