//! ASCII-hex envelope
//!
//! Stream-family devices frame every payload as
//!
//! ```text
//! '{' | hex(payload) | hex(crc_hi) hex(crc_lo) | '}'
//! ```
//!
//! where the CRC-CCITT is computed over the ASCII hex of the payload (not
//! the raw bytes) and serialized big-endian as four more hex characters.
//! An `n`-byte payload therefore occupies `2n + 6` bytes on the wire.

use crate::error::{Error, Result};
use crate::proto::{checksum, hex};

const HEADER: u8 = b'{';
const TRAILER: u8 = b'}';

/// Bytes of framing around the hex payload: braces plus four CRC characters.
pub const OVERHEAD: usize = 6;

/// On-wire size of an envelope carrying `payload_len` raw bytes.
pub fn encoded_len(payload_len: usize) -> usize {
    2 * payload_len + OVERHEAD
}

/// Wrap a raw payload in an ASCII-hex envelope.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let ascii = hex::bin2hex(payload);
    let crc = checksum::crc_ccitt(&ascii);

    let mut frame = Vec::with_capacity(encoded_len(payload.len()));
    frame.push(HEADER);
    frame.extend_from_slice(&ascii);
    frame.extend_from_slice(&hex::bin2hex(&crc.to_be_bytes()));
    frame.push(TRAILER);
    frame
}

/// Parse an envelope and return the raw payload.
///
/// Rejects missing braces, truncated frames, non-hex characters and CRC
/// mismatches, all as protocol violations.
pub fn decode(frame: &[u8]) -> Result<Vec<u8>> {
    if frame.len() < OVERHEAD {
        return Err(Error::Protocol(format!(
            "envelope too short ({} bytes)",
            frame.len()
        )));
    }
    if frame[0] != HEADER || frame[frame.len() - 1] != TRAILER {
        return Err(Error::Protocol("unexpected envelope header/trailer".into()));
    }

    let inner = &frame[1..frame.len() - 1];
    let (ascii, crc_ascii) = inner.split_at(inner.len() - 4);

    let crc_bytes = hex::hex2bin(crc_ascii)?;
    let crc = crate::proto::field::u16_be(&crc_bytes);
    let computed = checksum::crc_ccitt(ascii);
    if crc != computed {
        return Err(Error::Protocol(format!(
            "envelope checksum mismatch (expected {:04X}, got {:04X})",
            computed, crc
        )));
    }

    hex::hex2bin(ascii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 6);
        assert_eq!(encoded_len(4), 14);
        assert_eq!(encoded_len(32), 70);
    }

    #[test]
    fn test_encode_shape() {
        let frame = encode(&[0x00, 0x00, 0x00, 0x04, 0x00, 0x04]);
        assert_eq!(frame.len(), encoded_len(6));
        assert_eq!(&frame[..13], b"{000000040004");
        assert_eq!(frame[frame.len() - 1], b'}');
        // Four uppercase hex characters of checksum before the trailer.
        assert!(frame[13..17]
            .iter()
            .all(|c| c.is_ascii_digit() || (b'A'..=b'F').contains(c)));
    }

    #[test]
    fn test_roundtrip() {
        for payload in [&[][..], &[0x42][..], &[0x00, 0xFF, 0x10, 0x27][..]] {
            assert_eq!(decode(&encode(payload)).unwrap(), payload);
        }
    }

    #[test]
    fn test_rejects_bad_brackets() {
        let mut frame = encode(&[0x01, 0x02]);
        frame[0] = b'[';
        assert!(matches!(decode(&frame), Err(Error::Protocol(_))));

        let mut frame = encode(&[0x01, 0x02]);
        let last = frame.len() - 1;
        frame[last] = b')';
        assert!(matches!(decode(&frame), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_rejects_non_hex_payload() {
        let mut frame = encode(&[0x01, 0x02]);
        frame[1] = b'!';
        assert!(matches!(decode(&frame), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_rejects_corrupted_checksum() {
        let mut frame = encode(&[0x01, 0x02]);
        let pos = frame.len() - 2;
        frame[pos] = if frame[pos] == b'0' { b'1' } else { b'0' };
        assert!(matches!(decode(&frame), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_rejects_truncated_frame() {
        assert!(matches!(decode(b"{123"), Err(Error::Protocol(_))));
        assert!(matches!(decode(b""), Err(Error::Protocol(_))));
    }
}
