//! Integer field helpers
//!
//! Device memory stores multi-byte values little-endian except where a
//! protocol says otherwise; these wrappers keep the call sites readable.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Read a little-endian u16 from the start of `data`.
pub fn u16_le(data: &[u8]) -> u16 {
    LittleEndian::read_u16(data)
}

/// Read a little-endian 24-bit value from the start of `data`.
pub fn u24_le(data: &[u8]) -> u32 {
    LittleEndian::read_u24(data)
}

/// Read a little-endian u32 from the start of `data`.
pub fn u32_le(data: &[u8]) -> u32 {
    LittleEndian::read_u32(data)
}

/// Read a big-endian u16 from the start of `data`.
pub fn u16_be(data: &[u8]) -> u16 {
    BigEndian::read_u16(data)
}
