//! Wire framing
//!
//! Everything that turns raw command bytes into what actually travels over
//! the wire: the CRC-CCITT checksum, the uppercase hex codec, the
//! brace-delimited ASCII envelope used by the stream-family devices, and
//! the integer field helpers for decoding device memory.

pub mod checksum;
pub mod envelope;
pub mod field;
pub mod hex;

pub use checksum::{crc_ccitt, crc_ccitt_update};
pub use envelope::{decode, encode, encoded_len};
pub use hex::{bin2hex, hex2bin};
