//! Packet transport
//!
//! Adapts a packet-oriented channel (BLE-GATT characteristics, USB-HID
//! reports) to the [`Transport`] trait. Data moves in frames of a fixed
//! `packet_size`: a read delivers at most one frame, and whatever part of
//! the frame does not fit the caller's buffer is discarded. Purge and
//! wired-line controls are no-ops.

use log::warn;

use super::{Direction, Transport};
use crate::error::{Error, Result};

/// Fixed-frame wrapper around a caller-supplied channel
pub struct PacketTransport<T: Transport> {
    inner: T,
    packet_size: usize,
}

impl<T: Transport> PacketTransport<T> {
    /// Wrap `inner` with packet semantics of `packet_size` bytes per frame.
    pub fn new(inner: T, packet_size: usize) -> Result<Self> {
        if packet_size == 0 {
            return Err(Error::InvalidArgs("packet size must be non-zero".into()));
        }
        Ok(PacketTransport { inner, packet_size })
    }

    /// The fixed frame size.
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Unwrap the underlying channel.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for PacketTransport<T> {
    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        if data.len() >= self.packet_size {
            return self.inner.read(&mut data[..self.packet_size]);
        }

        // Caller's buffer is smaller than a frame: deliver the head of one
        // frame and drop the rest.
        let mut frame = vec![0u8; self.packet_size];
        let n = self.inner.read(&mut frame)?;
        let take = n.min(data.len());
        data[..take].copy_from_slice(&frame[..take]);
        if n > take {
            warn!("discarding {} unread bytes of a {}-byte packet", n - take, n);
        }
        Ok(take)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let len = data.len().min(self.packet_size);
        self.inner.write(&data[..len])
    }

    fn set_timeout(&mut self, timeout_ms: i32) -> Result<()> {
        self.inner.set_timeout(timeout_ms)
    }

    fn purge(&mut self, _direction: Direction) -> Result<()> {
        Ok(())
    }

    fn get_available(&mut self) -> Result<usize> {
        self.inner.get_available()
    }

    fn sleep(&mut self, ms: u64) {
        self.inner.sleep(ms)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
