//! Transport layer
//!
//! Uniform byte-stream abstraction over the channels a dive computer may be
//! attached to: a wired serial port, an IrDA endpoint, a TCP socket, or a
//! caller-supplied channel (e.g. Bluetooth RFCOMM posing as a serial port,
//! or BLE-GATT posing as a packet link).
//!
//! Operations a transport has no concept of are no-ops that succeed, so
//! drivers can run the same open sequence against any channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

mod irda;
mod mock;
mod packet;
mod serial;
mod socket;

pub use irda::{Discovery, IrdaDeviceInfo};
pub use mock::{MockDiscovery, MockTransport};
pub use packet::PacketTransport;
pub use serial::SerialTransport;
pub use socket::SocketTransport;

/// Parity bit configuration for serial links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Stop bit configuration for serial links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

/// Flow control configuration for serial links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    Hardware,
    Software,
}

/// Buffer direction selector for [`Transport::purge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
    All,
}

/// Read-only modem line bits reported by [`Transport::get_lines`]
pub mod line {
    pub const DCD: u32 = 0x01;
    pub const CTS: u32 = 0x02;
    pub const DSR: u32 = 0x04;
    pub const RNG: u32 = 0x08;
}

/// A bidirectional byte channel to a dive computer.
///
/// Stream transports block until the requested byte count is transferred or
/// the configured timeout expires (`Error::Timeout`); any bytes received
/// before the deadline stay in the caller's buffer. Packet transports
/// deliver at most one frame per call, so `Ok(n)` with `n` less than the
/// buffer size is a complete read there.
pub trait Transport: Send {
    /// Read bytes into `data`, blocking up to the configured timeout.
    fn read(&mut self, data: &mut [u8]) -> Result<usize>;

    /// Write all of `data`, retrying transparently on partial writes.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Set the deadline for subsequent reads: negative blocks indefinitely,
    /// zero polls without blocking, positive is milliseconds per read.
    fn set_timeout(&mut self, timeout_ms: i32) -> Result<()>;

    /// Drop buffered bytes in the given direction(s).
    fn purge(&mut self, _direction: Direction) -> Result<()> {
        Ok(())
    }

    /// Number of bytes readable without blocking.
    fn get_available(&mut self) -> Result<usize> {
        Ok(0)
    }

    /// Configure line parameters. A no-op for transports without them.
    fn configure(
        &mut self,
        _baudrate: u32,
        _databits: u8,
        _parity: Parity,
        _stopbits: StopBits,
        _flowcontrol: FlowControl,
    ) -> Result<()> {
        Ok(())
    }

    /// Drive the DTR line. A no-op where not applicable.
    fn set_dtr(&mut self, _value: bool) -> Result<()> {
        Ok(())
    }

    /// Drive the RTS line. A no-op where not applicable.
    fn set_rts(&mut self, _value: bool) -> Result<()> {
        Ok(())
    }

    /// Enable half-duplex emulation. A no-op where not applicable.
    fn set_halfduplex(&mut self, _value: bool) -> Result<()> {
        Ok(())
    }

    /// Assert or clear the break condition. A no-op where not applicable.
    fn set_break(&mut self, _value: bool) -> Result<()> {
        Ok(())
    }

    /// Bitmask of currently asserted modem lines (see [`line`]), zero where
    /// not applicable.
    fn get_lines(&mut self) -> Result<u32> {
        Ok(0)
    }

    /// Yield the calling thread for at least `ms` milliseconds.
    fn sleep(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    /// Release the underlying channel. Idempotent; dropping the transport
    /// has the same effect.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// A boxed transport is itself a transport, so callers can hand drivers any
// channel implementation without naming its concrete type.
impl Transport for Box<dyn Transport> {
    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        (**self).read(data)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn set_timeout(&mut self, timeout_ms: i32) -> Result<()> {
        (**self).set_timeout(timeout_ms)
    }

    fn purge(&mut self, direction: Direction) -> Result<()> {
        (**self).purge(direction)
    }

    fn get_available(&mut self) -> Result<usize> {
        (**self).get_available()
    }

    fn configure(
        &mut self,
        baudrate: u32,
        databits: u8,
        parity: Parity,
        stopbits: StopBits,
        flowcontrol: FlowControl,
    ) -> Result<()> {
        (**self).configure(baudrate, databits, parity, stopbits, flowcontrol)
    }

    fn set_dtr(&mut self, value: bool) -> Result<()> {
        (**self).set_dtr(value)
    }

    fn set_rts(&mut self, value: bool) -> Result<()> {
        (**self).set_rts(value)
    }

    fn set_halfduplex(&mut self, value: bool) -> Result<()> {
        (**self).set_halfduplex(value)
    }

    fn set_break(&mut self, value: bool) -> Result<()> {
        (**self).set_break(value)
    }

    fn get_lines(&mut self) -> Result<u32> {
        (**self).get_lines()
    }

    fn sleep(&mut self, ms: u64) {
        (**self).sleep(ms)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
