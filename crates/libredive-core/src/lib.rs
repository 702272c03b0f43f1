//! # LibreDive Core Library
//!
//! Device communication core for downloading dive logs from consumer dive
//! computers.
//!
//! This library provides:
//! - A transport abstraction over serial ports, IrDA endpoints, TCP
//!   sockets, packet channels and caller-supplied custom channels
//! - Wire framing: ASCII-hex envelopes, CRC-CCITT, field decoding
//! - Device drivers that download the on-device logbook with progress
//!   events, cooperative cancellation and fingerprint-based incremental
//!   download
//! - Ring-buffer extractors that decode a memory image into individual
//!   dive records, delivered newest first
//!
//! ## Supported devices
//!
//! - Cressi Leonardo family (serial)
//! - Uwatec Smart / Galileo family (IrDA)
//!
//! See [`descriptor`] for the full model list.
//!
//! ## Example
//!
//! ```rust,ignore
//! use libredive_core::prelude::*;
//!
//! let mut device = LeonardoDevice::open("/dev/ttyUSB0")?;
//! device.set_event_handler(Some(Box::new(|event| println!("{:?}", event))));
//! device.foreach(&mut |dive| {
//!     println!("dive: {} bytes", dive.data.len());
//!     true
//! })?;
//! ```

pub mod descriptor;
pub mod device;
pub mod error;
pub mod proto;
pub mod ringbuffer;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::descriptor::{Descriptor, Family};
    pub use crate::device::{
        CancelToken, Device, DeviceEvent, DiveRecord, LeonardoDevice, SmartDevice,
    };
    pub use crate::error::{Error, Result};
    pub use crate::transport::{
        Discovery, IrdaDeviceInfo, PacketTransport, SerialTransport, SocketTransport, Transport,
    };
}

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
