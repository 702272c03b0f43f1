//! IrDA discovery
//!
//! Infrared devices are found by enumeration rather than by name: the
//! stack reports nearby endpoints and the driver picks the one whose
//! advertised name it recognizes. The OS binding lives outside this crate;
//! drivers consume the [`Discovery`] trait and work against any
//! implementation of it, including scripted ones in tests.

use serde::{Deserialize, Serialize};

use super::Transport;
use crate::error::Result;

/// A discovered IrDA endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrdaDeviceInfo {
    /// Stack-assigned endpoint address
    pub address: u32,
    /// Advertised device name
    pub name: String,
}

/// Enumeration and connection over an IrDA-like discovery mechanism.
pub trait Discovery {
    /// The transport produced by a successful connection.
    type Stream: Transport;

    /// Next discovered endpoint, or `None` when enumeration is exhausted.
    fn next(&mut self) -> Result<Option<IrdaDeviceInfo>>;

    /// Open a connection to a previously discovered endpoint.
    fn connect(&mut self, device: &IrdaDeviceInfo) -> Result<Self::Stream>;
}
