//! Device drivers
//!
//! A driver owns a transport, knows one family's wire protocol, and turns
//! "download the dive log" into transport reads and writes. All drivers
//! expose the same surface: an incremental-download fingerprint, an event
//! sink for progress and identification, cooperative cancellation, and
//! `foreach` to walk the downloaded log newest-first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod leonardo;
pub mod smart;

pub use leonardo::LeonardoDevice;
pub use smart::SmartDevice;

/// Notifications emitted while a download runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// Byte counters for the running download. `maximum` may be refined
    /// upward once, after the device announces the payload length.
    Progress { current: u64, maximum: u64 },

    /// Device identification, emitted exactly once per download.
    DeviceInfo {
        model: u32,
        firmware: u32,
        serial: u32,
    },

    /// Host wall-clock and device clock sampled at the same moment,
    /// emitted at most once per download.
    Clock { systime: i64, devtime: u64 },

    /// A recoverable oddity worth surfacing to the user.
    Warning { message: String },
}

/// Callback receiving [`DeviceEvent`] notifications
pub type EventHandler = Box<dyn FnMut(&DeviceEvent) + Send>;

/// One dive as delivered to the consumer callback.
///
/// Both slices borrow from a buffer the driver reuses between dives;
/// consumers must copy what they want to keep before returning.
#[derive(Debug)]
pub struct DiveRecord<'a> {
    /// Logbook entry followed by the profile samples
    pub data: &'a [u8],
    /// The slice of `data` identifying this dive for incremental downloads
    pub fingerprint: &'a [u8],
}

/// Cooperative cancellation flag shared with a driver.
///
/// Raising the flag makes the driver fail with `Error::Cancelled` at its
/// next transfer boundary; an in-flight transport operation is not
/// interrupted.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Common driver surface shared by all device families.
pub trait Device {
    /// Set (or clear, with an empty slice) the fingerprint of the most
    /// recent previously downloaded dive; only newer dives are delivered.
    fn set_fingerprint(&mut self, fingerprint: &[u8]) -> Result<()>;

    /// Install or remove the event sink.
    fn set_event_handler(&mut self, handler: Option<EventHandler>);

    /// A handle that cancels this driver's running operation.
    fn cancel_token(&self) -> CancelToken;

    /// Download the raw device memory or transfer buffer.
    fn dump(&mut self, buffer: &mut Vec<u8>) -> Result<()>;

    /// Download the log and hand each dive to `callback`, newest first.
    /// Returning `false` from the callback stops the walk successfully.
    fn foreach(&mut self, callback: &mut dyn FnMut(&DiveRecord) -> bool) -> Result<()>;

    /// Release the transport. Dropping the driver has the same effect.
    fn close(&mut self) -> Result<()>;
}

/// Send one event to an optional sink.
pub(crate) fn emit(handler: &mut Option<EventHandler>, event: DeviceEvent) {
    if let Some(handler) = handler {
        handler(&event);
    }
}

/// Byte counters behind the progress events of one `dump`.
pub(crate) struct Progress {
    pub current: u64,
    pub maximum: u64,
}

impl Progress {
    pub fn new(maximum: u64) -> Self {
        Progress {
            current: 0,
            maximum,
        }
    }

    pub fn emit(&self, handler: &mut Option<EventHandler>) {
        emit(
            handler,
            DeviceEvent::Progress {
                current: self.current,
                maximum: self.maximum,
            },
        );
    }
}
