//! Uwatec Smart family driver
//!
//! IrDA-attached devices (Smart and Galileo series) found by enumeration:
//! the driver picks the first endpoint advertising a known model name,
//! runs a binary handshake and pulls a length-prefixed transfer buffer of
//! self-describing dive records. Incremental download is native here: the
//! device itself filters on the fingerprint timestamp sent with the bulk
//! request.

use chrono::Utc;
use log::error;

use super::{emit, CancelToken, Device, DeviceEvent, DiveRecord, EventHandler, Progress};
use crate::error::{Error, Result};
use crate::proto::field;
use crate::transport::{Discovery, Transport};

/// Bytes of a dive record identifying it for incremental downloads
/// (a little-endian device timestamp).
pub const FINGERPRINT_SIZE: usize = 4;

const CMD_MODEL: u8 = 0x10;
const CMD_SERIAL: u8 = 0x14;
const CMD_DEVTIME: u8 = 0x1A;
const CMD_HANDSHAKE1: u8 = 0x1B;
const CMD_HANDSHAKE2: u8 = 0x1C;
const CMD_LENGTH: u8 = 0xC6;
const CMD_DATA: u8 = 0xC4;

/// Every dive record starts with this marker.
const RECORD_MARKER: [u8; 4] = [0xA5, 0xA5, 0x5A, 0x5A];

/// Marker, length and timestamp; no record is shorter.
const RECORD_HEADER: usize = 12;

/// Identification bytes (model + serial + clock) plus the length reply.
const FIXED_OVERHEAD: u64 = 13;

/// Advertised names of the devices this driver speaks to.
const DEVICE_NAMES: &[&str] = &[
    "Aladin Smart Com",
    "Aladin Smart Pro",
    "Aladin Smart Tec",
    "Aladin Smart Z",
    "Uwatec Aladin",
    "UWATEC Galileo",
    "UWATEC Galileo Sol",
];

/// Whether an advertised IrDA name belongs to this family.
pub fn is_supported_name(name: &str) -> bool {
    DEVICE_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Driver for the Smart family
pub struct SmartDevice<T: Transport> {
    iostream: T,
    timestamp: u32,
    devtime: u32,
    systime: i64,
    events: Option<EventHandler>,
    cancel: CancelToken,
}

impl<T: Transport> SmartDevice<T> {
    /// Enumerate `discovery`, connect to the first endpoint with a known
    /// model name and perform the handshake.
    pub fn open<D>(discovery: &mut D) -> Result<Self>
    where
        D: Discovery<Stream = T>,
    {
        let chosen = loop {
            match discovery.next()? {
                None => {
                    error!("no dive computer found");
                    return Err(Error::NoDevice);
                }
                Some(candidate) if is_supported_name(&candidate.name) => break candidate,
                Some(_) => continue,
            }
        };

        let iostream = discovery.connect(&chosen)?;

        let mut device = SmartDevice {
            iostream,
            timestamp: 0,
            devtime: 0,
            systime: -1,
            events: None,
            cancel: CancelToken::new(),
        };
        device.handshake()?;

        Ok(device)
    }

    fn transfer(&mut self, command: &[u8], asize: usize) -> Result<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Err(e) = self.iostream.write(command) {
            error!("failed to send the command");
            return Err(e);
        }

        let mut answer = vec![0u8; asize];
        if let Err(e) = self.iostream.read(&mut answer) {
            error!("failed to receive the answer");
            return Err(e);
        }

        Ok(answer)
    }

    fn handshake(&mut self) -> Result<()> {
        let answer = self.transfer(&[CMD_HANDSHAKE1], 1)?;
        if answer[0] != 0x01 {
            error!("unexpected handshake answer byte");
            return Err(Error::Protocol("handshake rejected".into()));
        }

        let answer = self.transfer(&[CMD_HANDSHAKE2, 0x10, 0x27, 0x00, 0x00], 1)?;
        if answer[0] != 0x01 {
            error!("unexpected handshake answer byte");
            return Err(Error::Protocol("handshake rejected".into()));
        }

        Ok(())
    }

    /// The 9-byte bulk request: opcode, fingerprint timestamp, fixed tail.
    fn bulk_command(&self, op: u8) -> [u8; 9] {
        let ts = self.timestamp.to_le_bytes();
        [op, ts[0], ts[1], ts[2], ts[3], 0x10, 0x27, 0x00, 0x00]
    }

    /// Download the transfer buffer: everything newer than the fingerprint
    /// timestamp, or the whole log when no fingerprint is set.
    pub fn dump(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.clear();

        let mut progress = Progress::new(FIXED_OVERHEAD);
        progress.emit(&mut self.events);

        let model = self.transfer(&[CMD_MODEL], 1)?;
        let serial = self.transfer(&[CMD_SERIAL], 4)?;
        let devtime = self.transfer(&[CMD_DEVTIME], 4)?;

        // Clock calibration: sample the host clock at the moment the
        // device reported its own.
        self.systime = Utc::now().timestamp();
        self.devtime = field::u32_le(&devtime);

        progress.current += 9;
        progress.emit(&mut self.events);

        emit(
            &mut self.events,
            DeviceEvent::Clock {
                systime: self.systime,
                devtime: self.devtime as u64,
            },
        );
        emit(
            &mut self.events,
            DeviceEvent::DeviceInfo {
                model: model[0] as u32,
                firmware: 0,
                serial: field::u32_le(&serial),
            },
        );

        let command = self.bulk_command(CMD_LENGTH);
        let answer = self.transfer(&command, 4)?;
        let length = field::u32_le(&answer) as usize;

        progress.maximum = FIXED_OVERHEAD + if length > 0 { (length + 4) as u64 } else { 0 };
        progress.current += 4;
        progress.emit(&mut self.events);

        if length == 0 {
            return Ok(());
        }

        buffer.resize(length, 0);

        let command = self.bulk_command(CMD_DATA);
        let answer = self.transfer(&command, 4)?;
        let total = field::u32_le(&answer) as usize;

        progress.current += 4;
        progress.emit(&mut self.events);

        if total != length + 4 {
            error!("received an unexpected size ({} != {})", total, length + 4);
            return Err(Error::Protocol("unexpected transfer size".into()));
        }

        let mut nbytes = 0;
        while nbytes < length {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Read at least 32 bytes per pass, more when available.
            let mut len = 32;
            if let Ok(available) = self.iostream.get_available() {
                if available > len {
                    len = available;
                }
            }
            if nbytes + len > length {
                len = length - nbytes;
            }

            if let Err(e) = self.iostream.read(&mut buffer[nbytes..nbytes + len]) {
                error!("failed to receive the answer");
                return Err(e);
            }

            progress.current += len as u64;
            progress.emit(&mut self.events);

            nbytes += len;
        }

        Ok(())
    }

    /// Download the log and deliver each dive to `callback`, newest first.
    pub fn foreach(&mut self, callback: &mut dyn FnMut(&DiveRecord) -> bool) -> Result<()> {
        let mut buffer = Vec::new();
        self.dump(&mut buffer)?;
        extract_dives(&buffer, callback)
    }
}

impl<T: Transport> Device for SmartDevice<T> {
    fn set_fingerprint(&mut self, fingerprint: &[u8]) -> Result<()> {
        if fingerprint.is_empty() {
            self.timestamp = 0;
        } else if fingerprint.len() == FINGERPRINT_SIZE {
            self.timestamp = field::u32_le(fingerprint);
        } else {
            return Err(Error::InvalidArgs(format!(
                "fingerprint must be empty or {} bytes",
                FINGERPRINT_SIZE
            )));
        }
        Ok(())
    }

    fn set_event_handler(&mut self, handler: Option<EventHandler>) {
        self.events = handler;
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn dump(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        SmartDevice::dump(self, buffer)
    }

    fn foreach(&mut self, callback: &mut dyn FnMut(&DiveRecord) -> bool) -> Result<()> {
        SmartDevice::foreach(self, callback)
    }

    fn close(&mut self) -> Result<()> {
        self.iostream.close()
    }
}

/// Decode dives out of a transfer buffer.
///
/// Records are self-describing: each starts with the marker, followed by a
/// little-endian total length and the dive timestamp. The scan runs from
/// the tail backwards, so records come out newest first.
pub fn extract_dives(data: &[u8], callback: &mut dyn FnMut(&DiveRecord) -> bool) -> Result<()> {
    let mut previous = data.len();
    let mut current = data.len().saturating_sub(4);

    while current > 0 {
        current -= 1;
        if data[current..current + 4] != RECORD_MARKER {
            continue;
        }

        if current + 8 > data.len() {
            return Err(Error::DataFormat("truncated dive record header".into()));
        }
        let length = field::u32_le(&data[current + 4..]) as usize;
        if length < RECORD_HEADER {
            return Err(Error::DataFormat(format!(
                "dive record too short ({} bytes)",
                length
            )));
        }

        // A record may not run into the next-newer dive.
        if current + length > previous {
            return Err(Error::DataFormat("overlapping dive records".into()));
        }

        let record = DiveRecord {
            data: &data[current..current + length],
            fingerprint: &data[current + 8..current + 8 + FINGERPRINT_SIZE],
        };
        if !callback(&record) {
            return Ok(());
        }

        previous = current;
        current = current.saturating_sub(4);
    }

    Ok(())
}
