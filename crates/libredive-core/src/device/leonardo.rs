//! Cressi Leonardo family driver
//!
//! Serial-attached devices (Leonardo, Giotto, Newton, Drake) that frame
//! every exchange in an ASCII-hex envelope and keep their dive log in a
//! fixed memory image: a logbook array of equal-size slots plus a profile
//! ring buffer addressed by header/footer pointers stored in each slot.

use log::{error, warn};

use super::{emit, CancelToken, Device, DeviceEvent, DiveRecord, EventHandler, Progress};
use crate::error::{Error, Result};
use crate::proto::{envelope, field};
use crate::ringbuffer;
use crate::transport::{Direction, FlowControl, Parity, SerialTransport, StopBits, Transport};

/// Size of the downloadable memory image.
pub const SZ_MEMORY: usize = 32000;

pub const RB_LOGBOOK_BEGIN: usize = 0x0100;
pub const RB_LOGBOOK_END: usize = 0x1438;
pub const RB_LOGBOOK_SIZE: usize = 0x52;
pub const RB_LOGBOOK_COUNT: usize = (RB_LOGBOOK_END - RB_LOGBOOK_BEGIN) / RB_LOGBOOK_SIZE;

pub const RB_PROFILE_BEGIN: usize = 0x1438;
pub const RB_PROFILE_END: usize = SZ_MEMORY;

/// Bytes of a logbook slot identifying one dive.
pub const FINGERPRINT_SIZE: usize = 5;
const FINGERPRINT_OFFSET: usize = 8;

const MAX_RETRIES: usize = 4;
const PACKET_SIZE: usize = 32;

// Device-documented dump probe and its acknowledgement; not an envelope.
const CMD_DUMP: &[u8; 8] = b"{123DBA}";
const RSP_DUMP: &[u8; 7] = b"{!D5B3}";

/// Driver for the Leonardo family
pub struct LeonardoDevice<T: Transport = SerialTransport> {
    port: T,
    fingerprint: Option<[u8; FINGERPRINT_SIZE]>,
    events: Option<EventHandler>,
    cancel: CancelToken,
}

impl LeonardoDevice<SerialTransport> {
    /// Open the device attached to the named serial port.
    pub fn open(name: &str) -> Result<Self> {
        let port = SerialTransport::open(name)?;
        Self::from_transport(port)
    }
}

impl<T: Transport> LeonardoDevice<T> {
    /// Bring up the device on an already-open transport.
    ///
    /// Configures 115200 8N1, a 1 second read timeout, and runs the wake-up
    /// sequence: RTS high, a 200 ms DTR pulse, then a purge of both
    /// directions. On failure the transport is dropped and closed.
    pub fn from_transport(mut port: T) -> Result<Self> {
        port.configure(115200, 8, Parity::None, StopBits::One, FlowControl::None)?;
        port.set_timeout(1000)?;

        port.set_rts(true)?;
        port.set_dtr(true)?;
        port.sleep(200);
        port.set_dtr(false)?;
        port.sleep(100);
        port.purge(Direction::All)?;

        Ok(LeonardoDevice {
            port,
            fingerprint: None,
            events: None,
            cancel: CancelToken::new(),
        })
    }

    /// One command/answer exchange: write the envelope, read `asize` bytes,
    /// validate the framing and return the decoded payload.
    fn packet(&mut self, command: &[u8], asize: usize) -> Result<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Err(e) = self.port.write(command) {
            error!("failed to send the command");
            return Err(e);
        }

        let mut answer = vec![0u8; asize];
        if let Err(e) = self.port.read(&mut answer) {
            error!("failed to receive the answer");
            return Err(e);
        }

        envelope::decode(&answer)
    }

    /// [`Self::packet`] with automatic retry: a corrupted or missing answer
    /// is discarded and the command re-sent, up to [`MAX_RETRIES`] times.
    fn transfer(&mut self, command: &[u8], asize: usize) -> Result<Vec<u8>> {
        let mut nretries = 0;
        loop {
            match self.packet(command, asize) {
                Err(e) if e.is_retryable() => {
                    if nretries >= MAX_RETRIES {
                        return Err(e);
                    }
                    nretries += 1;

                    // Give the device a moment, then drop any garbage bytes
                    // before asking again.
                    self.port.sleep(100);
                    self.port.purge(Direction::Input)?;
                }
                other => return other,
            }
        }
    }

    /// Read `data.len()` bytes of device memory starting at `address`.
    pub fn read(&mut self, address: u16, data: &mut [u8]) -> Result<()> {
        let mut address = address as usize;
        let mut nbytes = 0;
        while nbytes < data.len() {
            let len = (data.len() - nbytes).min(PACKET_SIZE);

            let raw = [
                (address >> 8) as u8,
                (address & 0xFF) as u8,
                (len >> 8) as u8,
                (len & 0xFF) as u8,
            ];
            let command = envelope::encode(&raw);

            let payload = self.transfer(&command, envelope::encoded_len(len))?;
            data[nbytes..nbytes + len].copy_from_slice(&payload);

            nbytes += len;
            address += len;
        }
        Ok(())
    }

    /// Download the full memory image into `buffer`.
    pub fn dump(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.clear();
        buffer.resize(SZ_MEMORY, 0);

        let mut progress = Progress::new(SZ_MEMORY as u64);
        progress.emit(&mut self.events);

        // The dump probe is a literal exchange, not an envelope.
        if let Err(e) = self.port.write(CMD_DUMP) {
            error!("failed to send the command");
            return Err(e);
        }

        let mut header = [0u8; RSP_DUMP.len()];
        if let Err(e) = self.port.read(&mut header) {
            error!("failed to receive the answer");
            return Err(e);
        }
        if &header != RSP_DUMP {
            error!("unexpected answer to the dump request");
            return Err(Error::Protocol("unexpected dump acknowledgement".into()));
        }

        let mut nbytes = 0;
        while nbytes < SZ_MEMORY {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Read at least 1 KB per pass, more when the device has already
            // pushed more into the buffer.
            let mut len = 1024;
            if let Ok(available) = self.port.get_available() {
                if available > len {
                    len = available;
                }
            }
            if nbytes + len > SZ_MEMORY {
                len = SZ_MEMORY - nbytes;
            }

            if let Err(e) = self.port.read(&mut buffer[nbytes..nbytes + len]) {
                error!("failed to receive the answer");
                return Err(e);
            }

            progress.current += len as u64;
            progress.emit(&mut self.events);

            nbytes += len;
        }

        // The dump ends with the image checksum as four hex characters.
        let mut trailer = [0u8; 4];
        if let Err(e) = self.port.read(&mut trailer) {
            error!("failed to receive the answer");
            return Err(e);
        }

        let checksum = crate::proto::hex::hex2bin(&trailer)?;
        let received = field::u16_be(&checksum);
        let computed = crate::proto::checksum::crc_ccitt(buffer);
        if received != computed {
            error!(
                "memory dump checksum mismatch (expected {:04X}, got {:04X})",
                computed, received
            );
            return Err(Error::Protocol("memory dump checksum mismatch".into()));
        }

        Ok(())
    }

    /// Download the log and deliver each dive to `callback`, newest first.
    pub fn foreach(&mut self, callback: &mut dyn FnMut(&DiveRecord) -> bool) -> Result<()> {
        let mut buffer = Vec::with_capacity(SZ_MEMORY);
        self.dump(&mut buffer)?;

        emit(
            &mut self.events,
            DeviceEvent::DeviceInfo {
                model: buffer[0] as u32,
                firmware: 0,
                serial: field::u24_le(&buffer[1..4]),
            },
        );

        extract(
            &buffer,
            self.fingerprint.as_ref(),
            callback,
            &mut self.events,
        )
    }
}

impl<T: Transport> Device for LeonardoDevice<T> {
    fn set_fingerprint(&mut self, fingerprint: &[u8]) -> Result<()> {
        if fingerprint.is_empty() {
            self.fingerprint = None;
        } else if fingerprint.len() == FINGERPRINT_SIZE {
            let mut stored = [0u8; FINGERPRINT_SIZE];
            stored.copy_from_slice(fingerprint);
            self.fingerprint = Some(stored);
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
        LeonardoDevice::dump(self, buffer)
    }

    fn foreach(&mut self, callback: &mut dyn FnMut(&DiveRecord) -> bool) -> Result<()> {
        LeonardoDevice::foreach(self, callback)
    }

    fn close(&mut self) -> Result<()> {
        self.port.close()
    }
}

/// Decode dives out of a previously downloaded memory image.
///
/// Same walk as [`LeonardoDevice::foreach`] but without a device: no
/// fingerprint gate and no events.
pub fn extract_dives(data: &[u8], callback: &mut dyn FnMut(&DiveRecord) -> bool) -> Result<()> {
    extract(data, None, callback, &mut None)
}

fn extract(
    data: &[u8],
    fingerprint: Option<&[u8; FINGERPRINT_SIZE]>,
    callback: &mut dyn FnMut(&DiveRecord) -> bool,
    events: &mut Option<EventHandler>,
) -> Result<()> {
    if data.len() < SZ_MEMORY {
        return Err(Error::DataFormat(format!(
            "memory image too small ({} bytes)",
            data.len()
        )));
    }

    // Locate the most recent dive. The device stores a counter incremented
    // on every dive in each logbook slot; the highest value wins.
    let mut count = 0;
    let mut latest = 0;
    let mut maximum = 0u16;
    for i in 0..RB_LOGBOOK_COUNT {
        let offset = RB_LOGBOOK_BEGIN + i * RB_LOGBOOK_SIZE;
        let slot = &data[offset..offset + RB_LOGBOOK_SIZE];

        // An uninitialized slot terminates the valid prefix.
        if slot.iter().all(|&b| b == 0xFF) {
            break;
        }

        let seq = field::u16_le(slot);
        if seq == 0xFFFF {
            warn!("unexpected internal dive number found");
            break;
        }
        if seq > maximum {
            maximum = seq;
            latest = i;
        }

        count += 1;
    }

    if count == 0 {
        return Ok(());
    }

    let mut scratch = vec![0u8; RB_LOGBOOK_SIZE + (RB_PROFILE_END - RB_PROFILE_BEGIN)];
    let mut previous: Option<usize> = None;
    let mut remaining = RB_PROFILE_END - RB_PROFILE_BEGIN;

    // Walk backwards from the newest entry; the valid slots form their own
    // ring of `count` entries.
    for i in 0..count {
        let idx = (latest + count - i) % count;
        let offset = RB_LOGBOOK_BEGIN + idx * RB_LOGBOOK_SIZE;
        let slot = &data[offset..offset + RB_LOGBOOK_SIZE];

        let header = field::u16_le(&slot[2..]) as usize;
        let footer = field::u16_le(&slot[4..]) as usize;
        if header < RB_PROFILE_BEGIN
            || header + 2 > RB_PROFILE_END
            || footer < RB_PROFILE_BEGIN
            || footer + 2 > RB_PROFILE_END
        {
            error!(
                "invalid ringbuffer pointer detected (0x{:04x} 0x{:04x})",
                header, footer
            );
            return Err(Error::DataFormat("profile pointer out of range".into()));
        }

        // Adjacent profiles must be contiguous in the ring.
        if let Some(previous) = previous {
            if previous != footer + 2 {
                error!(
                    "profiles are not continuous (0x{:04x} 0x{:04x} 0x{:04x})",
                    header, footer, previous
                );
                return Err(Error::DataFormat("profiles are not contiguous".into()));
            }
        }

        // Everything at and below the fingerprinted dive was already seen.
        if let Some(fp) = fingerprint {
            if &slot[FINGERPRINT_OFFSET..FINGERPRINT_OFFSET + FINGERPRINT_SIZE] == fp.as_slice() {
                break;
            }
        }

        scratch[..RB_LOGBOOK_SIZE].copy_from_slice(slot);

        let distance = ringbuffer::distance(header, footer, RB_PROFILE_BEGIN, RB_PROFILE_END);
        if distance < 2 {
            error!(
                "profile pointers are not distinct (0x{:04x} 0x{:04x})",
                header, footer
            );
            return Err(Error::DataFormat("profile pointers are not distinct".into()));
        }

        let address = header + 2;
        let mut length = distance - 2;

        if remaining > 0 && remaining >= length + 4 {
            // The profile stores the same pointer pair; cross-check it.
            let header2 = field::u16_le(&data[footer..]) as usize;
            let footer2 = field::u16_le(&data[header..]) as usize;
            if header2 != header || footer2 != footer {
                error!(
                    "invalid ringbuffer pointer detected (0x{:04x} 0x{:04x})",
                    header2, footer2
                );
                return Err(Error::DataFormat("profile pointer cross-check failed".into()));
            }

            if address + length > RB_PROFILE_END {
                let len_a = RB_PROFILE_END - address;
                let len_b = length - len_a;
                scratch[RB_LOGBOOK_SIZE..RB_LOGBOOK_SIZE + len_a]
                    .copy_from_slice(&data[address..RB_PROFILE_END]);
                scratch[RB_LOGBOOK_SIZE + len_a..RB_LOGBOOK_SIZE + length]
                    .copy_from_slice(&data[RB_PROFILE_BEGIN..RB_PROFILE_BEGIN + len_b]);
            } else {
                scratch[RB_LOGBOOK_SIZE..RB_LOGBOOK_SIZE + length]
                    .copy_from_slice(&data[address..address + length]);
            }

            remaining -= length + 4;
        } else {
            // The older profiles have been overwritten; keep delivering the
            // logbook entries, but without sample data.
            if remaining > 0 {
                warn!("profile ring exhausted, remaining dives have no profile data");
                emit(
                    events,
                    DeviceEvent::Warning {
                        message: "profile ring exhausted, remaining dives have no profile data"
                            .into(),
                    },
                );
            }
            remaining = 0;
            length = 0;
        }

        let record = DiveRecord {
            data: &scratch[..RB_LOGBOOK_SIZE + length],
            fingerprint: &scratch[FINGERPRINT_OFFSET..FINGERPRINT_OFFSET + FINGERPRINT_SIZE],
        };
        if !callback(&record) {
            break;
        }

        previous = Some(header);
    }

    Ok(())
}
