//! Mock transport for testing
//!
//! A scripted in-memory channel: tests queue the frames (or failures) the
//! device would answer with, run a driver against it, and inspect what was
//! written, how many reads happened and how long the driver slept. Clones
//! share state, so a test can keep a handle while a driver owns the
//! transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{Direction, Discovery, IrdaDeviceInfo, Transport};
use crate::error::{Error, Result};

enum Scripted {
    Data(Vec<u8>),
    Fail(Error),
}

#[derive(Default)]
struct Inner {
    script: VecDeque<Scripted>,
    staging: VecDeque<u8>,
    written: Vec<u8>,
    write_error: Option<Error>,
    reads: usize,
    input_purges: usize,
    slept_ms: u64,
    timeout_ms: i32,
}

/// Scripted transport for unit and integration tests
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent reads.
    pub fn push_response(&self, data: &[u8]) {
        let mut inner = self.lock();
        inner.script.push_back(Scripted::Data(data.to_vec()));
    }

    /// Queue a failure to be returned by the read that reaches it.
    pub fn push_read_error(&self, error: Error) {
        let mut inner = self.lock();
        inner.script.push_back(Scripted::Fail(error));
    }

    /// Make the next write fail with `error`.
    pub fn push_write_error(&self, error: Error) {
        self.lock().write_error = Some(error);
    }

    /// All bytes written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    /// Number of read calls issued.
    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    /// Number of input purges issued.
    pub fn input_purges(&self) -> usize {
        self.lock().input_purges
    }

    /// Total milliseconds of requested sleep (not actually slept).
    pub fn slept_ms(&self) -> u64 {
        self.lock().slept_ms
    }

    /// Last timeout passed to `set_timeout`.
    pub fn timeout_ms(&self) -> i32 {
        self.lock().timeout_ms
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for MockTransport {
    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        inner.reads += 1;

        let mut nbytes = 0;
        while nbytes < data.len() {
            if let Some(byte) = inner.staging.pop_front() {
                data[nbytes] = byte;
                nbytes += 1;
                continue;
            }
            match inner.script.pop_front() {
                Some(Scripted::Data(bytes)) => inner.staging.extend(bytes),
                Some(Scripted::Fail(e)) => return Err(e),
                None => break,
            }
        }

        if nbytes != data.len() {
            return Err(Error::Timeout);
        }
        Ok(nbytes)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.lock();
        if let Some(e) = inner.write_error.take() {
            return Err(e);
        }
        inner.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn set_timeout(&mut self, timeout_ms: i32) -> Result<()> {
        self.lock().timeout_ms = timeout_ms;
        Ok(())
    }

    fn purge(&mut self, direction: Direction) -> Result<()> {
        let mut inner = self.lock();
        if matches!(direction, Direction::Input | Direction::All) {
            // Drop received-but-unread bytes; the remaining script entries
            // model answers the device has not sent yet.
            inner.staging.clear();
            inner.input_purges += 1;
        }
        Ok(())
    }

    fn get_available(&mut self) -> Result<usize> {
        let inner = self.lock();
        let queued: usize = inner
            .script
            .iter()
            .map_while(|item| match item {
                Scripted::Data(bytes) => Some(bytes.len()),
                Scripted::Fail(_) => None,
            })
            .sum();
        Ok(inner.staging.len() + queued)
    }

    fn sleep(&mut self, ms: u64) {
        self.lock().slept_ms += ms;
    }
}

/// Scripted IrDA discovery over a [`MockTransport`]
pub struct MockDiscovery {
    devices: Vec<IrdaDeviceInfo>,
    index: usize,
    transport: MockTransport,
    connected: Option<IrdaDeviceInfo>,
}

impl MockDiscovery {
    /// Discovery that reports `devices` in order and hands out `transport`
    /// on connect.
    pub fn new(devices: Vec<IrdaDeviceInfo>, transport: MockTransport) -> Self {
        MockDiscovery {
            devices,
            index: 0,
            transport,
            connected: None,
        }
    }

    /// The endpoint a driver connected to, if any.
    pub fn connected(&self) -> Option<&IrdaDeviceInfo> {
        self.connected.as_ref()
    }
}

impl Discovery for MockDiscovery {
    type Stream = MockTransport;

    fn next(&mut self) -> Result<Option<IrdaDeviceInfo>> {
        let device = self.devices.get(self.index).cloned();
        self.index += 1;
        Ok(device)
    }

    fn connect(&mut self, device: &IrdaDeviceInfo) -> Result<Self::Stream> {
        self.connected = Some(device.clone());
        Ok(self.transport.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_reads() {
        let mock = MockTransport::new();
        mock.push_response(&[0x01, 0x02, 0x03]);

        let mut transport = mock.clone();
        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [0x01, 0x02]);

        let mut buf = [0u8; 1];
        assert_eq!(transport.read(&mut buf).unwrap(), 1);
        assert_eq!(buf, [0x03]);
        assert_eq!(mock.reads(), 2);
    }

    #[test]
    fn test_exhausted_script_times_out() {
        let mut transport = MockTransport::new();
        let mut buf = [0u8; 4];
        assert!(matches!(transport.read(&mut buf), Err(Error::Timeout)));
    }

    #[test]
    fn test_recorded_writes() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        transport.write(&[0xAA, 0xBB]).unwrap();
        assert_eq!(mock.written(), vec![0xAA, 0xBB]);
    }

    #[test]
    fn test_purge_drops_staged_bytes_only() {
        let mock = MockTransport::new();
        mock.push_response(&[0x01, 0x02]);
        mock.push_response(&[0x03]);

        let mut transport = mock.clone();
        let mut buf = [0u8; 1];
        transport.read(&mut buf).unwrap();

        // 0x02 is staged, 0x03 is still scripted.
        transport.purge(Direction::Input).unwrap();
        transport.read(&mut buf).unwrap();
        assert_eq!(buf, [0x03]);
        assert_eq!(mock.input_purges(), 1);
    }
}
