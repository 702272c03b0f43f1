//! Socket transport
//!
//! TCP-backed transport for network-bridged devices (e.g. a serial server
//! in front of a download cradle). Wired-line controls are no-ops.
//!
//! Some platforms require process-wide socket-subsystem setup before the
//! first socket and teardown after the last one; that pairing is modeled by
//! a reference-counted guard so it holds on every exit path.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::{Direction, Transport};
use crate::error::{fold_status, Error, Result};

static SUBSYSTEM_REFS: Mutex<u32> = Mutex::new(0);

/// Reference count on the process-wide socket subsystem, held while any
/// [`SocketTransport`] is alive.
struct SubsystemGuard(());

impl SubsystemGuard {
    fn acquire() -> Self {
        let mut refs = SUBSYSTEM_REFS.lock().unwrap_or_else(|e| e.into_inner());
        *refs += 1;
        if *refs == 1 {
            debug!("socket subsystem initialized");
        }
        SubsystemGuard(())
    }
}

impl Drop for SubsystemGuard {
    fn drop(&mut self) {
        let mut refs = SUBSYSTEM_REFS.lock().unwrap_or_else(|e| e.into_inner());
        *refs -= 1;
        if *refs == 0 {
            debug!("socket subsystem terminated");
        }
    }
}

#[cfg(test)]
fn subsystem_refs() -> u32 {
    *SUBSYSTEM_REFS.lock().unwrap_or_else(|e| e.into_inner())
}

/// TCP socket transport
pub struct SocketTransport {
    stream: TcpStream,
    timeout_ms: i32,
    _guard: SubsystemGuard,
}

impl SocketTransport {
    /// Connect to a `host:port` endpoint.
    pub fn open(address: &str) -> Result<Self> {
        let guard = SubsystemGuard::acquire();

        let stream = TcpStream::connect(address).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => Error::NoAccess(address.to_string()),
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => Error::NoDevice,
            _ => Error::Io(e),
        })?;

        stream
            .set_read_timeout(Some(Duration::from_millis(100)))
            .map_err(Error::Io)?;

        debug!("connected to {}", address);

        Ok(SocketTransport {
            stream,
            timeout_ms: -1,
            _guard: guard,
        })
    }
}

impl Transport for SocketTransport {
    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        let deadline = (self.timeout_ms >= 0)
            .then(|| Instant::now() + Duration::from_millis(self.timeout_ms as u64));

        let mut nbytes = 0;
        while nbytes < data.len() {
            match self.stream.read(&mut data[nbytes..]) {
                // EOF from the peer: report whatever arrived as a timeout.
                Ok(0) => break,
                Ok(n) => nbytes += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        break;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        trace!(
            "socket read {} of {} bytes: {:02X?}",
            nbytes,
            data.len(),
            &data[..nbytes]
        );

        if nbytes != data.len() {
            return Err(Error::Timeout);
        }
        Ok(nbytes)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.stream.write_all(data)?;
        trace!("socket write {} bytes: {:02X?}", data.len(), data);
        Ok(data.len())
    }

    fn set_timeout(&mut self, timeout_ms: i32) -> Result<()> {
        self.timeout_ms = timeout_ms;
        Ok(())
    }

    fn purge(&mut self, direction: Direction) -> Result<()> {
        match direction {
            Direction::Output => self.stream.flush()?,
            Direction::Input | Direction::All => {
                // No kernel call drops pending TCP data; drain it instead.
                self.stream.set_nonblocking(true)?;
                let mut scratch = [0u8; 1024];
                loop {
                    match self.stream.read(&mut scratch) {
                        Ok(0) => break,
                        Ok(_) => continue,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            let _ = self.stream.set_nonblocking(false);
                            return Err(e.into());
                        }
                    }
                }
                self.stream.set_nonblocking(false)?;
            }
        }
        Ok(())
    }

    fn get_available(&mut self) -> Result<usize> {
        self.stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 8192];
        let result = self.stream.peek(&mut scratch);
        self.stream.set_nonblocking(false)?;

        match result {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut status = Ok(());

        // Terminate both directions; the guard in Drop releases the
        // subsystem reference.
        fold_status(
            &mut status,
            self.stream.shutdown(Shutdown::Both).map_err(Error::from),
        );

        status
    }
}
