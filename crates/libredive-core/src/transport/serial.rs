//! Serial transport
//!
//! Wraps the `serialport` crate behind the [`Transport`] trait. Reads poll
//! `bytes_to_read` against a deadline instead of relying on the OS read
//! timeout, which keeps timeout semantics identical across platforms.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use serialport::{ClearBuffer, SerialPort};

use super::{Direction, FlowControl, Parity, StopBits, Transport};
use crate::error::{Error, Result};

/// Interval between availability polls while a read waits for data.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Serial port transport for wired devices
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    timeout_ms: i32,
}

impl SerialTransport {
    /// Open a serial port by OS name (e.g. `/dev/ttyUSB0` or `COM3`).
    ///
    /// The port starts at 9600 baud with blocking reads; drivers configure
    /// the line parameters and timeout they need afterwards.
    pub fn open(name: &str) -> Result<Self> {
        let port = serialport::new(name, 9600)
            // Short hardware timeout; the logical deadline is enforced here.
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| map_open_error(name, e))?;

        debug!("opened serial port {}", name);

        Ok(SerialTransport {
            port,
            timeout_ms: -1,
        })
    }
}

fn map_open_error(name: &str, e: serialport::Error) -> Error {
    match e.kind() {
        serialport::ErrorKind::NoDevice => Error::NoDevice,
        serialport::ErrorKind::Io(io::ErrorKind::NotFound) => Error::NoDevice,
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
            Error::NoAccess(name.to_string())
        }
        _ => Error::Serial(e),
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        let deadline = (self.timeout_ms >= 0)
            .then(|| Instant::now() + Duration::from_millis(self.timeout_ms as u64));

        let mut nbytes = 0;
        while nbytes < data.len() {
            let available = self.port.bytes_to_read()? as usize;
            if available == 0 {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    break;
                }
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }

            let want = available.min(data.len() - nbytes);
            match self.port.read(&mut data[nbytes..nbytes + want]) {
                Ok(0) => break,
                Ok(n) => nbytes += n,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }

        trace!(
            "serial read {} of {} bytes: {:02X?}",
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
        self.port.write_all(data)?;
        trace!("serial write {} bytes: {:02X?}", data.len(), data);
        Ok(data.len())
    }

    fn set_timeout(&mut self, timeout_ms: i32) -> Result<()> {
        self.timeout_ms = timeout_ms;
        Ok(())
    }

    fn purge(&mut self, direction: Direction) -> Result<()> {
        let buffer = match direction {
            Direction::Input => ClearBuffer::Input,
            Direction::Output => ClearBuffer::Output,
            Direction::All => ClearBuffer::All,
        };
        self.port.clear(buffer)?;
        Ok(())
    }

    fn get_available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn configure(
        &mut self,
        baudrate: u32,
        databits: u8,
        parity: Parity,
        stopbits: StopBits,
        flowcontrol: FlowControl,
    ) -> Result<()> {
        self.port.set_baud_rate(baudrate)?;

        let databits = match databits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            n => return Err(Error::InvalidArgs(format!("unsupported data bits: {}", n))),
        };
        self.port.set_data_bits(databits)?;

        let parity = match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
            Parity::Mark | Parity::Space => {
                warn!("mark/space parity not available on this backend");
                return Err(Error::Unsupported);
            }
        };
        self.port.set_parity(parity)?;

        let stopbits = match stopbits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
            StopBits::OnePointFive => {
                warn!("1.5 stop bits not available on this backend");
                return Err(Error::Unsupported);
            }
        };
        self.port.set_stop_bits(stopbits)?;

        let flowcontrol = match flowcontrol {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
            FlowControl::Software => serialport::FlowControl::Software,
        };
        self.port.set_flow_control(flowcontrol)?;

        Ok(())
    }

    fn set_dtr(&mut self, value: bool) -> Result<()> {
        self.port.write_data_terminal_ready(value)?;
        Ok(())
    }

    fn set_rts(&mut self, value: bool) -> Result<()> {
        self.port.write_request_to_send(value)?;
        Ok(())
    }

    fn set_halfduplex(&mut self, value: bool) -> Result<()> {
        // The backend has no half-duplex mode; the drivers that need it
        // purge their own echo.
        debug!("half-duplex emulation requested: {}", value);
        Ok(())
    }

    fn set_break(&mut self, value: bool) -> Result<()> {
        if value {
            self.port.set_break()?;
        } else {
            self.port.clear_break()?;
        }
        Ok(())
    }

    fn get_lines(&mut self) -> Result<u32> {
        let mut lines = 0;
        if self.port.read_carrier_detect()? {
            lines |= super::line::DCD;
        }
        if self.port.read_clear_to_send()? {
            lines |= super::line::CTS;
        }
        if self.port.read_data_set_ready()? {
            lines |= super::line::DSR;
        }
        if self.port.read_ring_indicator()? {
            lines |= super::line::RNG;
        }
        Ok(lines)
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the port handle releases the file descriptor; nothing
        // else to do, and calling twice is harmless.
        Ok(())
    }
}
