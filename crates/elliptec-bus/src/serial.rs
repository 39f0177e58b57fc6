//! Physical serial transport, behind the `serial` feature.
//!
//! Devices speak 9600 baud, 8 data bits, no parity, one stop bit, no flow
//! control. The port itself is opened with a short read timeout and polled;
//! the session-level deadline lives here, not in the OS handle, so a
//! disabled deadline can wait out long device-internal routines.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::trace;

use crate::error::BusError;
use crate::transport::{LineCodec, Transport, DEFAULT_BUS_TIMEOUT};

/// Bus baud rate. Fixed by the devices.
pub const BAUD_RATE: u32 = 9600;

/// How long each poll of the OS handle blocks.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A [`Transport`] over a physical serial port.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    codec: LineCodec,
    timeout: Option<Duration>,
}

impl SerialTransport {
    /// Open the port at `path` (e.g. `/dev/ttyUSB0` or `COM3`) with the
    /// fixed bus settings.
    pub fn open(path: &str) -> Result<Self, BusError> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(POLL_INTERVAL)
            .open()
            .map_err(|e| BusError::Io(e.into()))?;
        Ok(SerialTransport {
            port: Some(port),
            codec: LineCodec::new(),
            timeout: Some(DEFAULT_BUS_TIMEOUT),
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, BusError> {
        self.port.as_mut().ok_or(BusError::NotOpen)
    }
}

impl Transport for SerialTransport {
    fn write_frame(&mut self, frame: &str) -> Result<(), BusError> {
        trace!(%frame, "serial write");
        let port = self.port_mut()?;
        port.write_all(frame.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<String, BusError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut buf = [0u8; 256];
        loop {
            if let Some(line) = self.codec.decode_line() {
                trace!(%line, "serial read");
                return Ok(line);
            }
            let port = self.port_mut()?;
            match port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => self.codec.push(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) => return Err(BusError::Io(e)),
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(BusError::CommTimeout);
                }
            }
        }
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        self.port = None;
        self.codec.clear();
    }
}
