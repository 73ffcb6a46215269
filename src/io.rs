//! Blocking driver for a [`Connection`] over a `Read + Write` transport.
//!
//! [`Controller`] owns the transport while the connection is open. It polls
//! for received bytes, writes every frame as soon as it's produced, and turns
//! transport failures into [`Event::ConnectionLost`].

use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use log::{info, trace, warn};
use snafu::{ensure, Snafu};

use crate::connection::{self, Connection, ConnectionState, Event, Output, Transmit};
use crate::frame::Frame;
use crate::types::{ChannelId, ChannelParameters, Controls, DEFAULT_RAMP};

/// Error type for this module
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A transport is already open.
    #[snafu(display("Connection is already open"))]
    AlreadyOpen,
}

impl From<connection::Error> for Error {
    fn from(_: connection::Error) -> Self {
        Error::AlreadyOpen
    }
}

/// Settings of a [`Controller`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How often the caller is expected to call [`Controller::poll()`].
    pub poll_interval: Duration,
    /// How long a single read may block. Keep this well below
    /// `poll_interval`, the caller's wait sets the cadence.
    pub read_timeout: Duration,
    /// Give up on a handshake that takes longer than this. `None` waits
    /// forever.
    pub handshake_timeout: Option<Duration>,
    /// Ramp sent with the first frames after the handshake.
    pub ramp: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            read_timeout: Duration::from_millis(10),
            handshake_timeout: None,
            ramp: DEFAULT_RAMP,
        }
    }
}

const READ_BUFFER_LEN: usize = 64;

/// Drives the host side of the protocol over a transport.
pub struct Controller<IO> {
    connection: Connection,
    config: Config,
    transport: Option<IO>,
    opened_at: Option<Instant>,
}

impl<IO> Controller<IO>
where
    IO: Read + Write,
{
    pub fn new(config: Config) -> Self {
        let connection = Connection::with_controls(Controls::new(config.ramp));
        Self {
            connection,
            config,
            transport: None,
            opened_at: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn controls(&self) -> &Controls {
        self.connection.controls()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Take ownership of `transport` and start the handshake.
    ///
    /// A failure to write the reset byte is reported as
    /// [`Event::ConnectionLost`] in the returned events.
    /// # Errors
    /// Returns [`Error::AlreadyOpen`] if a transport is already held.
    pub fn open(&mut self, transport: IO) -> Result<Vec<Event>, Error> {
        ensure!(self.transport.is_none(), AlreadyOpenSnafu);
        let reset = self.connection.open()?;
        info!("opening connection");
        self.transport = Some(transport);
        self.opened_at = Some(Instant::now());

        let mut events = Vec::new();
        self.transmit(&[reset], &mut events);
        Ok(events)
    }

    /// Read whatever the transport has, and react to it.
    ///
    /// Call this every [`Config::poll_interval`].
    pub fn poll(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => return events,
        };

        let mut buf = [0; READ_BUFFER_LEN];
        let len = match transport.read(&mut buf) {
            Ok(len) => len,
            Err(err) if is_no_data(&err) => 0,
            Err(err) => {
                events.push(self.fail(err));
                return events;
            }
        };
        if len > 0 {
            trace!("read {:02x?}", &buf[..len]);
            let output = self.connection.receive_data(&buf[..len]);
            self.handle_output(output, &mut events);
        }

        if let Some(timeout) = self.handshake_timed_out() {
            events.push(self.fail(format!("no handshake reply within {:?}", timeout)));
        }
        events
    }

    /// Send the current settings of `channel`. Does nothing unless the link is
    /// established.
    pub fn request_send(&mut self, channel: ChannelId) -> Vec<Event> {
        let frame = self.connection.request_send(channel);
        self.send_frame(frame)
    }

    /// Change the settings of `channel` and send them if possible.
    pub fn update_channel(&mut self, channel: ChannelId, params: ChannelParameters) -> Vec<Event> {
        let frame = self.connection.update_channel(channel, params);
        self.send_frame(frame)
    }

    /// Change the shared ramp and resend both channels if possible.
    pub fn set_ramp(&mut self, ramp: u8) -> Vec<Event> {
        let mut events = Vec::new();
        let output = self.connection.set_ramp(ramp);
        self.handle_output(output, &mut events);
        events
    }

    /// Close the connection and hand the transport back. Calling this while
    /// closed does nothing.
    pub fn close(&mut self) -> (Option<IO>, Option<Event>) {
        let event = self.connection.close();
        self.opened_at = None;
        let transport = self.transport.take();
        if transport.is_some() {
            info!("connection closed");
        }
        (transport, event)
    }

    fn send_frame(&mut self, frame: Option<Frame>) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(frame) = frame {
            self.transmit(&[frame.into()], &mut events);
        }
        events
    }

    fn handle_output(&mut self, output: Output, events: &mut Vec<Event>) {
        events.extend(output.events);
        self.transmit(&output.transmit, events);
    }

    fn transmit(&mut self, data: &[Transmit], events: &mut Vec<Event>) {
        for transmit in data {
            let transport = match self.transport.as_mut() {
                Some(transport) => transport,
                None => return,
            };
            trace!("write {:02x?}", transmit.as_slice());
            if let Err(err) = transport.write_all(transmit.as_slice()) {
                events.push(self.fail(err));
                return;
            }
        }
        if let Some(transport) = self.transport.as_mut() {
            if let Err(err) = transport.flush() {
                events.push(self.fail(err));
            }
        }
    }

    fn handshake_timed_out(&self) -> Option<Duration> {
        let timeout = self.config.handshake_timeout?;
        let opened_at = self.opened_at?;
        if self.connection.state().is_handshaking() && opened_at.elapsed() >= timeout {
            Some(timeout)
        } else {
            None
        }
    }

    // Transport errors are fatal: drop the transport and reset the connection.
    fn fail(&mut self, reason: impl std::fmt::Display) -> Event {
        warn!("closing connection: {}", reason);
        self.transport = None;
        self.opened_at = None;
        self.connection.transport_error(reason)
    }
}

fn is_no_data(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

#[cfg(feature = "serial")]
pub mod serial {
    //! Serial port transport.

    use super::Config;
    use crate::wire::BAUD_RATE;
    use serialport::{DataBits, Parity, SerialPort, StopBits};
    use snafu::{ResultExt, Snafu};

    /// Error type for this module
    #[derive(Debug, Snafu)]
    #[non_exhaustive]
    pub enum Error {
        /// Opening the serial port failed.
        #[snafu(display("Could not open serial port {}: {}", port, source))]
        Open {
            port: String,
            source: serialport::Error,
        },
        /// The serial ports of this machine could not be enumerated.
        #[snafu(display("Could not list serial ports: {}", source))]
        List { source: serialport::Error },
    }

    /// Open `port` with the line settings the box expects.
    /// # Errors
    /// Returns [`Error::Open`] if the port can't be opened.
    pub fn open_serial(port: &str, config: &Config) -> Result<Box<dyn SerialPort>, Error> {
        serialport::new(port, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(config.read_timeout)
            .open()
            .context(OpenSnafu { port })
    }

    /// Names of the serial ports present on this machine.
    /// # Errors
    /// Returns [`Error::List`] if the ports can't be enumerated.
    pub fn available_ports() -> Result<Vec<String>, Error> {
        let ports = serialport::available_ports().context(ListSnafu)?;
        Ok(ports.into_iter().map(|port| port.port_name).collect())
    }

}
