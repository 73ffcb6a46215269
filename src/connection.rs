//! See [`Connection`] for more details.

use alloc::string::{String, ToString};
use arrayvec::ArrayVec;
use core::fmt::Display;
use log::{debug, trace, warn};
use snafu::{ensure, Snafu};

use crate::classify::{classify, Action, Classification};
use crate::frame::{encode, Frame};
use crate::types::{ChannelId, ChannelParameters, Controls};
use crate::wire::{LINK_REQUEST, RESET};

/// Error type for this module
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// `open()` was called on a connection that isn't closed.
    #[snafu(display("Connection is already open ({:?})", state))]
    AlreadyOpen { state: ConnectionState },
}

/// Progress of the link to the box, ordered from closed to established.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    /// Closed, or reset after an error.
    Undefined,
    /// Transport opened, reset byte not yet written.
    Connecting,
    /// Waiting for the box to report that it's ready.
    ZeroByteSent,
    /// Waiting for the box to accept the link.
    LinkByteSent,
    /// Channel frames may be sent.
    Established,
}

impl ConnectionState {
    /// True while the handshake is in progress.
    pub const fn is_handshaking(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::ZeroByteSent
                | ConnectionState::LinkByteSent
        )
    }
}

/// Notifications for whoever presents the connection to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The channels can (or can no longer) be controlled.
    ChannelsEnabled(bool),
    /// The box acknowledged a command.
    CommandAccepted,
    /// The box rejected a command, or refused the link.
    CommandRejected,
    /// The transport failed and the connection was reset.
    ConnectionLost(String),
}

/// Bytes to be written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transmit {
    /// A single handshake byte.
    Control([u8; 1]),
    Frame(Frame),
}

impl Transmit {
    /// Returns the data to be sent.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Transmit::Control(byte) => byte,
            Transmit::Frame(frame) => frame.as_slice(),
        }
    }
}

impl From<Frame> for Transmit {
    fn from(frame: Frame) -> Self {
        Transmit::Frame(frame)
    }
}

/// Everything a single call produced.
///
/// All of `transmit` must be written right away and in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Output {
    pub transmit: ArrayVec<Transmit, 2>,
    pub events: ArrayVec<Event, 2>,
}

impl Output {
    fn send(&mut self, transmit: impl Into<Transmit>) {
        self.transmit.push(transmit.into());
    }

    fn notify(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.transmit.is_empty() && self.events.is_empty()
    }
}

/// Host side of the box protocol.
///
/// The connection never touches the transport. Each call returns the bytes
/// to write, and received bytes are handed in with
/// [`receive_data()`](Self::receive_data()).
///
/// # Example
///
/// ```
/// use mk312_proto::{Connection, ConnectionState, Event};
///
/// let mut conn = Connection::new();
/// let reset = conn.open().unwrap();
/// assert_eq!(reset.as_slice(), &[0x00]);
///
/// let out = conn.receive_data(&[0x07]);
/// assert_eq!(out.transmit[0].as_slice(), &[0x0e]);
///
/// let out = conn.receive_data(&[0x05]);
/// assert_eq!(conn.state(), ConnectionState::Established);
/// assert_eq!(out.events[0], Event::ChannelsEnabled(true));
/// assert_eq!(out.transmit.len(), 2); // one frame per channel
/// ```
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    controls: Controls,
}

impl Connection {
    pub fn new() -> Self {
        Self::with_controls(Controls::default())
    }

    /// Create a closed connection starting from the given channel settings.
    pub fn with_controls(controls: Controls) -> Self {
        Self {
            state: ConnectionState::Undefined,
            controls,
        }
    }

    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    pub const fn is_established(&self) -> bool {
        matches!(self.state, ConnectionState::Established)
    }

    pub const fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Start the handshake. The returned reset byte must be written to the
    /// freshly opened transport.
    /// # Errors
    /// Returns [`Error::AlreadyOpen`] unless the connection is closed.
    pub fn open(&mut self) -> Result<Transmit, Error> {
        ensure!(
            self.state == ConnectionState::Undefined,
            AlreadyOpenSnafu { state: self.state }
        );
        self.transition(ConnectionState::Connecting);
        self.transition(ConnectionState::ZeroByteSent);
        Ok(Transmit::Control([RESET]))
    }

    /// Feed bytes read from the transport.
    ///
    /// `data` may hold any number of bytes. Each call is classified on its own,
    /// see [`classify()`](crate::classify::classify()).
    pub fn receive_data(&mut self, data: &[u8]) -> Output {
        let mut out = Output::default();
        if !data.is_empty() {
            trace!("received {:02x?} in {:?}", data, self.state);
        }

        match classify(self.state, data) {
            Classification::Ignore => {}
            Classification::Error => {
                warn!("unexpected reply {:02x?} to link request", data);
                out.notify(Event::CommandRejected);
            }
            Classification::Advance { next, action } => {
                self.transition(next);
                match action {
                    Action::SendLinkRequest => out.send(Transmit::Control([LINK_REQUEST])),
                    Action::EnableChannels => {
                        out.notify(Event::ChannelsEnabled(true));
                        for channel in ChannelId::ALL {
                            out.send(self.frame(channel));
                        }
                    }
                    Action::Acknowledge { ok, error } => {
                        if ok {
                            out.notify(Event::CommandAccepted);
                        }
                        if error {
                            debug!("command rejected by the box");
                            out.notify(Event::CommandRejected);
                        }
                    }
                }
            }
        }
        out
    }

    /// Build a frame from the current settings of `channel`.
    ///
    /// Returns `None` unless the link is established.
    pub fn request_send(&mut self, channel: ChannelId) -> Option<Frame> {
        if self.is_established() {
            Some(self.frame(channel))
        } else {
            debug!("not sending channel {} in {:?}", channel, self.state);
            None
        }
    }

    /// Change the settings of `channel`, returning its new frame if the link
    /// is established.
    pub fn update_channel(
        &mut self,
        channel: ChannelId,
        params: ChannelParameters,
    ) -> Option<Frame> {
        *self.controls.channel_mut(channel) = params;
        self.request_send(channel)
    }

    /// Change the ramp shared by both channels. Both channels are resent if
    /// the link is established.
    pub fn set_ramp(&mut self, ramp: u8) -> Output {
        self.controls.set_ramp(ramp);
        let mut out = Output::default();
        for channel in ChannelId::ALL {
            if let Some(frame) = self.request_send(channel) {
                out.send(frame);
            }
        }
        out
    }

    /// Return to the closed state. Nothing needs to be written.
    pub fn close(&mut self) -> Option<Event> {
        let was_established = self.is_established();
        self.transition(ConnectionState::Undefined);
        if was_established {
            Some(Event::ChannelsEnabled(false))
        } else {
            None
        }
    }

    /// The transport failed. The connection is reset and the returned event
    /// should be shown to the operator.
    pub fn transport_error(&mut self, reason: impl Display) -> Event {
        warn!("transport error in {:?}: {}", self.state, reason);
        self.transition(ConnectionState::Undefined);
        Event::ConnectionLost(reason.to_string())
    }

    fn frame(&self, channel: ChannelId) -> Frame {
        encode(channel, self.controls.channel(channel), self.controls.ramp())
    }

    fn transition(&mut self, next: ConnectionState) {
        if next != self.state {
            debug!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Connection::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::verify;
    use crate::types::{Frequency, PulseShape};
    use ConnectionState::*;

    fn established() -> Connection {
        let mut conn = Connection::new();
        conn.open().unwrap();
        conn.receive_data(&[0x01, 0x07]);
        conn.receive_data(&[0x05]);
        assert_eq!(conn.state(), Established);
        conn
    }

    #[test]
    fn test_handshake() {
        let mut conn = Connection::new();
        assert_eq!(conn.state(), Undefined);

        assert_eq!(conn.open().unwrap().as_slice(), &[0x00]);
        assert_eq!(conn.state(), ZeroByteSent);

        assert!(conn.receive_data(&[0x01, 0x02]).is_empty());
        assert_eq!(conn.state(), ZeroByteSent);

        let out = conn.receive_data(&[0x01, 0x07]);
        assert_eq!(out.transmit.len(), 1);
        assert_eq!(out.transmit[0].as_slice(), &[0x0e]);
        assert!(out.events.is_empty());
        assert_eq!(conn.state(), LinkByteSent);

        let out = conn.receive_data(&[0x05]);
        assert_eq!(conn.state(), Established);
        assert_eq!(out.events.as_slice(), &[Event::ChannelsEnabled(true)]);
        let controls = *conn.controls();
        let expected: Vec<Transmit> = ChannelId::ALL
            .iter()
            .map(|&ch| encode(ch, controls.channel(ch), controls.ramp()).into())
            .collect();
        assert_eq!(out.transmit.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_link_ack_with_trailing_byte() {
        let mut conn = Connection::new();
        conn.open().unwrap();
        conn.receive_data(&[0x07]);
        let out = conn.receive_data(&[0x05, 0x00]);
        assert_eq!(out.events.as_slice(), &[Event::CommandRejected]);
        assert!(out.transmit.is_empty());
        assert_eq!(conn.state(), LinkByteSent);

        // a clean ack still completes the handshake afterwards
        conn.receive_data(&[0x05]);
        assert_eq!(conn.state(), Established);
    }

    #[test]
    fn test_acknowledgements() {
        let mut conn = established();
        assert_eq!(
            conn.receive_data(&[0x06]).events.as_slice(),
            &[Event::CommandAccepted]
        );
        assert_eq!(
            conn.receive_data(&[0x07]).events.as_slice(),
            &[Event::CommandRejected]
        );
        assert_eq!(
            conn.receive_data(&[0x06, 0x07]).events.as_slice(),
            &[Event::CommandAccepted, Event::CommandRejected]
        );
        assert!(conn.receive_data(&[0x05]).is_empty());
        assert_eq!(conn.state(), Established);
    }

    #[test]
    fn test_open_twice() {
        let mut conn = Connection::new();
        conn.open().unwrap();
        assert_eq!(
            conn.open(),
            Err(Error::AlreadyOpen {
                state: ZeroByteSent
            })
        );
        assert_eq!(conn.state(), ZeroByteSent);

        let mut conn = established();
        assert!(conn.open().is_err());
        assert_eq!(conn.state(), Established);
    }

    #[test]
    fn test_request_send_before_established() {
        let mut conn = Connection::new();
        assert_eq!(conn.request_send(ChannelId::A), None);
        conn.open().unwrap();
        assert_eq!(conn.request_send(ChannelId::B), None);
        conn.receive_data(&[0x07]);
        assert_eq!(conn.request_send(ChannelId::A), None);
        assert!(conn.set_ramp(10).is_empty());
        assert_eq!(conn.controls().ramp(), 10);
    }

    #[test]
    fn test_update_channel() {
        let mut conn = Connection::new();
        let params = ChannelParameters {
            gate: true,
            pulse_shape: PulseShape::Second,
            intensity: 10,
            frequency: Frequency::new(20),
            pulse_width: 30,
        };
        // settings are kept while closed
        assert_eq!(conn.update_channel(ChannelId::B, params), None);
        assert_eq!(conn.controls().channel(ChannelId::B), &params);

        let mut conn = established();
        let frame = conn.update_channel(ChannelId::A, params).unwrap();
        assert_eq!(frame.channel(), ChannelId::A);
        assert_eq!(frame[4], 5);
        assert!(verify(&frame));
        assert_eq!(conn.request_send(ChannelId::A), Some(frame));
    }

    #[test]
    fn test_set_ramp_resends_both_channels() {
        let mut conn = established();
        let out = conn.set_ramp(42);
        assert_eq!(out.transmit.len(), 2);
        for (transmit, channel) in out.transmit.iter().zip(ChannelId::ALL) {
            match transmit {
                Transmit::Frame(frame) => {
                    assert_eq!(frame.channel(), channel);
                    assert_eq!(frame[channel.prefix().len() + 1], 42);
                }
                Transmit::Control(_) => panic!("expected a frame"),
            }
        }
    }

    #[test]
    fn test_close() {
        let mut conn = established();
        assert_eq!(conn.close(), Some(Event::ChannelsEnabled(false)));
        assert_eq!(conn.state(), Undefined);
        assert_eq!(conn.close(), None);
        assert_eq!(conn.request_send(ChannelId::A), None);
        assert!(conn.receive_data(&[0x06]).is_empty());

        // can be opened again
        assert!(conn.open().is_ok());

        let mut conn = Connection::new();
        conn.open().unwrap();
        assert_eq!(conn.close(), None);
        assert_eq!(conn.state(), Undefined);
    }

    #[test]
    fn test_transport_error() {
        for mut conn in [Connection::new(), established()] {
            let event = conn.transport_error("ResourceError");
            assert_eq!(event, Event::ConnectionLost("ResourceError".into()));
            assert_eq!(conn.state(), Undefined);
        }
    }
}
