//! Box side of the protocol. See [`DeviceState`] for more details.

use alloc::boxed::Box;
use log::{debug, trace};

use crate::buffer::Buffer;
use crate::nom_parser::{parse_frame, FrameToken};
use crate::types::{ChannelId, ChannelParameters};
use crate::wire::{COMMAND_ACK, COMMAND_NAK, LINK_ACK, LINK_REQUEST, READY, RESET};

/// Emulation of the control box, useful for testing hosts without hardware.
///
/// This enum represents the different states of the box protocol.
/// Create a new instance with `DeviceState::new()`.
///
/// # Example
///
/// ```
/// use mk312_proto::DeviceState;
/// # use std::io::{Read, Write, Cursor};
/// # fn connect_serial_interface() -> Result<Cursor<Vec<u8>>, &'static str>
/// # { Ok(Cursor::new(Vec::new())) }
/// #
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut device = DeviceState::new();
/// let mut serial = connect_serial_interface()?;
///
/// 'main: loop {
///     # break // this snippet is only for show
///     device = match device {
///         DeviceState::ReceiveData(recv) => {
///             let mut buf = [0; 16];
///             match serial.read(&mut buf) {
///                 Ok(0) | Err(_) => break 'main,
///                 Ok(len) => recv.receive_data(&buf[..len]),
///             }
///         }
///
///         DeviceState::SendData(send) => {
///             serial.write_all(send.get_data())?;
///             send.data_sent()
///         }
///
///         DeviceState::WriteChannel(write) => {
///             if write.params().intensity > 200 {
///                 write.write_error()
///             } else {
///                 write.write_ok()
///             }
///         }
///     };
/// }
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub enum DeviceState {
    /// More data needs to be received from the host. Use receive_data() on the inner struct.
    ReceiveData(ReceiveData),
    /// A reply is waiting to be transmitted.
    SendData(SendData),
    /// A valid channel frame was received while linked.
    WriteChannel(WriteChannel),
}

impl DeviceState {
    /// Create a box waiting for the host to reset it.
    pub fn new() -> Self {
        ReceiveData::from_state(Box::new(CommonStateStruct {
            phase: Phase::AwaitReset,
            registers: Registers::default(),
            input_buffer: Buffer::new(),
        }))
    }

    /// The channel settings the box has accepted so far.
    pub fn registers(&self) -> &Registers {
        &self.common().registers
    }

    /// True once the link request has been acknowledged.
    pub fn is_linked(&self) -> bool {
        self.common().phase == Phase::Linked
    }

    fn common(&self) -> &CommonStateStruct {
        match self {
            Self::ReceiveData(ReceiveData { state })
            | Self::SendData(SendData { state, .. })
            | Self::WriteChannel(WriteChannel { state, .. }) => state.as_ref(),
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState::new()
    }
}

impl From<ReceiveData> for DeviceState {
    fn from(x: ReceiveData) -> Self {
        Self::ReceiveData(x)
    }
}

impl From<SendData> for DeviceState {
    fn from(x: SendData) -> Self {
        Self::SendData(x)
    }
}

impl From<WriteChannel> for DeviceState {
    fn from(x: WriteChannel) -> Self {
        Self::WriteChannel(x)
    }
}

/// Channel settings stored in the box.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    ramp: Option<u8>,
    channels: [Option<ChannelParameters>; 2],
}

impl Registers {
    /// Ramp of the last accepted frame.
    pub const fn ramp(&self) -> Option<u8> {
        self.ramp
    }

    /// Settings of the last accepted frame for `channel`.
    pub const fn channel(&self, channel: ChannelId) -> Option<ChannelParameters> {
        self.channels[channel.index()]
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    AwaitReset,
    AwaitLink,
    Linked,
}

type CommonState = Box<CommonStateStruct>;

#[derive(Debug)]
struct CommonStateStruct {
    phase: Phase,
    registers: Registers,
    input_buffer: Buffer,
}

/// Struct with methods for the "receive data from host" state.
#[derive(Debug)]
pub struct ReceiveData {
    state: CommonState,
}

impl ReceiveData {
    fn from_state(state: CommonState) -> DeviceState {
        Self { state }.parse_buffer()
    }

    /// Feed data into the internal buffer, and try to parse the buffer afterwards.
    ///
    /// A state transition will occur if a complete frame or handshake byte
    /// has been received.
    pub fn receive_data(mut self, data: &[u8]) -> DeviceState {
        self.state.input_buffer.write(data);
        self.parse_buffer()
    }

    fn parse_buffer(mut self) -> DeviceState {
        loop {
            if self.state.input_buffer.is_empty() {
                return self.into();
            }
            let (consumed, token) = parse_frame(self.state.input_buffer.as_ref());
            self.state.input_buffer.consume(consumed);
            trace!("device token {:?} in {:?}", token, self.state.phase);

            match (token, self.state.phase) {
                (FrameToken::NeedData, _) => return self.into(),
                (FrameToken::Byte(RESET), _) => {
                    self.state.phase = Phase::AwaitLink;
                    return SendData::from_byte(self.state, READY);
                }
                (FrameToken::Byte(LINK_REQUEST), Phase::AwaitLink) => {
                    debug!("device linked");
                    self.state.phase = Phase::Linked;
                    return SendData::from_byte(self.state, LINK_ACK);
                }
                (
                    FrameToken::Frame {
                        channel,
                        params,
                        ramp,
                    },
                    Phase::Linked,
                ) => return WriteChannel::from_state(self.state, channel, params, ramp),
                (FrameToken::BadChecksum(channel), Phase::Linked)
                | (FrameToken::BadFrame(channel), Phase::Linked) => {
                    debug!("device rejected frame for channel {}", channel);
                    return SendData::from_byte(self.state, COMMAND_NAK);
                }
                _ => {} // unlinked frames and stray bytes are dropped
            }
        }
    }
}

/// Struct with methods for the "transmit data to host" state.
///
/// Call [`get_data()`](Self::get_data()) to get a reference to the data to be transmitted,
/// and then call [`data_sent()`](Self::data_sent()) when the data has been successfully transmitted.
#[derive(Debug)]
pub struct SendData {
    state: CommonState,
    data: [u8; 1],
}

impl SendData {
    fn from_byte(state: CommonState, byte: u8) -> DeviceState {
        Self { state, data: [byte] }.into()
    }

    /// Returns the data to be sent to the host.
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    /// Signals that the data was sent. Bytes still buffered are parsed before
    /// waiting for more.
    pub fn data_sent(self) -> DeviceState {
        ReceiveData::from_state(self.state)
    }
}

/// Struct representing the "channel frame received" state.
#[derive(Debug)]
pub struct WriteChannel {
    state: CommonState,
    channel: ChannelId,
    params: ChannelParameters,
    ramp: u8,
}

impl WriteChannel {
    fn from_state(
        state: CommonState,
        channel: ChannelId,
        params: ChannelParameters,
        ramp: u8,
    ) -> DeviceState {
        Self {
            state,
            channel,
            params,
            ramp,
        }
        .into()
    }

    /// Apply the settings and acknowledge the frame.
    pub fn write_ok(mut self) -> DeviceState {
        let registers = &mut self.state.registers;
        registers.ramp = Some(self.ramp);
        registers.channels[self.channel.index()] = Some(self.params);
        SendData::from_byte(self.state, COMMAND_ACK)
    }

    /// Reject the frame, leaving the settings as they were.
    pub fn write_error(self) -> DeviceState {
        SendData::from_byte(self.state, COMMAND_NAK)
    }

    /// The channel the frame addresses.
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }

    /// The channel settings in the frame.
    pub const fn params(&self) -> &ChannelParameters {
        &self.params
    }

    /// The shared ramp in the frame.
    pub const fn ramp(&self) -> u8 {
        self.ramp
    }
}
