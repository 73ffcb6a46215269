//! This module defines the channel parameter types, meant to make it hard to
//! build a frame the box won't understand.

use snafu::Snafu;

use core::ops::Deref;
use core::str::FromStr;

use crate::wire;

/// Error type for this module
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The value doesn't name channel A or B.
    #[snafu(display("Invalid channel"))]
    InvalidChannel,
    /// The value isn't one of the pulse shape weights 6, 4 or 2.
    #[snafu(display("Invalid pulse shape weight {}", weight))]
    InvalidPulseShape { weight: u8 },
}

const fn invalid_channel() -> InvalidChannelSnafu {
    InvalidChannelSnafu
}

/// One of the two output channels of the box.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
pub enum ChannelId {
    A,
    B,
}

impl ChannelId {
    /// Both channels, in the order frames are sent after the handshake.
    pub const ALL: [ChannelId; 2] = [ChannelId::A, ChannelId::B];

    /// Register address bytes written before the parameters.
    pub const fn prefix(self) -> &'static [u8] {
        match self {
            ChannelId::A => wire::CHANNEL_A_PREFIX,
            ChannelId::B => wire::CHANNEL_B_PREFIX,
        }
    }

    /// Padding bytes written after the parameters, before the checksum.
    pub const fn suffix(self) -> &'static [u8] {
        match self {
            ChannelId::A => wire::CHANNEL_A_SUFFIX,
            ChannelId::B => wire::CHANNEL_B_SUFFIX,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            ChannelId::A => 0,
            ChannelId::B => 1,
        }
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" | "A" => Ok(ChannelId::A),
            "b" | "B" => Ok(ChannelId::B),
            _ => invalid_channel().fail(),
        }
    }
}

impl core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChannelId::A => write!(f, "A"),
            ChannelId::B => write!(f, "B"),
        }
    }
}

/// The three pulse shapes selectable on a channel.
///
/// Exactly one is active. The shape is transmitted as a weight added to the
/// gate bit.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum PulseShape {
    /// Weight 6
    First,
    /// Weight 4
    Second,
    /// Weight 2
    Third,
}

impl PulseShape {
    pub const ALL: [PulseShape; 3] = [PulseShape::First, PulseShape::Second, PulseShape::Third];

    /// The value this shape adds to the gate byte.
    pub const fn weight(self) -> u8 {
        match self {
            PulseShape::First => 6,
            PulseShape::Second => 4,
            PulseShape::Third => 2,
        }
    }

    /// Look up the shape with the given weight.
    /// # Errors
    /// Returns [`Error::InvalidPulseShape`] unless `weight` is 6, 4 or 2.
    pub fn from_weight(weight: u8) -> Result<Self, Error> {
        match weight {
            6 => Ok(PulseShape::First),
            4 => Ok(PulseShape::Second),
            2 => Ok(PulseShape::Third),
            _ => InvalidPulseShapeSnafu { weight }.fail(),
        }
    }
}

impl Default for PulseShape {
    fn default() -> Self {
        PulseShape::First
    }
}

impl TryFrom<u8> for PulseShape {
    type Error = Error;

    fn try_from(weight: u8) -> Result<Self, Self::Error> {
        Self::from_weight(weight)
    }
}

/// Pulse frequency as the operator sees it.
///
/// The box wants the reverse: a logical value `v` is sent as `256 - v`.
/// Zero is sent as zero, so logical 0 and the (unrepresentable) logical 256
/// share a wire value.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct Frequency(u8);

impl Frequency {
    pub const fn new(logical: u8) -> Self {
        Self(logical)
    }

    /// Build a `Frequency` from the byte found on the wire.
    pub const fn from_wire(byte: u8) -> Self {
        Self(reverse_scale(byte))
    }

    /// The byte sent to the box.
    pub const fn to_wire(self) -> u8 {
        reverse_scale(self.0)
    }
}

// Self-inverse on 1..=255, fixes 0.
const fn reverse_scale(value: u8) -> u8 {
    if value == 0 {
        0
    } else {
        (256 - value as u16) as u8
    }
}

impl Deref for Frequency {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u8> for Frequency {
    fn from(logical: u8) -> Self {
        Self(logical)
    }
}

impl Default for Frequency {
    // Wire byte 127, the box's power-on setting.
    fn default() -> Self {
        Self::from_wire(127)
    }
}

/// Settings of one channel, as read when a frame is built.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub struct ChannelParameters {
    pub gate: bool,
    pub pulse_shape: PulseShape,
    pub intensity: u8,
    pub frequency: Frequency,
    pub pulse_width: u8,
}

impl ChannelParameters {
    /// Gate bit plus the pulse shape weight.
    pub const fn gate_byte(&self) -> u8 {
        self.gate as u8 + self.pulse_shape.weight()
    }
}

impl Default for ChannelParameters {
    fn default() -> Self {
        Self {
            gate: false,
            pulse_shape: PulseShape::default(),
            intensity: 127,
            frequency: Frequency::default(),
            pulse_width: 127,
        }
    }
}

/// Per-session settings of the box: the shared ramp and both channels.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub struct Controls {
    ramp: u8,
    channels: [ChannelParameters; 2],
}

/// Ramp value the box starts with.
pub const DEFAULT_RAMP: u8 = 255;

impl Controls {
    pub fn new(ramp: u8) -> Self {
        Self {
            ramp,
            channels: [ChannelParameters::default(); 2],
        }
    }

    /// The ramp, shared by both channels.
    pub const fn ramp(&self) -> u8 {
        self.ramp
    }

    pub fn set_ramp(&mut self, ramp: u8) {
        self.ramp = ramp;
    }

    pub const fn channel(&self, channel: ChannelId) -> &ChannelParameters {
        &self.channels[channel.index()]
    }

    pub fn channel_mut(&mut self, channel: ChannelId) -> &mut ChannelParameters {
        &mut self.channels[channel.index()]
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new(DEFAULT_RAMP)
    }
}
