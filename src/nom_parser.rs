use nom::branch::alt;
use nom::bytes::streaming::{tag, take};
use nom::combinator::{consumed, value};
use nom::number::streaming::u8;
use nom::Err::Incomplete;
use nom::IResult;

use crate::checksum::checksum;
use crate::types::{ChannelId, ChannelParameters, Frequency, PulseShape};
use crate::wire::{CHANNEL_A_PREFIX, CHANNEL_B_PREFIX, PARAMETER_BYTES};

type Buf = [u8];

// First byte of every channel frame.
const FRAME_START: u8 = CHANNEL_A_PREFIX[0];

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum FrameToken {
    Frame {
        channel: ChannelId,
        params: ChannelParameters,
        ramp: u8,
    },
    BadChecksum(ChannelId),
    /// Checksum is fine but the gate byte holds no valid pulse shape.
    BadFrame(ChannelId),
    /// A byte outside of any frame.
    Byte(u8),
    NeedData,
}

/// Parse one token from the start of `buf`.
///
/// Returns the number of bytes consumed, which is 0 only for `NeedData`.
pub(crate) fn parse_frame(buf: &Buf) -> (usize, FrameToken) {
    match buf.first() {
        None => return (0, FrameToken::NeedData),
        Some(&byte) if byte != FRAME_START => return (1, FrameToken::Byte(byte)),
        Some(_) => {}
    }

    match frame(buf) {
        Ok((remaining, token)) => (buf.len() - remaining.len(), token),
        Err(Incomplete(_)) => (0, FrameToken::NeedData),
        Err(_) => (1, FrameToken::Byte(FRAME_START)),
    }
}

fn frame(buf: &Buf) -> IResult<&Buf, FrameToken> {
    let (buf, (body, (channel, params))) = consumed(channel_body)(buf)?;
    let (buf, received) = checksum_byte(buf)?;

    let token = if checksum(body) != received {
        FrameToken::BadChecksum(channel)
    } else {
        match decode_parameters(params) {
            Some((params, ramp)) => FrameToken::Frame {
                channel,
                params,
                ramp,
            },
            None => FrameToken::BadFrame(channel),
        }
    };
    Ok((buf, token))
}

fn channel_body(buf: &Buf) -> IResult<&Buf, (ChannelId, &Buf)> {
    let (buf, channel) = channel_prefix(buf)?;
    let (buf, params) = parameter_bytes(buf)?;
    let (buf, _suffix) = channel_suffix(channel, buf)?;
    Ok((buf, (channel, params)))
}

fn channel_prefix(buf: &Buf) -> IResult<&Buf, ChannelId> {
    alt((
        value(ChannelId::A, tag(CHANNEL_A_PREFIX)),
        value(ChannelId::B, tag(CHANNEL_B_PREFIX)),
    ))(buf)
}

fn parameter_bytes(buf: &Buf) -> IResult<&Buf, &Buf> {
    take(PARAMETER_BYTES)(buf)
}

fn channel_suffix(channel: ChannelId, buf: &Buf) -> IResult<&Buf, &Buf> {
    tag(channel.suffix())(buf)
}

fn checksum_byte(buf: &Buf) -> IResult<&Buf, u8> {
    u8(buf)
}

fn decode_parameters(bytes: &Buf) -> Option<(ChannelParameters, u8)> {
    match *bytes {
        [gate_byte, ramp, intensity, frequency, pulse_width] => {
            let pulse_shape = PulseShape::from_weight(gate_byte & !1).ok()?;
            let params = ChannelParameters {
                gate: gate_byte & 1 == 1,
                pulse_shape,
                intensity,
                frequency: Frequency::from_wire(frequency),
                pulse_width,
            };
            Some((params, ramp))
        }
        _ => None,
    }
}
