//! Channel command frames.
//!
//! A frame writes all parameters of one channel at once:
//!
//! ```text
//! prefix | gate+shape | ramp | intensity | frequency | pulse width | suffix | checksum
//! ```
//!
//! The prefix and suffix depend on the channel, see [`ChannelId::prefix()`].

use arrayvec::ArrayVec;
use core::ops::Deref;

use crate::checksum::checksum;
use crate::types::{ChannelId, ChannelParameters};
use crate::wire::FRAME_LEN;

type FrameStore = ArrayVec<u8, FRAME_LEN>;

/// An encoded command for one channel, ready to be written to the box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    channel: ChannelId,
    data: FrameStore,
}

impl Frame {
    /// The channel this frame configures.
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Returns the bytes to be sent to the box.
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Encode the parameters of `channel` together with the shared `ramp`.
pub fn encode(channel: ChannelId, params: &ChannelParameters, ramp: u8) -> Frame {
    let mut data = FrameStore::new();
    // Prefix, parameters, suffix and checksum of either channel add up to FRAME_LEN.
    data.extend(channel.prefix().iter().copied());
    data.extend([
        params.gate_byte(),
        ramp,
        params.intensity,
        params.frequency.to_wire(),
        params.pulse_width,
    ]);
    data.extend(channel.suffix().iter().copied());
    data.push(checksum(&data));
    Frame { channel, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::verify;
    use crate::types::{Frequency, PulseShape};
    use crate::wire::PARAMETER_BYTES;

    fn params(gate: bool, shape: PulseShape, i: u8, f: u8, w: u8) -> ChannelParameters {
        ChannelParameters {
            gate,
            pulse_shape: shape,
            intensity: i,
            frequency: Frequency::new(f),
            pulse_width: w,
        }
    }

    #[test]
    fn test_channel_a_frame() {
        let frame = encode(ChannelId::A, &params(true, PulseShape::First, 10, 20, 30), 255);
        let body = [0x9d, 0x40, 0x04, 0x00, 0x07, 0xff, 0x0a, 0xec, 0x1e];
        assert_eq!(&frame[..9], &body);
        assert_eq!(frame[9], checksum(&body));
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(frame.channel(), ChannelId::A);
    }

    #[test]
    fn test_channel_b_frame() {
        let frame = encode(ChannelId::B, &params(false, PulseShape::Third, 1, 0, 255), 0);
        let body = [0x9d, 0x40, 0x0a, 0x02, 0x00, 0x01, 0x00, 0xff, 0x00];
        assert_eq!(&frame[..9], &body);
        assert_eq!(frame[9], checksum(&body));
        assert_eq!(frame.len(), FRAME_LEN);
    }

    #[test]
    fn test_frames_verify() {
        for channel in ChannelId::ALL {
            for shape in PulseShape::ALL {
                for gate in [false, true] {
                    for v in [0u8, 1, 127, 128, 200, 255] {
                        let frame = encode(channel, &params(gate, shape, v, v, v), v);
                        assert!(verify(&frame));
                        let gate_byte = frame[channel.prefix().len()];
                        assert_eq!(gate_byte, gate as u8 + shape.weight());
                        assert_eq!(
                            frame.len(),
                            channel.prefix().len() + PARAMETER_BYTES + channel.suffix().len() + 1
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let p = params(true, PulseShape::Second, 99, 42, 7);
        assert_eq!(encode(ChannelId::B, &p, 3), encode(ChannelId::B, &p, 3));
        assert_ne!(encode(ChannelId::B, &p, 3), encode(ChannelId::B, &p, 4));
    }
}
