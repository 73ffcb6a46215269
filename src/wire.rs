//! Byte values seen on the wire.

/// Sent by the host to reset the box protocol.
pub const RESET: u8 = 0x00;
/// Sent by the box once it's ready for the link request.
pub const READY: u8 = 0x07;
/// Sent by the host after the box reported ready.
pub const LINK_REQUEST: u8 = 0x0e;
/// The box accepts the link. Must arrive alone in a read.
pub const LINK_ACK: u8 = 0x05;
/// A command frame was accepted.
pub const COMMAND_ACK: u8 = 0x06;
/// A command frame was rejected. Same value as [`READY`].
pub const COMMAND_NAK: u8 = 0x07;

/// Register address of channel A.
pub const CHANNEL_A_PREFIX: &[u8] = &[0x9d, 0x40, 0x04, 0x00];
pub const CHANNEL_A_SUFFIX: &[u8] = &[];
/// Register address of channel B.
pub const CHANNEL_B_PREFIX: &[u8] = &[0x9d, 0x40, 0x0a];
pub const CHANNEL_B_SUFFIX: &[u8] = &[0x00];

/// Number of parameter bytes between prefix and suffix.
pub const PARAMETER_BYTES: usize = 5;
/// Both channel frames are this long, checksum included.
pub const FRAME_LEN: usize = 10;

/// Fixed line speed. 8 data bits, no parity, one stop bit.
pub const BAUD_RATE: u32 = 19_200;
