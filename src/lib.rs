//! Sans-io implementation of the MK-312 serial control protocol.
//!
//! The host side is [`Connection`], which runs the link handshake and builds
//! channel command [`Frame`]s. The box side is emulated by [`DeviceState`].
//! Neither performs any I/O. With the `std` feature, [`io::Controller`] drives
//! a [`Connection`] over anything implementing `Read + Write`, such as a serial
//! port opened with the `serial` feature.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod buffer;
pub mod checksum;
pub mod classify;
pub mod connection;
pub mod device;
pub mod frame;
mod nom_parser;
pub mod types;
pub mod wire;

#[cfg(feature = "std")]
pub mod io;

pub use connection::{Connection, ConnectionState, Event, Output, Transmit};
pub use device::DeviceState;
pub use frame::{encode, Frame};
pub use types::{ChannelId, ChannelParameters, Controls, Frequency, PulseShape};
