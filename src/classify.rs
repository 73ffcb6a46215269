//! Mapping of received bytes to protocol reactions.
//!
//! [`classify()`] holds the whole transition table of the host side. It has no
//! state of its own so it can be checked against literal byte fixtures.

use crate::connection::ConnectionState;
use crate::wire::{COMMAND_ACK, COMMAND_NAK, LINK_ACK, READY};

/// What the state machine does in reaction to a received chunk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Move to `next` and perform `action`.
    Advance {
        next: ConnectionState,
        action: Action,
    },
    /// Nothing of interest in the chunk.
    Ignore,
    /// The chunk was not the link acknowledgement we are waiting for.
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// The box is ready, send the link request.
    SendLinkRequest,
    /// The link is up, enable both channels and send their frames.
    EnableChannels,
    /// Command acknowledgement markers seen while established.
    Acknowledge { ok: bool, error: bool },
}

/// Classify `chunk`, received while in `state`.
///
/// The chunk may hold any number of bytes, so markers are searched for in the
/// whole chunk. The link acknowledgement is the exception: it has to arrive
/// as a chunk of its own.
pub fn classify(state: ConnectionState, chunk: &[u8]) -> Classification {
    use ConnectionState::*;

    if chunk.is_empty() {
        return Classification::Ignore;
    }

    match state {
        ZeroByteSent if chunk.contains(&READY) => Classification::Advance {
            next: LinkByteSent,
            action: Action::SendLinkRequest,
        },
        LinkByteSent if chunk == [LINK_ACK] => Classification::Advance {
            next: Established,
            action: Action::EnableChannels,
        },
        LinkByteSent => Classification::Error,
        Established => {
            let ok = chunk.contains(&COMMAND_ACK);
            let error = chunk.contains(&COMMAND_NAK);
            if ok || error {
                Classification::Advance {
                    next: Established,
                    action: Action::Acknowledge { ok, error },
                }
            } else {
                Classification::Ignore
            }
        }
        Undefined | Connecting | ZeroByteSent => Classification::Ignore,
    }
}
