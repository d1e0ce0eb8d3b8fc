use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery guarantee requested for an outgoing payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Reliability {
    #[default]
    Unreliable,
    Reliable,
}

/// Wire transport supplied by the host. The engine layers payload encoding
/// and sequencing on top; it never owns a socket. Incoming payloads are
/// pushed back in by the host through [`apply_update`](crate::apply_update).
pub trait Transport {
    type Error: fmt::Display;

    fn send_unreliable(&mut self, channel: u8, payload: &[u8]) -> Result<(), Self::Error>;

    fn send_reliable(&mut self, channel: u8, payload: &[u8]) -> Result<(), Self::Error>;

    fn send(
        &mut self,
        channel: u8,
        payload: &[u8],
        reliability: Reliability,
    ) -> Result<(), Self::Error> {
        match reliability {
            Reliability::Unreliable => self.send_unreliable(channel, payload),
            Reliability::Reliable => self.send_reliable(channel, payload),
        }
    }
}
