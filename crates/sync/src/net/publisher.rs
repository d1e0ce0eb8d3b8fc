use std::fmt;

use serde::{Deserialize, Serialize};

use super::transport::{Reliability, Transport};
use super::wire::{StateUpdate, WireError};
use crate::interp::{AlwaysChanged, ChangeGate, Interpolator, SnapshotComparator};
use crate::snapshot::{Snapshot, SyncedFields};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub channel: u8,
    pub fields: SyncedFields,
    pub send_on_change_only: bool,
    pub reliability: Reliability,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            fields: SyncedFields::transform(),
            send_on_change_only: false,
            reliability: Reliability::Unreliable,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError<E: fmt::Display> {
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    #[error("transport error: {0}")]
    Transport(E),
}

/// Sender side of one replicated object: change gate, wire encoding, send.
#[derive(Debug)]
pub struct SnapshotPublisher<C = AlwaysChanged> {
    config: PublisherConfig,
    gate: ChangeGate<C>,
    sent: u64,
    suppressed: u64,
}

impl SnapshotPublisher<AlwaysChanged> {
    pub fn new(config: PublisherConfig) -> Self {
        let send_on_change_only = config.send_on_change_only;
        Self {
            config,
            gate: ChangeGate::new(send_on_change_only),
            sent: 0,
            suppressed: 0,
        }
    }
}

impl<C: SnapshotComparator> SnapshotPublisher<C> {
    pub fn with_comparator(config: PublisherConfig, comparator: C) -> Self {
        let send_on_change_only = config.send_on_change_only;
        Self {
            config,
            gate: ChangeGate::with_comparator(send_on_change_only, comparator),
            sent: 0,
            suppressed: 0,
        }
    }

    /// Runs one sampled snapshot through the gate and, if it passes, encodes
    /// the enabled fields and hands the payload to the transport. Returns
    /// whether anything was sent.
    pub fn publish<T: Transport>(
        &mut self,
        snapshot: &Snapshot,
        transport: &mut T,
    ) -> Result<bool, PublishError<T::Error>> {
        if !self.gate.should_send(snapshot) {
            self.suppressed += 1;
            return Ok(false);
        }

        let update = StateUpdate::from_snapshot(snapshot, self.config.fields);
        let payload = update.encode()?;
        transport
            .send(self.config.channel, &payload, self.config.reliability)
            .map_err(PublishError::Transport)?;
        self.sent += 1;
        Ok(true)
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }
}

/// Receiver-side glue: decodes an incoming payload and buffers it on the
/// interpolator. Returns whether the snapshot was accepted (stale arrivals
/// are dropped by the ring, not errors).
pub fn apply_update(interpolator: &mut Interpolator, payload: &[u8]) -> Result<bool, WireError> {
    let update = StateUpdate::decode(payload)?;
    Ok(interpolator.push(update.to_snapshot()))
}
