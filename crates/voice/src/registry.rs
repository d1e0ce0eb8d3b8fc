use std::collections::HashMap;

use crate::codec::{Decoder, VoiceError, VoiceInfo};
use crate::remote::{RemoteVoice, RemoteVoiceKey};
use crate::sample::Sample;

/// Allocates outgoing stream ids from the 1..=255 space, recycling released
/// ones. Id 0 is never handed out.
#[derive(Debug)]
pub struct VoiceIdPool {
    in_use: [bool; 256],
    next: u8,
}

impl Default for VoiceIdPool {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceIdPool {
    pub fn new() -> Self {
        Self {
            in_use: [false; 256],
            next: 1,
        }
    }

    pub fn allocate(&mut self) -> Result<u8, VoiceError> {
        let start = self.next;
        let mut candidate = start;
        loop {
            if !self.in_use[candidate as usize] {
                self.in_use[candidate as usize] = true;
                self.next = if candidate == 255 { 1 } else { candidate + 1 };
                return Ok(candidate);
            }
            candidate = if candidate == 255 { 1 } else { candidate + 1 };
            if candidate == start {
                return Err(VoiceError::IdsExhausted);
            }
        }
    }

    pub fn release(&mut self, id: u8) {
        if id == 0 || !self.in_use[id as usize] {
            log::debug!("released voice id {id} was not in use");
            return;
        }
        self.in_use[id as usize] = false;
    }

    pub fn is_allocated(&self, id: u8) -> bool {
        self.in_use[id as usize]
    }

    pub fn allocated_count(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }
}

/// Incoming streams of one client, keyed by (channel, player, voice).
pub struct RemoteVoiceRegistry<T: Sample> {
    voices: HashMap<RemoteVoiceKey, RemoteVoice<T>>,
}

impl<T: Sample> Default for RemoteVoiceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Sample> RemoteVoiceRegistry<T> {
    pub fn new() -> Self {
        Self {
            voices: HashMap::new(),
        }
    }

    /// Creates the voice unless the key is already live. Duplicate
    /// announcements show up when a channel is rejoined; they are logged
    /// and ignored, not an error. Returns whether a new voice was created.
    pub fn announce<D: Decoder<T>>(
        &mut self,
        key: RemoteVoiceKey,
        info: VoiceInfo,
        decoder: impl FnOnce() -> D,
    ) -> Result<bool, VoiceError> {
        if self.voices.contains_key(&key) {
            log::info!("duplicate announce for voice {key:?}, ignoring");
            return Ok(false);
        }
        let voice = RemoteVoice::new(key, info, decoder())?;
        self.voices.insert(key, voice);
        Ok(true)
    }

    /// Routes an incoming frame to its stream. Frames for unknown streams
    /// are dropped with a log line.
    pub fn receive_frame(&mut self, key: RemoteVoiceKey, payload: &[u8], sequence: u8) -> bool {
        match self.voices.get_mut(&key) {
            Some(voice) => {
                voice.receive_frame(payload, sequence);
                true
            }
            None => {
                log::debug!("frame for unknown voice {key:?}, dropping");
                false
            }
        }
    }

    pub fn get(&self, key: &RemoteVoiceKey) -> Option<&RemoteVoice<T>> {
        self.voices.get(key)
    }

    pub fn get_mut(&mut self, key: &RemoteVoiceKey) -> Option<&mut RemoteVoice<T>> {
        self.voices.get_mut(key)
    }

    /// Disposes and removes the stream. Returns whether it existed.
    pub fn remove(&mut self, key: &RemoteVoiceKey) -> bool {
        match self.voices.remove(key) {
            Some(mut voice) => {
                voice.dispose();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn dispose_all(&mut self) {
        for (_, mut voice) in self.voices.drain() {
            voice.dispose();
        }
    }
}
