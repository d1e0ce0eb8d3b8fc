use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::codec::{Decoder, VoiceError, VoiceInfo};
use crate::sample::Sample;

/// Incoming voice streams are keyed by where they come from, not by object
/// identity: the same player can carry several streams on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteVoiceKey {
    pub channel: u8,
    pub player: u32,
    pub voice: u8,
}

/// Receives decoded audio on the decode thread, in strictly increasing
/// sequence order. Lost frames arrive as whatever the decoder produced for
/// them (silence for the built-in codec).
pub trait DecodedSink<T: Sample>: Send + 'static {
    fn on_decoded(&mut self, samples: &[T]);
}

impl<T: Sample, F> DecodedSink<T> for F
where
    F: FnMut(&[T]) + Send + 'static,
{
    fn on_decoded(&mut self, samples: &[T]) {
        self(samples)
    }
}

#[derive(Debug)]
struct QueueInner {
    /// `None` marks a frame lost in transit.
    frames: VecDeque<Option<Vec<u8>>>,
    disposed: bool,
}

struct Shared<T: Sample> {
    queue: Mutex<QueueInner>,
    wake: Condvar,
    sinks: Mutex<Vec<Box<dyn DecodedSink<T>>>>,
    lost: AtomicU64,
    decoded: AtomicU64,
}

/// Incoming audio stream with its own decode thread.
///
/// `receive_frame` runs on the network receipt thread; the decode worker
/// drains the shared queue on its wake signal. Both sides and `dispose`
/// serialize on the queue mutex.
pub struct RemoteVoice<T: Sample> {
    key: RemoteVoiceKey,
    info: VoiceInfo,
    shared: Arc<Shared<T>>,
    last_sequence: u8,
    started: bool,
    received: u64,
    worker: Option<JoinHandle<()>>,
}

impl<T: Sample> RemoteVoice<T> {
    /// Validates the stream description and starts the decode worker.
    pub fn new(
        key: RemoteVoiceKey,
        info: VoiceInfo,
        decoder: impl Decoder<T>,
    ) -> Result<Self, VoiceError> {
        info.validate()?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueInner {
                frames: VecDeque::new(),
                disposed: false,
            }),
            wake: Condvar::new(),
            sinks: Mutex::new(Vec::new()),
            lost: AtomicU64::new(0),
            decoded: AtomicU64::new(0),
        });

        let worker = thread::Builder::new()
            .name(format!("voice-decode-{}-{}", key.player, key.voice))
            .spawn({
                let shared = Arc::clone(&shared);
                move || decode_worker(key, shared, decoder)
            })?;

        Ok(Self {
            key,
            info,
            shared,
            last_sequence: 0,
            started: false,
            received: 0,
            worker: Some(worker),
        })
    }

    /// Registers a playback sink. Frames decoded from now on are delivered
    /// to it in order.
    pub fn add_sink(&self, sink: impl DecodedSink<T>) {
        self.shared.sinks.lock().unwrap().push(Box::new(sink));
    }

    /// Called from the network receipt thread for every arriving frame.
    ///
    /// The gap to the expected sequence number (1-byte wraparound) is filled
    /// with lost-frame placeholders ahead of the real frame, so delivery
    /// order is the sequence order. Frames from behind the current playback
    /// point would reorder the stream and are dropped instead.
    pub fn receive_frame(&mut self, payload: &[u8], sequence: u8) {
        let mut inner = self.shared.queue.lock().unwrap();
        if inner.disposed {
            return;
        }

        if self.started {
            let expected = self.last_sequence.wrapping_add(1);
            let gap = sequence.wrapping_sub(expected);
            if gap >= 128 {
                log::debug!(
                    "voice {:?}: dropping late frame {} (expected {})",
                    self.key,
                    sequence,
                    expected
                );
                return;
            }
            if gap > 0 {
                for _ in 0..gap {
                    inner.frames.push_back(None);
                }
                self.shared.lost.fetch_add(gap as u64, Ordering::Relaxed);
                log::debug!(
                    "voice {:?}: {} frame(s) lost before {}",
                    self.key,
                    gap,
                    sequence
                );
            }
        }

        self.started = true;
        self.last_sequence = sequence;
        self.received += 1;
        inner.frames.push_back(Some(payload.to_vec()));
        self.shared.wake.notify_one();
    }

    pub fn key(&self) -> RemoteVoiceKey {
        self.key
    }

    pub fn info(&self) -> &VoiceInfo {
        &self.info
    }

    /// Frames received intact.
    pub fn received_frames(&self) -> u64 {
        self.received
    }

    /// Placeholders enqueued for frames that never arrived.
    pub fn lost_frames(&self) -> u64 {
        self.shared.lost.load(Ordering::Relaxed)
    }

    /// Frames (including placeholders) delivered to sinks so far.
    pub fn decoded_frames(&self) -> u64 {
        self.shared.decoded.load(Ordering::Relaxed)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.queue.lock().unwrap().disposed
    }

    /// Stops the decode worker, dropping whatever is still queued. Safe to
    /// call more than once; frames received afterwards are discarded.
    pub fn dispose(&mut self) {
        {
            let mut inner = self.shared.queue.lock().unwrap();
            inner.disposed = true;
            inner.frames.clear();
        }
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("voice {:?} decode worker panicked", self.key);
            }
        }
    }
}

impl<T: Sample> Drop for RemoteVoice<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn decode_worker<T: Sample>(
    key: RemoteVoiceKey,
    shared: Arc<Shared<T>>,
    mut decoder: impl Decoder<T>,
) {
    loop {
        let batch: Vec<Option<Vec<u8>>> = {
            let mut inner = shared.queue.lock().unwrap();
            loop {
                if inner.disposed {
                    return;
                }
                if !inner.frames.is_empty() {
                    break inner.frames.drain(..).collect();
                }
                inner = shared.wake.wait(inner).unwrap();
            }
        };

        for frame in batch {
            match decoder.decode(frame.as_deref()) {
                Ok(samples) => {
                    shared.decoded.fetch_add(1, Ordering::Relaxed);
                    let mut sinks = shared.sinks.lock().unwrap();
                    for sink in sinks.iter_mut() {
                        sink.on_decoded(&samples);
                    }
                }
                Err(err) => {
                    log::error!("voice {key:?}: decoder failed, stopping stream: {err}");
                    shared.queue.lock().unwrap().disposed = true;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawPcmDecoder;
    use std::time::{Duration, Instant};

    fn test_key() -> RemoteVoiceKey {
        RemoteVoiceKey {
            channel: 0,
            player: 7,
            voice: 1,
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let start = Instant::now();
        while !done() {
            assert!(
                start.elapsed() < Duration::from_secs(2),
                "timed out waiting for decode worker"
            );
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn sequence_gap_enqueues_placeholders() {
        let mut voice: RemoteVoice<i16> =
            RemoteVoice::new(test_key(), VoiceInfo::raw_pcm(8000, 1, 2), RawPcmDecoder::new(2))
                .unwrap();

        voice.receive_frame(&[1, 0, 2, 0], 5);
        voice.receive_frame(&[3, 0, 4, 0], 8);

        wait_until(|| voice.decoded_frames() == 4);

        // Expected next was 6; frames 6 and 7 became placeholders.
        assert_eq!(voice.lost_frames(), 2);
        assert_eq!(voice.received_frames(), 2);
    }

    #[test]
    fn wraparound_gap_is_counted_correctly() {
        let mut voice: RemoteVoice<i16> =
            RemoteVoice::new(test_key(), VoiceInfo::raw_pcm(8000, 1, 2), RawPcmDecoder::new(2))
                .unwrap();

        voice.receive_frame(&[0, 0, 0, 0], 254);
        voice.receive_frame(&[0, 0, 0, 0], 1); // 255 and 0 went missing

        wait_until(|| voice.decoded_frames() == 4);
        assert_eq!(voice.lost_frames(), 2);
    }

    #[test]
    fn late_frame_is_dropped_not_reordered() {
        let mut voice: RemoteVoice<i16> =
            RemoteVoice::new(test_key(), VoiceInfo::raw_pcm(8000, 1, 2), RawPcmDecoder::new(2))
                .unwrap();

        voice.receive_frame(&[0, 0, 0, 0], 10);
        voice.receive_frame(&[0, 0, 0, 0], 11);
        voice.receive_frame(&[9, 9, 9, 9], 5); // stale

        wait_until(|| voice.decoded_frames() == 2);
        assert_eq!(voice.received_frames(), 2);
        assert_eq!(voice.lost_frames(), 0);
    }

    #[test]
    fn decoded_frames_reach_sinks_in_order() {
        let mut voice: RemoteVoice<i16> =
            RemoteVoice::new(test_key(), VoiceInfo::raw_pcm(8000, 1, 2), RawPcmDecoder::new(2))
                .unwrap();

        let received: Arc<Mutex<Vec<Vec<i16>>>> = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&received);
        voice.add_sink(move |samples: &[i16]| writer.lock().unwrap().push(samples.to_vec()));

        voice.receive_frame(&[1, 0, 1, 0], 0);
        voice.receive_frame(&[2, 0, 2, 0], 2); // frame 1 lost

        wait_until(|| voice.decoded_frames() == 3);

        let frames = received.lock().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![1, 1]);
        assert_eq!(frames[1], vec![0, 0]); // silence placeholder
        assert_eq!(frames[2], vec![2, 2]);
    }

    #[test]
    fn dispose_is_idempotent_and_stops_delivery() {
        let mut voice: RemoteVoice<i16> =
            RemoteVoice::new(test_key(), VoiceInfo::raw_pcm(8000, 1, 2), RawPcmDecoder::new(2))
                .unwrap();

        let received: Arc<Mutex<Vec<Vec<i16>>>> = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&received);
        voice.add_sink(move |samples: &[i16]| writer.lock().unwrap().push(samples.to_vec()));

        voice.receive_frame(&[1, 0, 1, 0], 0);
        wait_until(|| voice.decoded_frames() == 1);

        voice.dispose();
        voice.dispose();
        assert!(voice.is_disposed());

        voice.receive_frame(&[2, 0, 2, 0], 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn invalid_info_fails_before_starting_a_worker() {
        let result: Result<RemoteVoice<i16>, _> =
            RemoteVoice::new(test_key(), VoiceInfo::raw_pcm(0, 1, 2), RawPcmDecoder::new(2));
        assert!(matches!(result, Err(VoiceError::InvalidInfo(_))));
    }
}
