use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::codec::{Encoder, VoiceError, VoiceInfo};
use crate::framer::Framer;
use crate::processor::Pipeline;
use crate::queue::{PushQueue, DEFAULT_QUEUE_CAPACITY};
use crate::sample::Sample;

/// Receives encoded frames ready for transmission, tagged with a wrapping
/// 1-byte sequence number. Implemented by the host's transport glue; runs
/// on the encode worker thread.
pub trait FrameSink: Send + 'static {
    fn send_frame(&mut self, payload: &[u8], sequence: u8);
}

impl<F> FrameSink for F
where
    F: FnMut(&[u8], u8) + Send + 'static,
{
    fn send_frame(&mut self, payload: &[u8], sequence: u8) {
        self(payload, sequence)
    }
}

#[derive(Debug, Default)]
struct Counters {
    frames_sent: AtomicU64,
    frames_suppressed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalVoiceCounters {
    pub frames_sent: u64,
    /// Frames the processor chain decided not to transmit.
    pub frames_suppressed: u64,
    /// Capture buffers dropped because the encode worker fell behind.
    pub buffers_skipped: u64,
}

/// Outgoing audio stream: capture buffers go in on the producer side, the
/// owned encode worker frames, processes, encodes and hands payloads to the
/// sink. The capture thread never blocks and never touches the encoder.
pub struct LocalVoice<T: Sample> {
    id: u8,
    channel: u8,
    info: VoiceInfo,
    group: u8,
    transmit: Arc<AtomicBool>,
    queue: PushQueue<T>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Sample> LocalVoice<T> {
    /// Validates the stream description and starts the encode worker.
    /// A bad description fails here, before any thread exists.
    pub fn new(
        id: u8,
        channel: u8,
        info: VoiceInfo,
        pipeline: Pipeline<T>,
        encoder: impl Encoder<T>,
        sink: impl FrameSink,
    ) -> Result<Self, VoiceError> {
        info.validate()?;

        let queue = PushQueue::new(DEFAULT_QUEUE_CAPACITY);
        let counters = Arc::new(Counters::default());

        let worker = thread::Builder::new()
            .name(format!("voice-encode-{id}"))
            .spawn({
                let queue = queue.clone();
                let counters = Arc::clone(&counters);
                let frame_size = info.frame_size;
                move || encode_worker(id, channel, frame_size, queue, counters, pipeline, encoder, sink)
            })?;

        Ok(Self {
            id,
            channel,
            info,
            group: 0,
            transmit: Arc::new(AtomicBool::new(true)),
            queue,
            counters,
            worker: Some(worker),
        })
    }

    /// Producer side, called from the capture thread with buffers of any
    /// length. Never blocks; with transmission off the input is discarded.
    pub fn push_audio(&self, samples: &[T]) {
        if !self.transmit.load(Ordering::Relaxed) {
            return;
        }
        self.queue.push(samples.to_vec());
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn info(&self) -> &VoiceInfo {
        &self.info
    }

    pub fn group(&self) -> u8 {
        self.group
    }

    pub fn set_group(&mut self, group: u8) {
        self.group = group;
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmit.load(Ordering::Relaxed)
    }

    pub fn set_transmit(&self, transmit: bool) {
        self.transmit.store(transmit, Ordering::Relaxed);
    }

    pub fn counters(&self) -> LocalVoiceCounters {
        LocalVoiceCounters {
            frames_sent: self.counters.frames_sent.load(Ordering::Relaxed),
            frames_suppressed: self.counters.frames_suppressed.load(Ordering::Relaxed),
            buffers_skipped: self.queue.skipped(),
        }
    }

    /// Stops the encode worker and releases queued buffers. Safe to call
    /// more than once; pushes after the first call are discarded.
    pub fn dispose(&mut self) {
        self.queue.dispose();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("voice {} encode worker panicked", self.id);
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.queue.is_disposed()
    }
}

impl<T: Sample> Drop for LocalVoice<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[allow(clippy::too_many_arguments)]
fn encode_worker<T: Sample>(
    id: u8,
    channel: u8,
    frame_size: usize,
    queue: PushQueue<T>,
    counters: Arc<Counters>,
    mut pipeline: Pipeline<T>,
    mut encoder: impl Encoder<T>,
    mut sink: impl FrameSink,
) {
    let mut framer = Framer::new(frame_size);
    let mut sequence: u8 = 0;

    while let Some(buffers) = queue.wait_drain() {
        for buffer in buffers {
            let mut frames = Vec::new();
            framer.frame(&buffer, |frame| frames.push(frame.to_vec()));

            for frame in frames {
                let frame = match pipeline.process(frame) {
                    Some(frame) => frame,
                    None => {
                        counters.frames_suppressed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                };
                match encoder.encode(&frame) {
                    Ok(payload) => {
                        sink.send_frame(&payload, sequence);
                        sequence = sequence.wrapping_add(1);
                        counters.frames_sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        log::error!(
                            "voice {id} channel {channel}: encoder failed, stopping stream: {err}"
                        );
                        queue.dispose();
                        return;
                    }
                }
            }
        }
    }
}
