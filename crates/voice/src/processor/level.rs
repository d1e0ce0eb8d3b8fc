use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::{average_amplitude, Processor};
use crate::sample::Sample;

#[derive(Debug, Default)]
struct Shared {
    // f32 bit patterns
    peak: AtomicU32,
    avg: AtomicU32,
}

/// Live amplitude readings of the stream, readable from any thread.
#[derive(Debug, Clone)]
pub struct LevelReadout {
    shared: Arc<Shared>,
}

impl LevelReadout {
    pub fn peak_amplitude(&self) -> f32 {
        f32::from_bits(self.shared.peak.load(Ordering::Relaxed))
    }

    pub fn avg_amplitude(&self) -> f32 {
        f32::from_bits(self.shared.avg.load(Ordering::Relaxed))
    }
}

/// Measures per-frame peak and average amplitude. Observes every frame,
/// never modifies or suppresses one.
#[derive(Debug, Default)]
pub struct LevelMeter {
    shared: Arc<Shared>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readout(&self) -> LevelReadout {
        LevelReadout {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Sample> Processor<T> for LevelMeter {
    fn process(&mut self, frame: Vec<T>) -> Option<Vec<T>> {
        let peak = frame
            .iter()
            .map(|s| s.to_f32().abs())
            .fold(0.0f32, f32::max);
        self.shared.peak.store(peak.to_bits(), Ordering::Relaxed);
        self.shared
            .avg
            .store(average_amplitude(&frame).to_bits(), Ordering::Relaxed);
        Some(frame)
    }
}
