use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::{average_amplitude, Processor};
use crate::sample::Sample;

/// Threshold headroom applied over the measured noise floor.
const CALIBRATION_MARGIN: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    pub enabled: bool,
    /// Average-amplitude threshold below which a frame counts as silence.
    pub threshold: f32,
    /// Frames kept transmitting after the last active one, so word tails
    /// are not clipped.
    pub hangover_frames: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.01,
            hangover_frames: 12,
        }
    }
}

#[derive(Debug)]
struct Shared {
    enabled: AtomicBool,
    threshold: AtomicU32, // f32 bit pattern
    calibration_remaining: AtomicU32,
}

/// Handle for toggling detection and driving calibration from outside the
/// encode worker.
#[derive(Debug, Clone)]
pub struct VadControl {
    shared: Arc<Shared>,
}

impl VadControl {
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    pub fn threshold(&self) -> f32 {
        f32::from_bits(self.shared.threshold.load(Ordering::Relaxed))
    }

    pub fn set_threshold(&self, threshold: f32) {
        self.shared
            .threshold
            .store(threshold.to_bits(), Ordering::Relaxed);
    }

    /// Measures the ambient level over the next `frames` frames and moves
    /// the threshold above it. The speaker should stay quiet meanwhile.
    pub fn calibrate(&self, frames: u32) {
        self.shared
            .calibration_remaining
            .store(frames, Ordering::Relaxed);
    }

    pub fn is_calibrating(&self) -> bool {
        self.shared.calibration_remaining.load(Ordering::Relaxed) > 0
    }
}

/// Suppresses frames whose average amplitude stays under the threshold.
/// Runs last in the built-in block so the meter and calibration observe
/// every frame, including the ones suppressed here.
#[derive(Debug)]
pub struct VoiceActivityDetector {
    shared: Arc<Shared>,
    hangover_frames: u32,
    hangover_left: u32,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                enabled: AtomicBool::new(config.enabled),
                threshold: AtomicU32::new(config.threshold.to_bits()),
                calibration_remaining: AtomicU32::new(0),
            }),
            hangover_frames: config.hangover_frames,
            hangover_left: 0,
        }
    }

    pub fn control(&self) -> VadControl {
        VadControl {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Sample> Processor<T> for VoiceActivityDetector {
    fn process(&mut self, frame: Vec<T>) -> Option<Vec<T>> {
        if !self.shared.enabled.load(Ordering::Relaxed) {
            return Some(frame);
        }

        let threshold = f32::from_bits(self.shared.threshold.load(Ordering::Relaxed));
        if average_amplitude(&frame) >= threshold {
            self.hangover_left = self.hangover_frames;
            return Some(frame);
        }
        if self.hangover_left > 0 {
            self.hangover_left -= 1;
            return Some(frame);
        }
        None
    }
}

/// Accumulates the ambient level while a calibration window is active and
/// retargets the detector threshold when it closes.
#[derive(Debug)]
pub struct VoiceActivityCalibration {
    shared: Arc<Shared>,
    accumulated: f32,
    frames_seen: u32,
}

impl VoiceActivityCalibration {
    pub fn new(control: &VadControl) -> Self {
        Self {
            shared: Arc::clone(&control.shared),
            accumulated: 0.0,
            frames_seen: 0,
        }
    }
}

impl<T: Sample> Processor<T> for VoiceActivityCalibration {
    fn process(&mut self, frame: Vec<T>) -> Option<Vec<T>> {
        let remaining = self.shared.calibration_remaining.load(Ordering::Relaxed);
        if remaining > 0 {
            self.accumulated += average_amplitude(&frame);
            self.frames_seen += 1;

            if remaining == 1 {
                let floor = self.accumulated / self.frames_seen as f32;
                let threshold = floor * CALIBRATION_MARGIN;
                self.shared
                    .threshold
                    .store(threshold.to_bits(), Ordering::Relaxed);
                log::info!(
                    "voice detection calibrated: noise floor {floor:.5}, threshold {threshold:.5}"
                );
                self.accumulated = 0.0;
                self.frames_seen = 0;
            }
            self.shared
                .calibration_remaining
                .store(remaining - 1, Ordering::Relaxed);
        }
        Some(frame)
    }
}
