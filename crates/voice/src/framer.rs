/// Repacks arbitrary-length sample buffers into fixed-size frames.
///
/// Leftover samples are carried across calls, so the framer is stateful and
/// not restartable mid-stream without `reset`. Input that lands exactly on
/// the frame size with nothing carried is handed through without copying.
#[derive(Debug)]
pub struct Framer<T> {
    frame_size: usize,
    carry: Vec<T>,
}

impl<T: Copy> Framer<T> {
    pub fn new(frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame size must be non-zero");
        Self {
            frame_size,
            carry: Vec::with_capacity(frame_size),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples currently buffered waiting for the next call.
    pub fn carried(&self) -> usize {
        self.carry.len()
    }

    /// Appends `input` and emits every complete frame now available.
    pub fn frame(&mut self, input: &[T], mut sink: impl FnMut(&[T])) {
        if self.carry.is_empty() && input.len() == self.frame_size {
            sink(input);
            return;
        }

        let mut rest = input;
        if !self.carry.is_empty() {
            let missing = self.frame_size - self.carry.len();
            let take = missing.min(rest.len());
            self.carry.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.carry.len() < self.frame_size {
                return;
            }
            sink(&self.carry);
            self.carry.clear();
        }

        let mut chunks = rest.chunks_exact(self.frame_size);
        for chunk in &mut chunks {
            sink(chunk);
        }
        self.carry.extend_from_slice(chunks.remainder());
    }

    /// Discards carried samples.
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}
