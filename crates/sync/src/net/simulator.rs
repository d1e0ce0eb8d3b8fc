use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use super::transport::Transport;

/// Loss/latency/jitter model for one simulated link.
#[derive(Debug, Clone, Default)]
pub struct LinkConditions {
    pub enabled: bool,
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl LinkConditions {
    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rand_percent() * 100.0 < self.loss_percent
    }

    pub fn delay(&self) -> Duration {
        if !self.enabled || self.max_latency_ms == 0 {
            return Duration::ZERO;
        }
        let base = self.min_latency_ms;
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let jitter = if self.jitter_ms > 0 {
            (rand_percent() * self.jitter_ms as f32) as u32
        } else {
            0
        };
        Duration::from_millis((base + (rand_percent() * range as f32) as u32 + jitter) as u64)
    }
}

fn rand_percent() -> f32 {
    rand_u64() as f32 / u64::MAX as f32
}

fn rand_u64() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    Instant::now().hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug)]
struct DelayedPayload {
    release_time: Instant,
    channel: u8,
    payload: Vec<u8>,
}

impl PartialEq for DelayedPayload {
    fn eq(&self, other: &Self) -> bool {
        self.release_time == other.release_time
    }
}

impl Eq for DelayedPayload {}

impl PartialOrd for DelayedPayload {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPayload {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.release_time.cmp(&self.release_time)
    }
}

/// In-memory lossy link for tests and the demo binary. Jittered delays make
/// payloads come out reordered, which is exactly what the receive side has
/// to cope with.
#[derive(Debug, Default)]
pub struct LinkSimulator {
    conditions: LinkConditions,
    queue: BinaryHeap<DelayedPayload>,
    delivered: u64,
    dropped: u64,
}

impl LinkSimulator {
    pub fn new(conditions: LinkConditions) -> Self {
        Self {
            conditions,
            queue: BinaryHeap::new(),
            delivered: 0,
            dropped: 0,
        }
    }

    pub fn set_conditions(&mut self, conditions: LinkConditions) {
        self.conditions = conditions;
    }

    pub fn enqueue(&mut self, channel: u8, payload: Vec<u8>) {
        if self.conditions.should_drop() {
            self.dropped += 1;
            return;
        }
        self.queue.push(DelayedPayload {
            release_time: Instant::now() + self.conditions.delay(),
            channel,
            payload,
        });
    }

    /// Payloads whose release time has passed, earliest first.
    pub fn poll(&mut self) -> Vec<(u8, Vec<u8>)> {
        let mut ready = Vec::new();
        let now = Instant::now();
        while let Some(delayed) = self.queue.peek() {
            if delayed.release_time <= now {
                let delayed = self.queue.pop().unwrap();
                self.delivered += 1;
                ready.push((delayed.channel, delayed.payload));
            } else {
                break;
            }
        }
        ready
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Transport for LinkSimulator {
    type Error = Infallible;

    fn send_unreliable(&mut self, channel: u8, payload: &[u8]) -> Result<(), Infallible> {
        self.enqueue(channel, payload.to_vec());
        Ok(())
    }

    /// Reliable sends are still delayed but never dropped.
    fn send_reliable(&mut self, channel: u8, payload: &[u8]) -> Result<(), Infallible> {
        self.queue.push(DelayedPayload {
            release_time: Instant::now() + self.conditions.delay(),
            channel,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_conditions_deliver_immediately() {
        let mut link = LinkSimulator::new(LinkConditions::default());

        link.enqueue(0, vec![1]);
        link.enqueue(0, vec![2]);

        let mut ready = link.poll();
        ready.sort();
        assert_eq!(ready, vec![(0, vec![1]), (0, vec![2])]);
        assert_eq!(link.delivered(), 2);
        assert_eq!(link.pending(), 0);
    }

    #[test]
    fn full_loss_drops_everything_unreliable() {
        let mut link = LinkSimulator::new(LinkConditions {
            enabled: true,
            loss_percent: 100.0,
            ..LinkConditions::default()
        });

        for _ in 0..10 {
            link.enqueue(0, vec![0]);
        }

        assert!(link.poll().is_empty());
        assert_eq!(link.dropped(), 10);
    }

    #[test]
    fn reliable_send_survives_full_loss() {
        let mut link = LinkSimulator::new(LinkConditions {
            enabled: true,
            loss_percent: 100.0,
            ..LinkConditions::default()
        });

        link.send_reliable(1, &[7]).unwrap();

        let ready = link.poll();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0], (1, vec![7]));
    }

    #[test]
    fn delayed_payloads_wait_for_release() {
        let mut link = LinkSimulator::new(LinkConditions {
            enabled: true,
            min_latency_ms: 50,
            max_latency_ms: 50,
            ..LinkConditions::default()
        });

        link.enqueue(0, vec![1]);
        assert!(link.poll().is_empty());
        assert_eq!(link.pending(), 1);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(link.poll().len(), 1);
    }
}
