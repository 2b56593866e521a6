//! Trigger-to-render latency instrumentation
//!
//! The render thread records when each voice produced its first block and
//! pushes the sample into a wait-free ring buffer. The control plane drains
//! it and logs under the `thock::latency` target. A full queue drops samples.

use std::time::{Duration, Instant};

/// Capacity of the render-thread queue
pub const LATENCY_QUEUE_CAPACITY: usize = 256;

const LOG_TARGET: &str = "thock::latency";

/// One voice's path from `play()` to its first rendered block
#[derive(Debug, Clone, Copy)]
pub struct LatencySample {
    pub voice_id: u64,
    pub enqueued_at: Instant,
    pub started_at: Instant,
}

impl LatencySample {
    pub fn latency(&self) -> Duration {
        self.started_at.saturating_duration_since(self.enqueued_at)
    }
}

/// Create the render-thread producer and control-plane consumer
pub fn latency_channel() -> (rtrb::Producer<LatencySample>, rtrb::Consumer<LatencySample>) {
    rtrb::RingBuffer::new(LATENCY_QUEUE_CAPACITY)
}

/// Aggregates latency samples from the current stream
#[derive(Default)]
pub struct LatencyTracker {
    consumer: Option<rtrb::Consumer<LatencySample>>,
    hardware_latency_ms: f32,
    count: u64,
    total_ms: f64,
    max_ms: f64,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow a new stream; statistics carry over
    pub fn attach(&mut self, consumer: rtrb::Consumer<LatencySample>, hardware_latency_ms: f32) {
        self.consumer = Some(consumer);
        self.hardware_latency_ms = hardware_latency_ms;
        log::debug!(target: LOG_TARGET, "Hardware buffer latency {:.2} ms", hardware_latency_ms);
    }

    pub fn detach(&mut self) {
        self.consumer = None;
    }

    /// Pull every pending sample, returning how many were read
    pub fn drain(&mut self) -> usize {
        let Some(consumer) = self.consumer.as_mut() else {
            return 0;
        };

        let mut drained = 0;
        while let Ok(sample) = consumer.pop() {
            let measured_ms = sample.latency().as_secs_f64() * 1000.0;
            log::debug!(
                target: LOG_TARGET,
                "voice {}: {:.2} ms to first block, ~{:.2} ms with hardware buffer",
                sample.voice_id,
                measured_ms,
                measured_ms + self.hardware_latency_ms as f64
            );
            self.count += 1;
            self.total_ms += measured_ms;
            self.max_ms = self.max_ms.max(measured_ms);
            drained += 1;
        }
        drained
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean trigger-to-first-block latency, excluding the hardware buffer
    pub fn average_ms(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_ms / self.count as f64)
    }

    pub fn max_ms(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max_ms)
    }

    pub fn hardware_latency_ms(&self) -> f32 {
        self.hardware_latency_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_aggregates() {
        let (mut producer, consumer) = latency_channel();
        let mut tracker = LatencyTracker::new();
        assert_eq!(tracker.drain(), 0);
        tracker.attach(consumer, 5.0);

        let t0 = Instant::now();
        for (id, ms) in [(1, 2), (2, 4)] {
            producer
                .push(LatencySample {
                    voice_id: id,
                    enqueued_at: t0,
                    started_at: t0 + Duration::from_millis(ms),
                })
                .unwrap();
        }

        assert_eq!(tracker.drain(), 2);
        assert_eq!(tracker.count(), 2);
        assert!((tracker.average_ms().unwrap() - 3.0).abs() < 1e-6);
        assert!((tracker.max_ms().unwrap() - 4.0).abs() < 1e-6);
        assert_eq!(tracker.hardware_latency_ms(), 5.0);
    }

    #[test]
    fn test_full_queue_drops() {
        let (mut producer, _consumer) = latency_channel();
        let now = Instant::now();
        let sample = LatencySample {
            voice_id: 0,
            enqueued_at: now,
            started_at: now,
        };
        for _ in 0..LATENCY_QUEUE_CAPACITY {
            producer.push(sample).unwrap();
        }
        assert!(producer.push(sample).is_err());
    }
}
