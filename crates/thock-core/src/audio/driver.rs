//! Hardware driver abstraction
//!
//! The driver owns the stream and its buffer pool; it never mixes. Whatever
//! produces audio is injected as a [`RenderSource`] when the stream starts,
//! and the driver calls it once per block from the real-time thread.
//!
//! Two implementations exist:
//! - **CpalDriver**: real output through cpal (see `cpal_backend`)
//! - **NullDriver**: no hardware, for headless runs and tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use super::config::AudioConfig;
use super::error::{AudioError, AudioResult};
use crate::types::{Sample, CHANNELS, FALLBACK_SAMPLE_RATE};

/// Producer of interleaved stereo blocks, called from the real-time thread
///
/// `out` is `frames * 2` samples long and its contents are unspecified on
/// entry; implementations must overwrite every sample. Must not block for
/// unbounded time, allocate or perform I/O.
pub trait RenderSource: Send + 'static {
    fn render(&mut self, out: &mut [Sample]);
}

/// A hardware (or simulated) output stream
pub trait OutputDriver: Send {
    /// Open the stream described by `config` and start pulling from `source`
    ///
    /// A driver that is already running is stopped first.
    fn start(&mut self, config: &AudioConfig, source: Box<dyn RenderSource>)
        -> AudioResult<StreamInfo>;

    /// Stop the stream and release the buffer pool (no-op when stopped)
    fn stop(&mut self);

    /// Whether a stream is open and still delivering blocks
    ///
    /// Turns false on its own when the stream dies (device unplugged).
    fn is_running(&self) -> bool;
}

/// Negotiated stream parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Name of the device the stream was opened on
    pub device_name: String,
    /// Hardware sample rate
    pub sample_rate: u32,
    /// Device channel count (the engine always renders stereo)
    pub channels: u16,
    /// Frames per rendered block
    pub buffer_frames: u32,
    /// Blocks in the pool
    pub buffer_count: usize,
}

impl StreamInfo {
    /// Duration of one block in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_frames as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Upper bound of pipeline latency if every pool block is queued
    pub fn max_latency_ms(&self) -> f32 {
        self.latency_ms() * self.buffer_count as f32
    }

    /// Time between two render callbacks
    pub fn buffer_period(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_frames as f64 / self.sample_rate as f64)
    }
}

/// Fixed pool of pre-allocated render blocks
///
/// Blocks are handed out round-robin, so nothing is allocated once the
/// stream is running.
pub struct BufferPool {
    blocks: Vec<Vec<Sample>>,
    frames_per_buffer: usize,
    next: usize,
}

impl BufferPool {
    pub fn new(frames_per_buffer: u32, count: usize) -> AudioResult<Self> {
        let alloc_error = || AudioError::BufferAllocation {
            frames: frames_per_buffer,
            count,
        };
        if frames_per_buffer == 0 || count == 0 {
            return Err(alloc_error());
        }

        let len = frames_per_buffer as usize * CHANNELS;
        let mut blocks = Vec::new();
        blocks.try_reserve_exact(count).map_err(|_| alloc_error())?;
        for _ in 0..count {
            let mut block = Vec::new();
            block.try_reserve_exact(len).map_err(|_| alloc_error())?;
            block.resize(len, 0.0);
            blocks.push(block);
        }

        Ok(Self {
            blocks,
            frames_per_buffer: frames_per_buffer as usize,
            next: 0,
        })
    }

    pub fn frames_per_buffer(&self) -> usize {
        self.frames_per_buffer
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Recycle the next block in rotation, sized for at most one buffer
    pub fn next_block(&mut self, frames: usize) -> &mut [Sample] {
        let frames = frames.min(self.frames_per_buffer);
        let index = self.next;
        self.next = (self.next + 1) % self.blocks.len();
        &mut self.blocks[index][..frames * CHANNELS]
    }

    /// Render `frames` frames through `source` in pool-sized chunks
    ///
    /// `sink` receives the frame offset of each chunk and its samples, in order.
    pub fn fill<F>(&mut self, frames: usize, source: &mut dyn RenderSource, mut sink: F)
    where
        F: FnMut(usize, &[Sample]),
    {
        let mut done = 0;
        while done < frames {
            let chunk = (frames - done).min(self.frames_per_buffer);
            let block = self.next_block(chunk);
            source.render(block);
            sink(done, block);
            done += chunk;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Null driver
// ═══════════════════════════════════════════════════════════════════════════

struct NullStream {
    source: Box<dyn RenderSource>,
    pool: BufferPool,
}

#[derive(Default)]
struct NullShared {
    stream: Mutex<Option<NullStream>>,
    running: AtomicBool,
    /// Set when the simulated device goes away mid-stream
    failed: AtomicBool,
    starts: AtomicUsize,
    fail_next_start: AtomicBool,
    #[cfg(test)]
    fail_next_spawn: AtomicBool,
}

impl NullShared {
    fn lock_stream(&self) -> std::sync::MutexGuard<'_, Option<NullStream>> {
        self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.failed.load(Ordering::SeqCst)
    }

    fn render_block(&self) -> Option<Vec<Sample>> {
        if self.failed.load(Ordering::SeqCst) {
            return None;
        }
        let mut guard = self.lock_stream();
        let stream = guard.as_mut()?;
        let frames = stream.pool.frames_per_buffer();
        let mut rendered = Vec::with_capacity(frames * CHANNELS);
        let NullStream { source, pool } = stream;
        pool.fill(frames, source.as_mut(), |_, block| rendered.extend_from_slice(block));
        Some(rendered)
    }
}

struct Ticker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Output driver without hardware
///
/// In manual mode blocks are rendered only when a [`NullProbe`] asks for
/// them; in ticking mode a `null-render` thread pulls one block per buffer
/// period, like a sound card would.
pub struct NullDriver {
    shared: Arc<NullShared>,
    ticking: bool,
    ticker: Option<Ticker>,
}

impl NullDriver {
    /// Driver that renders only on demand through its probe
    pub fn manual() -> Self {
        Self {
            shared: Arc::new(NullShared::default()),
            ticking: false,
            ticker: None,
        }
    }

    /// Driver that renders on its own thread at the buffer period
    pub fn ticking() -> Self {
        Self {
            shared: Arc::new(NullShared::default()),
            ticking: true,
            ticker: None,
        }
    }

    /// Handle for observing and driving this driver from outside the engine
    pub fn probe(&self) -> NullProbe {
        NullProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    fn spawn_ticker(&self, period: Duration) -> AudioResult<Ticker> {
        #[cfg(test)]
        {
            if self.shared.fail_next_spawn.swap(false, Ordering::SeqCst) {
                return Err(AudioError::StreamBuildError(
                    "render thread did not start".to_string(),
                ));
            }
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("null-render".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        shared.render_block();
                    }
                    _ => break,
                }
            })
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;
        Ok(Ticker { stop_tx, handle })
    }
}

impl OutputDriver for NullDriver {
    fn start(
        &mut self,
        config: &AudioConfig,
        source: Box<dyn RenderSource>,
    ) -> AudioResult<StreamInfo> {
        self.stop();

        if self.shared.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(AudioError::StreamBuildError("simulated failure".to_string()));
        }

        let pool = BufferPool::new(config.buffer_frames, config.buffer_count)?;
        let info = StreamInfo {
            device_name: "null".to_string(),
            sample_rate: config.sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE),
            channels: CHANNELS as u16,
            buffer_frames: config.buffer_frames,
            buffer_count: pool.len(),
        };

        // Nothing is published until every fallible step has succeeded
        let ticker = if self.ticking {
            Some(self.spawn_ticker(info.buffer_period())?)
        } else {
            None
        };

        *self.shared.lock_stream() = Some(NullStream { source, pool });
        self.shared.failed.store(false, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        self.ticker = ticker;

        log::debug!("Null stream started ({} frames)", info.buffer_frames);
        Ok(info)
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.stop_tx.send(());
            let _ = ticker.handle.join();
        }
        if self.shared.lock_stream().take().is_some() {
            log::debug!("Null stream stopped");
        }
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.failed.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}

impl Drop for NullDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Test/inspection handle for a [`NullDriver`]
#[derive(Clone)]
pub struct NullProbe {
    shared: Arc<NullShared>,
}

impl NullProbe {
    /// Render one block as the hardware would; None while stopped
    pub fn render_block(&self) -> Option<Vec<Sample>> {
        self.shared.render_block()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// How many times the stream has been started
    pub fn start_count(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    /// Make the next `start` fail as if the device refused the stream
    pub fn fail_next_start(&self) {
        self.shared.fail_next_start.store(true, Ordering::SeqCst);
    }

    /// Kill the running stream as if its device was unplugged
    ///
    /// No more blocks are rendered and the driver reports itself stopped
    /// until it is started again.
    pub fn fail_stream(&self) {
        self.shared.failed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        calls: usize,
    }

    impl RenderSource for Counter {
        fn render(&mut self, out: &mut [Sample]) {
            self.calls += 1;
            out.fill(self.calls as Sample);
        }
    }

    #[test]
    fn test_pool_rejects_empty_geometry() {
        assert!(BufferPool::new(0, 3).is_err());
        assert!(BufferPool::new(256, 0).is_err());
    }

    #[test]
    fn test_pool_recycles_round_robin() {
        let mut pool = BufferPool::new(4, 3).unwrap();
        let first = pool.next_block(4).as_ptr();
        pool.next_block(4);
        pool.next_block(4);
        assert_eq!(pool.next_block(4).as_ptr(), first);
    }

    #[test]
    fn test_pool_fill_splits_large_requests() {
        let mut pool = BufferPool::new(4, 3).unwrap();
        let mut source = Counter { calls: 0 };
        let mut chunks = Vec::new();
        pool.fill(10, &mut source, |offset, block| chunks.push((offset, block.len())));

        assert_eq!(source.calls, 3);
        assert_eq!(chunks, vec![(0, 8), (4, 8), (8, 4)]);
    }

    #[test]
    fn test_null_driver_manual_render() {
        let mut driver = NullDriver::manual();
        let probe = driver.probe();
        assert!(probe.render_block().is_none());

        let config = AudioConfig::new(64, None);
        let info = driver
            .start(&config, Box::new(Counter { calls: 0 }))
            .unwrap();
        assert_eq!(info.sample_rate, FALLBACK_SAMPLE_RATE);
        assert_eq!(info.buffer_count, 3);

        let block = probe.render_block().unwrap();
        assert_eq!(block.len(), 128);
        assert!(block.iter().all(|&s| s == 1.0));

        driver.stop();
        assert!(!probe.is_running());
        assert!(probe.render_block().is_none());
        assert_eq!(probe.start_count(), 1);
    }

    #[test]
    fn test_null_driver_simulated_failure() {
        let mut driver = NullDriver::manual();
        let probe = driver.probe();
        probe.fail_next_start();

        let config = AudioConfig::default();
        assert!(driver.start(&config, Box::new(Counter { calls: 0 })).is_err());
        assert!(!driver.is_running());
        assert!(driver.start(&config, Box::new(Counter { calls: 0 })).is_ok());
    }

    #[test]
    fn test_failed_ticker_spawn_leaves_driver_stopped() {
        let mut driver = NullDriver::ticking();
        let probe = driver.probe();
        driver.shared.fail_next_spawn.store(true, Ordering::SeqCst);

        let config = AudioConfig::new(64, None);
        assert!(driver.start(&config, Box::new(Counter { calls: 0 })).is_err());
        assert!(!driver.is_running());
        assert!(probe.render_block().is_none());
        assert_eq!(probe.start_count(), 0);
        assert!(driver.ticker.is_none());

        driver.start(&config, Box::new(Counter { calls: 0 })).unwrap();
        assert!(driver.is_running());
        assert_eq!(probe.start_count(), 1);
    }

    #[test]
    fn test_stream_failure_stops_until_restart() {
        let mut driver = NullDriver::manual();
        let probe = driver.probe();
        let config = AudioConfig::new(64, None);
        driver.start(&config, Box::new(Counter { calls: 0 })).unwrap();

        probe.fail_stream();
        assert!(!driver.is_running());
        assert!(!probe.is_running());
        assert!(probe.render_block().is_none());

        driver.start(&config, Box::new(Counter { calls: 0 })).unwrap();
        assert!(driver.is_running());
        assert!(probe.render_block().is_some());
    }
}
