//! Single-shot idle timer
//!
//! Runs on its own `idle-timer` thread fed by a channel. Every arm or cancel
//! bumps a generation counter; the fire callback receives the generation it
//! was armed with so the engine can discard fires that were superseded while
//! it was waiting for its lock.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

enum TimerCommand {
    Arm { generation: u64, timeout: Duration },
    Cancel,
    Shutdown,
}

/// Control side of the idle timer
pub struct IdleTimer {
    tx: Sender<TimerCommand>,
    generation: AtomicU64,
}

/// Thread side of the idle timer, consumed by [`IdleTimerWorker::spawn`]
pub struct IdleTimerWorker {
    rx: Receiver<TimerCommand>,
}

impl IdleTimer {
    /// Create the timer; nothing fires until the worker is spawned
    pub fn new() -> (Self, IdleTimerWorker) {
        let (tx, rx) = channel::unbounded();
        let timer = Self {
            tx,
            generation: AtomicU64::new(0),
        };
        (timer, IdleTimerWorker { rx })
    }

    /// (Re)start the countdown; a zero timeout disables the timer
    pub fn arm(&self, timeout: Duration) {
        if timeout.is_zero() {
            self.cancel();
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.tx.send(TimerCommand::Arm {
            generation,
            timeout,
        });
    }

    /// Cancel a pending countdown
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(TimerCommand::Cancel);
    }

    /// Whether `generation` is the most recent arm
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Stop the worker thread
    pub fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(TimerCommand::Shutdown);
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        // Not joined: the last engine handle may be dropped on the timer thread itself
        let _ = self.tx.send(TimerCommand::Shutdown);
    }
}

impl IdleTimerWorker {
    /// Spawn the `idle-timer` thread; `on_fire` runs on it
    pub fn spawn<F>(self, on_fire: F) -> io::Result<JoinHandle<()>>
    where
        F: Fn(u64) + Send + 'static,
    {
        let rx = self.rx;
        thread::Builder::new()
            .name("idle-timer".to_string())
            .spawn(move || {
                let mut pending: Option<(Instant, u64)> = None;
                loop {
                    let command = match pending {
                        Some((deadline, generation)) => match rx.recv_deadline(deadline) {
                            Ok(command) => command,
                            Err(RecvTimeoutError::Timeout) => {
                                pending = None;
                                on_fire(generation);
                                continue;
                            }
                            Err(RecvTimeoutError::Disconnected) => break,
                        },
                        None => match rx.recv() {
                            Ok(command) => command,
                            Err(_) => break,
                        },
                    };

                    match command {
                        TimerCommand::Arm {
                            generation,
                            timeout,
                        } => pending = Some((Instant::now() + timeout, generation)),
                        TimerCommand::Cancel => pending = None,
                        TimerCommand::Shutdown => break,
                    }
                }
                log::debug!("Idle timer thread exiting");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn spawn_recording() -> (IdleTimer, Arc<Mutex<Vec<u64>>>, JoinHandle<()>) {
        let (timer, worker) = IdleTimer::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let fired_cb = Arc::clone(&fired);
        let handle = worker
            .spawn(move |generation| fired_cb.lock().unwrap().push(generation))
            .unwrap();
        (timer, fired, handle)
    }

    #[test]
    fn test_fires_once_after_timeout() {
        let (timer, fired, handle) = spawn_recording();
        timer.arm(Duration::from_millis(20));
        thread::sleep(Duration::from_millis(120));

        let fired = fired.lock().unwrap().clone();
        assert_eq!(fired.len(), 1);
        assert!(timer.is_current(fired[0]));

        timer.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn test_rearm_postpones_and_supersedes() {
        let (timer, fired, handle) = spawn_recording();
        timer.arm(Duration::from_millis(60));
        thread::sleep(Duration::from_millis(20));
        timer.arm(Duration::from_millis(60));
        thread::sleep(Duration::from_millis(200));

        let fired = fired.lock().unwrap().clone();
        assert_eq!(fired, vec![2]);

        timer.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn test_cancel_and_zero_timeout_never_fire() {
        let (timer, fired, handle) = spawn_recording();
        timer.arm(Duration::from_millis(20));
        timer.cancel();
        timer.arm(Duration::ZERO);
        thread::sleep(Duration::from_millis(100));

        assert!(fired.lock().unwrap().is_empty());

        timer.shutdown();
        handle.join().unwrap();
    }
}
