//! Deferred freeing of decoded sounds
//!
//! Every sound in the library is a [`SharedSound`], and each voice holds a
//! clone of it. Loading a new pack replaces the library map while voices of
//! the old pack may still be sounding; the last clone is then dropped by the
//! render callback when that voice finishes, or when the mixer evicts it to
//! make room. Freeing a decoded sample buffer there would stall the audio
//! thread, so the drop only queues the pointer and the `audio-gc` thread
//! frees it.
//!
//! ```ignore
//! let sound = share_sound(decode_file(path)?);
//! mixer.enqueue(sound.clone(), 0.0);
//! drop(sound); // the voice is now the last owner
//! ```

use basedrop::{Collector, Handle, Shared};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use super::sound::DecodedSound;

/// A decoded sound that may be dropped on the render thread
pub type SharedSound = Shared<DecodedSound>;

/// Key sounds are tens of kilobytes, so a lazy sweep is plenty
const COLLECT_INTERVAL: Duration = Duration::from_millis(250);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn start_collector() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, it has to live on the thread that sweeps it
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::debug!("Audio GC thread started");
            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    let handle = match spawned {
        Ok(_) => rx.recv().ok(),
        Err(e) => {
            log::error!("Failed to spawn audio GC thread: {}", e);
            None
        }
    };

    handle.unwrap_or_else(|| {
        // Nothing will ever sweep this collector: released sounds leak
        // instead of being freed on the audio thread.
        log::warn!("Released sounds will not be freed until exit");
        let collector = Collector::new();
        let handle = collector.handle();
        std::mem::forget(collector);
        handle
    })
}

/// Handle to the process-wide collector, starting it on first use
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(start_collector).clone()
}

/// Move a decoded sound into collector-owned storage
pub fn share_sound(sound: DecodedSound) -> SharedSound {
    Shared::new(&gc_handle(), sound)
}
