//! Change notifications pushed into the engine by collaborators

use std::time::Duration;

/// A settings or device change the engine must react to
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// User selected another output device (None = system default)
    DeviceChanged(Option<String>),
    /// User selected another buffer size (frames)
    BufferSizeChanged(u32),
    /// User changed the idle timeout (zero disables auto-stop)
    IdleTimeoutChanged(Duration),
    /// The operating system switched its default output device
    SystemDefaultDeviceChanged,
}
