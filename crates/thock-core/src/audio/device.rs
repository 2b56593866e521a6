//! Audio device enumeration and monitoring
//!
//! Lists output devices from every available cpal host, resolves device UIDs
//! back to cpal devices, and watches the system default output so the engine
//! can rebuild its stream when the user plugs in headphones.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};
use crossbeam::channel::{self, RecvTimeoutError, Sender};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Get a human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Get a host by its name string
fn get_host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id) == name)
        .and_then(|id| cpal::host_from_id(id).ok())
}

/// Information about an audio output device
#[derive(Debug, Clone)]
pub struct OutputDevice {
    /// Device identifier (includes host info)
    pub id: DeviceId,
    /// Human-readable device name
    pub name: String,
    /// Host backend name (e.g., "ALSA", "CoreAudio")
    pub host: String,
    /// Whether this is the system default device for its host
    pub is_default: bool,
    /// Maximum output channels
    pub max_channels: u16,
}

impl OutputDevice {
    /// UID string accepted by `AudioEngine::configure`
    pub fn uid(&self) -> String {
        self.id.display_label()
    }
}

impl std::fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)
    }
}

/// Get all available audio output devices from ALL hosts
pub fn get_output_devices() -> AudioResult<Vec<OutputDevice>> {
    let mut all_devices: Vec<OutputDevice> = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };

        let host_name_str = host_name(host_id);
        let default_device_name = host
            .default_output_device()
            .and_then(|d: cpal::Device| d.name().ok());

        let devices_iter = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in devices_iter {
            let Ok(name) = device.name() else {
                continue;
            };
            let max_channels = match device.supported_output_configs() {
                Ok(configs) => configs.map(|c| c.channels()).max().unwrap_or(0),
                Err(_) => continue,
            };
            if max_channels == 0 {
                continue;
            }

            all_devices.push(OutputDevice {
                id: DeviceId::with_host(&name, &host_name_str),
                is_default: default_device_name.as_ref() == Some(&name),
                name,
                host: host_name_str.clone(),
                max_channels,
            });
        }
    }

    if all_devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    // Default devices first, then by host, then by name
    all_devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });

    log::info!("Enumerated {} audio output devices", all_devices.len());
    Ok(all_devices)
}

/// Get available devices, logging instead of failing
pub fn get_available_output_devices() -> Vec<OutputDevice> {
    match get_output_devices() {
        Ok(devices) => devices,
        Err(e) => {
            log::warn!("Failed to enumerate audio devices: {}", e);
            Vec::new()
        }
    }
}

/// Find a device by its ID
///
/// Uses the host specified in the DeviceId if available, otherwise
/// searches all available hosts.
pub fn find_device_by_id(id: &DeviceId) -> AudioResult<cpal::Device> {
    if let Some(ref host_name) = id.host {
        if let Some(host) = get_host_by_name(host_name) {
            return host
                .output_devices()
                .map_err(|e| AudioError::ConfigError(e.to_string()))?
                .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
                .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
        }
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        let Ok(mut devices) = host.output_devices() else {
            continue;
        };
        if let Some(device) = devices.find(|d| d.name().ok().as_ref() == Some(&id.name)) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// Get the cpal default output device from the default host
pub fn get_cpal_default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))
}

/// Name of the current system default output device, if any
pub fn default_output_device_name() -> Option<String> {
    cpal::default_host()
        .default_output_device()
        .and_then(|d| d.name().ok())
}

/// Polls the system default output device on a `device-watch` thread
///
/// cpal has no change notifications, so the watcher compares the default
/// device name every `interval` and invokes the callback with the new name
/// when it differs. Dropping the watcher stops the thread.
pub struct DeviceWatcher {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceWatcher {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn spawn<F>(interval: Duration, on_change: F) -> AudioResult<Self>
    where
        F: Fn(Option<String>) + Send + 'static,
    {
        Self::spawn_with_probe(interval, default_output_device_name, on_change)
    }

    /// Like [`DeviceWatcher::spawn`] with a custom way of reading the default device
    pub fn spawn_with_probe<P, F>(interval: Duration, probe: P, on_change: F) -> AudioResult<Self>
    where
        P: Fn() -> Option<String> + Send + 'static,
        F: Fn(Option<String>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("device-watch".to_string())
            .spawn(move || {
                let mut current = probe();
                log::debug!("Watching default output device (current: {:?})", current);
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                    let latest = probe();
                    if latest != current {
                        log::info!("System default output changed: {:?} -> {:?}", current, latest);
                        current = latest.clone();
                        on_change(latest);
                    }
                }
            })
            .map_err(|e| AudioError::ConfigError(e.to_string()))?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }
}

impl Drop for DeviceWatcher {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
