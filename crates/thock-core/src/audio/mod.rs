//! Hardware audio output for Thock
//!
//! # Architecture
//!
//! - **Control thread**: starts/stops the stream through an [`OutputDriver`]
//! - **Audio thread**: calls the injected [`RenderSource`] once per block
//! - **Buffer pool**: a fixed number of pre-allocated blocks bounds latency
//!   to roughly `buffer_frames / sample_rate` per queued block
//!
//! # Example Usage
//!
//! ```ignore
//! use thock_core::audio::{AudioConfig, CpalDriver, OutputDriver};
//!
//! let mut driver = CpalDriver::new();
//! let info = driver.start(&AudioConfig::new(256, None), Box::new(source))?;
//! println!("~{:.1}ms per buffer", info.latency_ms());
//! driver.stop();
//! ```

mod config;
mod cpal_backend;
mod device;
mod driver;
mod error;

pub use config::{
    AudioConfig, BufferPreset, DeviceId, DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE,
    MAX_BUFFER_SIZE, MIN_BUFFER_SIZE,
};

pub use cpal_backend::CpalDriver;

pub use device::{
    default_output_device_name, find_device_by_id, get_available_output_devices,
    get_output_devices, DeviceWatcher, OutputDevice,
};

pub use driver::{BufferPool, NullDriver, NullProbe, OutputDriver, RenderSource, StreamInfo};

pub use error::{AudioError, AudioResult};
