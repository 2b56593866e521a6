//! Decoded PCM sounds
//!
//! Every file is decoded once, at its own sample rate, into interleaved
//! stereo f32. Mono sources are duplicated into both channels, sources with
//! more than two channels keep their first two.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{Sample, StereoSample, FALLBACK_SAMPLE_RATE};

/// File extensions the library will try to decode
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["wav", "mp3", "flac", "ogg", "m4a"];

/// Errors decoding a single file
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio track found")]
    NoTrack,

    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(usize),
}

/// An immutable decoded sound
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSound {
    name: String,
    sample_rate: u32,
    frames: Vec<StereoSample>,
}

impl DecodedSound {
    pub fn new(name: impl Into<String>, sample_rate: u32, frames: Vec<StereoSample>) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            frames,
        }
    }

    /// Fold interleaved mono or multi-channel samples to stereo
    pub fn from_interleaved(
        name: impl Into<String>,
        sample_rate: u32,
        channels: usize,
        samples: &[Sample],
    ) -> Result<Self, DecodeError> {
        let frames = match channels {
            0 => return Err(DecodeError::UnsupportedChannels(0)),
            1 => samples.iter().map(|&s| StereoSample::mono(s)).collect(),
            n => samples
                .chunks_exact(n)
                .map(|frame| StereoSample::new(frame[0], frame[1]))
                .collect(),
        };
        Ok(Self::new(name, sample_rate, frames))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file's own sample rate (playback does not convert it)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> &[StereoSample] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`]
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Decode an audio file to stereo f32 using Symphonia
pub fn decode_file(path: &Path) -> Result<DecodedSound, DecodeError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<Sample>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("{}: error reading packet: {}", name, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("{}: error decoding packet: {}", name, e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let sound = DecodedSound::from_interleaved(name, sample_rate, channels, &samples)?;
    log::debug!(
        "Decoded {} ({} frames @ {}Hz, {} ch)",
        sound.name(),
        sound.frame_count(),
        sample_rate,
        channels
    );
    Ok(sound)
}
