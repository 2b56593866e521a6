//! Pitch-shift resampling
//!
//! Pitch is applied by reading the source faster or slower
//! (`rate = 2^(semitones / 12)`) with linear interpolation between frames.
//! That is not band-limited; aliasing on shifted keystrokes is accepted in
//! exchange for a handful of flops per frame. Unshifted voices take a copy
//! path so they reproduce the source exactly.

use super::voice::Voice;
use crate::types::{Sample, StereoSample};

/// Largest pitch offset applied to a voice, in semitones (four octaves)
pub const MAX_PITCH_SEMITONES: f32 = 48.0;

/// Clamp a pitch offset to `±MAX_PITCH_SEMITONES`; NaN and infinities become 0
#[inline]
pub fn clamp_pitch(semitones: f32) -> f32 {
    if semitones.is_finite() {
        semitones.clamp(-MAX_PITCH_SEMITONES, MAX_PITCH_SEMITONES)
    } else {
        0.0
    }
}

/// Playback-rate multiplier for a pitch offset in semitones
///
/// The offset is clamped first, so the rate is always finite and positive.
#[inline]
pub fn pitch_to_rate(semitones: f32) -> f64 {
    2f64.powf(clamp_pitch(semitones) as f64 / 12.0)
}

/// Mix the next `out.len()` frames of `voice` into `out`, scaled by `gain`
///
/// Samples are added to what is already in `out`. When the source runs out
/// the voice is marked finished and the remaining frames are left untouched.
pub fn render_voice(voice: &mut Voice, out: &mut [StereoSample], gain: Sample) {
    if voice.finished {
        return;
    }

    let source = voice.sound.frames();
    let total = source.len();

    if voice.rate == 1.0 {
        let start = voice.cursor as usize;
        let n = out.len().min(total.saturating_sub(start));
        for (dst, src) in out[..n].iter_mut().zip(&source[start..start + n]) {
            *dst += *src * gain;
        }
        voice.cursor = (start + n) as f64;
        if start + n >= total {
            voice.finished = true;
        }
        return;
    }

    let rate = voice.rate;
    let last = total.saturating_sub(1) as f64;
    for (i, dst) in out.iter_mut().enumerate() {
        let pos = voice.cursor + i as f64 * rate;
        // Compared as f64 so a huge position never reaches the index cast
        if !(pos < last) {
            voice.finished = true;
            voice.cursor = total as f64;
            return;
        }
        let index = pos as usize;
        let frac = (pos - index as f64) as Sample;
        *dst += source[index].lerp(&source[index + 1], frac) * gain;
    }

    voice.cursor = (voice.cursor + out.len() as f64 * rate).min(total as f64);
    if voice.cursor >= last {
        voice.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc::share_sound;
    use crate::engine::sound::DecodedSound;

    fn ramp_voice(frames: usize, pitch: f32) -> Voice {
        let samples = (0..frames)
            .map(|i| StereoSample::new(i as f32, -(i as f32)))
            .collect();
        let sound = DecodedSound::new("ramp", 48000, samples);
        Voice::new(1, share_sound(sound), pitch)
    }

    #[test]
    fn test_pitch_to_rate() {
        assert_eq!(pitch_to_rate(0.0), 1.0);
        assert!((pitch_to_rate(12.0) - 2.0).abs() < 1e-12);
        assert!((pitch_to_rate(-12.0) - 0.5).abs() < 1e-12);
        assert!((pitch_to_rate(1.0) - 1.059463).abs() < 1e-6);
    }

    #[test]
    fn test_unpitched_is_exact_copy() {
        let mut voice = ramp_voice(10, 0.0);
        let mut out = vec![StereoSample::silence(); 4];
        render_voice(&mut voice, &mut out, 1.0);

        assert_eq!(out, &voice.sound.frames()[..4]);
        assert_eq!(voice.cursor(), 4.0);
        assert!(!voice.is_finished());
    }

    #[test]
    fn test_output_is_accumulated_and_scaled() {
        let mut voice = ramp_voice(4, 0.0);
        let mut out = vec![StereoSample::new(1.0, 1.0); 4];
        render_voice(&mut voice, &mut out, 0.5);
        assert_eq!(out[2], StereoSample::new(2.0, 0.0));
    }

    #[test]
    fn test_short_tail_leaves_silence() {
        let mut voice = ramp_voice(6, 0.0);
        let mut out = vec![StereoSample::silence(); 4];
        render_voice(&mut voice, &mut out, 1.0);
        out.iter_mut().for_each(|s| *s = StereoSample::silence());
        render_voice(&mut voice, &mut out, 1.0);

        assert!(voice.is_finished());
        assert_eq!(voice.cursor(), 6.0);
        assert_eq!(out[1], StereoSample::new(5.0, -5.0));
        assert_eq!(out[2], StereoSample::silence());

        // Finished voices are never advanced again
        render_voice(&mut voice, &mut out, 1.0);
        assert_eq!(voice.cursor(), 6.0);
    }

    #[test]
    fn test_octave_up_reads_every_other_frame() {
        let mut voice = ramp_voice(100, 12.0);
        let mut out = vec![StereoSample::silence(); 8];
        render_voice(&mut voice, &mut out, 1.0);

        for (i, frame) in out.iter().enumerate() {
            assert!((frame.left - (2 * i) as f32).abs() < 1e-4);
            assert!((frame.right + (2 * i) as f32).abs() < 1e-4);
        }
        assert!((voice.cursor() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_octave_down_interpolates() {
        let mut voice = ramp_voice(100, -12.0);
        let mut out = vec![StereoSample::silence(); 4];
        render_voice(&mut voice, &mut out, 1.0);
        let lefts: Vec<f32> = out.iter().map(|s| s.left).collect();
        assert_eq!(lefts, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_pitched_voice_finishes_within_source() {
        let mut voice = ramp_voice(10, 7.0);
        let mut out = vec![StereoSample::silence(); 64];
        render_voice(&mut voice, &mut out, 1.0);

        assert!(voice.is_finished());
        assert!(voice.cursor() <= 10.0);
        assert!(out.iter().all(|s| s.left <= 9.0));
    }

    #[test]
    fn test_clamp_pitch() {
        assert_eq!(clamp_pitch(3.5), 3.5);
        assert_eq!(clamp_pitch(1000.0), MAX_PITCH_SEMITONES);
        assert_eq!(clamp_pitch(-20000.0), -MAX_PITCH_SEMITONES);
        assert_eq!(clamp_pitch(f32::NAN), 0.0);
        assert_eq!(clamp_pitch(f32::NEG_INFINITY), 0.0);
        assert_eq!(pitch_to_rate(f32::NAN), 1.0);
        assert!((pitch_to_rate(800.0) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_pitch_plays_unshifted() {
        let mut voice = ramp_voice(10, f32::NAN);
        assert_eq!(voice.pitch(), 0.0);
        let mut out = vec![StereoSample::silence(); 4];
        render_voice(&mut voice, &mut out, 1.0);
        assert_eq!(out, &voice.sound.frames()[..4]);
    }

    #[test]
    fn test_huge_pitch_finishes_without_overflow() {
        let mut voice = ramp_voice(1000, 800.0);
        let mut out = vec![StereoSample::silence(); 256];
        render_voice(&mut voice, &mut out, 1.0);
        assert!(voice.is_finished());
        assert!(out.iter().all(|s| s.left.is_finite() && s.left <= 999.0));
    }

    #[test]
    fn test_very_low_pitch_still_finishes() {
        let mut voice = ramp_voice(64, -20000.0);
        let mut out = vec![StereoSample::silence(); 256];
        let mut blocks = 0;
        while !voice.is_finished() {
            render_voice(&mut voice, &mut out, 1.0);
            blocks += 1;
            assert!(blocks <= 64, "voice never finished");
        }
        // 16x slower: 64 frames last 1024 output frames
        assert_eq!(blocks, 4);
    }

    #[test]
    fn test_huge_cursor_position_is_safe() {
        let mut voice = ramp_voice(10, 5.0);
        voice.cursor = 1e30;
        let mut out = vec![StereoSample::silence(); 4];
        render_voice(&mut voice, &mut out, 1.0);
        assert!(voice.is_finished());
        assert!(out.iter().all(|s| *s == StereoSample::silence()));
    }

    #[test]
    fn test_empty_sound_is_finished_immediately() {
        let mut voice = ramp_voice(0, 0.0);
        assert!(voice.is_finished());
        let mut out = vec![StereoSample::silence(); 4];
        render_voice(&mut voice, &mut out, 1.0);
        assert!(out.iter().all(|s| *s == StereoSample::silence()));
    }
}
