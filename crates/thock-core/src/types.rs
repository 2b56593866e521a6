//! Common types for Thock
//!
//! Fundamental sample types shared by the sound library, the mixer and the
//! hardware driver.

/// Fallback sample rate when the output device does not report one
pub const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Channel count of every rendered block (interleaved stereo)
pub const CHANNELS: usize = 2;

/// Audio sample type (32-bit float everywhere inside the engine)
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Linear interpolation towards `next` by `frac` (0.0..1.0), per channel
    #[inline]
    pub fn lerp(&self, next: &Self, frac: Sample) -> Self {
        Self {
            left: self.left + (next.left - self.left) * frac,
            right: self.right + (next.right - self.right) * frac,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

/// View an interleaved `[L, R, L, R, ...]` block as stereo frames
///
/// A trailing odd sample (never produced by the driver) is left out of the view.
#[inline]
pub fn as_frames_mut(interleaved: &mut [Sample]) -> &mut [StereoSample] {
    let even = interleaved.len() & !1;
    bytemuck::cast_slice_mut(&mut interleaved[..even])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        let a = StereoSample::new(0.0, 1.0);
        let b = StereoSample::new(1.0, -1.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), StereoSample::new(0.5, 0.0));
    }

    #[test]
    fn test_frames_view_is_interleaved() {
        let mut block = vec![0.0f32; 6];
        {
            let frames = as_frames_mut(&mut block);
            assert_eq!(frames.len(), 3);
            frames[1] = StereoSample::new(0.25, -0.25);
        }
        assert_eq!(block, vec![0.0, 0.0, 0.25, -0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_frames_view_ignores_odd_tail() {
        let mut block = vec![1.0f32; 5];
        assert_eq!(as_frames_mut(&mut block).len(), 2);
    }
}
