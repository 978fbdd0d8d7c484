//! Color types and the stride-sampling averager.
//!
//! The averager approximates a window's dominant color by sampling every
//! Nth pixel along each axis rather than walking the full region, which
//! keeps a 30 Hz cadence cheap even for large windows.

use crate::capture::PixelBuffer;
use crate::error::AverageError;

/// An 8-bit RGB color. Plain value type, copied freely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create a new color from channel values.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Black, the sentinel for "nothing published yet".
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Wide per-channel accumulator used during one averaging pass.
///
/// 64-bit sums cannot overflow for any realistic window: even a full
/// 16384x16384 capture of pure white sums to well under 2^40 per channel.
#[derive(Debug, Clone, Copy, Default)]
struct WideRgb {
    r: u64,
    g: u64,
    b: u64,
}

impl WideRgb {
    fn add(&mut self, px: Rgb) {
        self.r += u64::from(px.r);
        self.g += u64::from(px.g);
        self.b += u64::from(px.b);
    }

    /// Divide each channel sum by the sample count. Each sample is at most
    /// 255, so the quotient always fits back into a byte.
    fn mean(self, samples: u64) -> Rgb {
        Rgb::new(
            (self.r / samples) as u8,
            (self.g / samples) as u8,
            (self.b / samples) as u8,
        )
    }
}

/// Compute the stride-sampled mean color of a captured buffer.
///
/// The buffer's dimensions are floor-divided by `scale_factor` to form a
/// sparse grid, and only the pixels at `(x * scale_factor, y * scale_factor)`
/// are read. Returns [`AverageError::DegenerateGeometry`] when the window is
/// smaller than the stride in either dimension (or the stride is zero), so a
/// degenerate tick is skipped instead of dividing by zero.
pub fn average(buffer: &PixelBuffer, scale_factor: u32) -> Result<Rgb, AverageError> {
    let degenerate = || AverageError::DegenerateGeometry {
        width: buffer.width(),
        height: buffer.height(),
        scale_factor,
    };

    if scale_factor == 0 {
        return Err(degenerate());
    }
    let scaled_width = buffer.width() / scale_factor;
    let scaled_height = buffer.height() / scale_factor;
    if scaled_width == 0 || scaled_height == 0 {
        return Err(degenerate());
    }

    let mut total = WideRgb::default();
    for y in 0..scaled_height {
        for x in 0..scaled_width {
            total.add(buffer.pixel(x * scale_factor, y * scale_factor));
        }
    }

    Ok(total.mean(u64::from(scaled_width) * u64::from(scaled_height)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uniform_buffer(width: u32, height: u32, color: Rgb) -> PixelBuffer {
        let pixels = vec![color; width as usize * height as usize];
        PixelBuffer::from_rgb_pixels(width, height, &pixels)
    }

    #[test]
    fn test_average_uniform_buffer_is_identity() {
        let buffer = uniform_buffer(64, 48, Rgb::new(200, 100, 50));
        assert_eq!(average(&buffer, 10).unwrap(), Rgb::new(200, 100, 50));
    }

    #[test]
    fn test_average_samples_only_grid_points() {
        // 4x4 buffer with stride 2 samples (0,0), (2,0), (0,2), (2,2).
        // Off-grid pixels are set to white and must not affect the result.
        let mut pixels = vec![Rgb::new(255, 255, 255); 16];
        for (x, y) in [(0u32, 0u32), (2, 0), (0, 2), (2, 2)] {
            pixels[(y * 4 + x) as usize] = Rgb::new(40, 80, 120);
        }
        let buffer = PixelBuffer::from_rgb_pixels(4, 4, &pixels);
        assert_eq!(average(&buffer, 2).unwrap(), Rgb::new(40, 80, 120));
    }

    #[test]
    fn test_average_mixed_grid_points() {
        // Stride 1 over a 2x1 buffer: plain two-pixel mean with floor.
        let buffer = PixelBuffer::from_rgb_pixels(2, 1, &[Rgb::new(0, 10, 255), Rgb::new(1, 20, 0)]);
        assert_eq!(average(&buffer, 1).unwrap(), Rgb::new(0, 15, 127));
    }

    #[test]
    fn test_average_window_narrower_than_stride_fails() {
        let buffer = uniform_buffer(9, 100, Rgb::new(1, 2, 3));
        let err = average(&buffer, 10).unwrap_err();
        assert_eq!(
            err,
            AverageError::DegenerateGeometry {
                width: 9,
                height: 100,
                scale_factor: 10,
            }
        );
    }

    #[test]
    fn test_average_window_shorter_than_stride_fails() {
        let buffer = uniform_buffer(100, 9, Rgb::new(1, 2, 3));
        assert!(average(&buffer, 10).is_err());
    }

    #[test]
    fn test_average_zero_stride_fails() {
        let buffer = uniform_buffer(4, 4, Rgb::new(1, 2, 3));
        assert!(average(&buffer, 0).is_err());
    }

    fn rgb_strategy() -> impl Strategy<Value = Rgb> {
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Rgb::new(r, g, b))
    }

    proptest! {
        // For any uniformly-colored buffer whose scaled dimensions are at
        // least 1, the average is exactly the buffer color, regardless of
        // dimensions or scale factor.
        #[test]
        fn prop_uniform_average_is_exact(
            color in rgb_strategy(),
            width in 1u32..=64,
            height in 1u32..=64,
            scale_factor in 1u32..=8,
        ) {
            prop_assume!(width >= scale_factor && height >= scale_factor);
            let buffer = uniform_buffer(width, height, color);
            prop_assert_eq!(average(&buffer, scale_factor).unwrap(), color);
        }

        // The mean of arbitrary pixels always lands in [0, 255] per channel
        // and never panics while the scaled grid is non-empty.
        #[test]
        fn prop_average_never_overflows(
            pixels in proptest::collection::vec(rgb_strategy(), 36),
            scale_factor in 1u32..=6,
        ) {
            let buffer = PixelBuffer::from_rgb_pixels(6, 6, &pixels);
            let mean = average(&buffer, scale_factor).unwrap();
            let max_r = pixels.iter().map(|p| p.r).max().unwrap();
            prop_assert!(mean.r <= max_r);
        }

        // Degenerate geometry is an error, never a panic.
        #[test]
        fn prop_degenerate_geometry_is_guarded(
            width in 1u32..=9,
            height in 1u32..=9,
        ) {
            let buffer = uniform_buffer(width, height, Rgb::BLACK);
            prop_assert!(average(&buffer, 10).is_err());
        }
    }
}
