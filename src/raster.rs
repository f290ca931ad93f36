//! In-memory RGBA rasters, and the conversion between them and the two sample planes
//! of a PDT10 container.
//!
//! A [`RasterImage`] keeps the color and alpha channels apart, in the same flat,
//! row-major order that the planes are encoded in: pixel `(x, y)` is sample
//! `y * width + x`. The alpha channel is either empty (fully opaque) or exactly as
//! long as the color channel.

use crate::errors::{FormatError, IntegrityWarning, PdtError};
use std::fmt;

/// One color plane sample
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Alpha value used when a pixel has no alpha sample
pub const OPAQUE: u8 = 0xFF;

/// Two rasters are equal when every pixel matches; an empty alpha channel equals
/// one that is fully opaque.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    height: u32,
    color: Vec<Rgb>,
    alpha: Vec<u8>,
}

impl RasterImage {
    /// Create a raster from its planes. `alpha` may be empty for a fully opaque image,
    /// otherwise it must have one sample per pixel.
    pub fn new(width: u32, height: u32, color: Vec<Rgb>, alpha: Vec<u8>) -> Result<Self, PdtError> {
        let expected = pixel_count(width, height)?;
        if color.len() != expected {
            return Err(FormatError::SampleCount {
                expected,
                actual: color.len(),
            }
            .into());
        }
        if !alpha.is_empty() && alpha.len() != expected {
            return Err(FormatError::SampleCount {
                expected,
                actual: alpha.len(),
            }
            .into());
        }

        Ok(Self {
            width,
            height,
            color,
            alpha,
        })
    }

    /// Create a fully opaque raster
    pub fn opaque(width: u32, height: u32, color: Vec<Rgb>) -> Result<Self, PdtError> {
        Self::new(width, height, color, Vec::new())
    }

    /// Split tightly packed, row-major RGBA bytes into color and alpha channels.
    /// The alpha channel is always kept, even when every pixel is opaque.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, PdtError> {
        let expected = pixel_count(width, height)?;
        if rgba.len() != expected * 4 {
            return Err(FormatError::SampleCount {
                expected,
                actual: rgba.len() / 4,
            }
            .into());
        }

        let (color, alpha) = rgba
            .chunks_exact(4)
            .map(|px| (Rgb::new(px[0], px[1], px[2]), px[3]))
            .unzip();

        Self::new(width, height, color, alpha)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color samples in row-major order; this is exactly what the color plane encodes
    pub fn color(&self) -> &[Rgb] {
        &self.color
    }

    /// Alpha samples in row-major order, or an empty slice for an opaque raster
    pub fn alpha(&self) -> &[u8] {
        &self.alpha
    }

    /// `true` if any pixel is not fully opaque
    pub fn has_transparency(&self) -> bool {
        self.alpha.iter().any(|&a| a != OPAQUE)
    }

    /// RGBA value of the pixel at column `x`, row `y`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.width as usize + x as usize;

        Some(self.rgba_at(i))
    }

    /// Merge the color and alpha channels into tightly packed RGBA bytes
    pub fn to_rgba(&self) -> Vec<u8> {
        (0..self.color.len()).flat_map(|i| self.rgba_at(i)).collect()
    }

    fn rgba_at(&self, i: usize) -> [u8; 4] {
        let Rgb { r, g, b } = self.color[i];

        [r, g, b, self.alpha_at(i)]
    }

    fn alpha_at(&self, i: usize) -> u8 {
        self.alpha.get(i).copied().unwrap_or(OPAQUE)
    }
}

impl PartialEq for RasterImage {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.color == other.color
            && (0..self.color.len()).all(|i| self.alpha_at(i) == other.alpha_at(i))
    }
}

impl Eq for RasterImage {}

/// Number of pixels in a `width` by `height` image, rejecting empty and overflowing sizes
pub(crate) fn pixel_count(width: u32, height: u32) -> Result<usize, FormatError> {
    if width == 0 || height == 0 {
        return Err(FormatError::ZeroDimensions { width, height });
    }

    (width as usize)
        .checked_mul(height as usize)
        .ok_or(FormatError::TooManySamples { width, height })
}

/// Combine freshly decoded planes into a raster.
///
/// The color plane must be complete. A missing or short alpha plane is padded with
/// opaque samples, and any mismatch is reported in `warnings`.
pub(crate) fn assemble(
    width: u32,
    height: u32,
    color: Vec<Rgb>,
    alpha: Option<Vec<u8>>,
    warnings: &mut Vec<IntegrityWarning>,
) -> Result<RasterImage, PdtError> {
    let alpha = match alpha {
        None => Vec::new(),
        Some(mut alpha) => {
            if alpha.len() != color.len() {
                warnings.push(IntegrityWarning::PlaneMismatch {
                    color: color.len(),
                    alpha: alpha.len(),
                });
                alpha.resize(color.len(), OPAQUE);
            }
            alpha
        }
    };

    RasterImage::new(width, height, color, alpha)
}
