use std::io;
use thiserror::Error;

/// Possible errors that arise from attempting to convert a PDT10 container into
/// its raster, or vise-versa.
#[derive(Error, Debug)]
pub enum PdtError {
    #[error("malformed PDT10 data: {0}")]
    Format(#[from] FormatError),

    #[error("unsupported feature: {0}")]
    Unsupported(#[from] Unsupported),

    #[error("{0}")]
    Io(#[from] io::Error),
}

impl PdtError {
    /// `true` if the error comes from the input bytes or raster themselves,
    /// rather than from the writer or a missing feature
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// Problems with the container or raster layout. These abort the current image only.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("buffer of {0} bytes is too short for the 32 byte header")]
    TooShort(usize),

    #[error("bad magic bytes {0:02x?}, expected \"PDT10\"")]
    BadMagic([u8; 5]),

    #[error("header declares {declared} bytes but only {actual} are present")]
    Truncated { declared: u32, actual: usize },

    #[error("image dimensions {width}x{height} contain no pixels")]
    ZeroDimensions { width: u32, height: u32 },

    #[error("image dimensions {width}x{height} are too large")]
    TooManySamples { width: u32, height: u32 },

    #[error("{len} payload bytes cannot hold {samples} samples")]
    PayloadTooSmall { samples: usize, len: usize },

    #[error("mask offset {offset} lies outside the container ({length} bytes)")]
    BadMaskOffset { offset: u32, length: u32 },

    #[error("expected {expected} samples but got {actual}")]
    SampleCount { expected: usize, actual: usize },
}

/// Features of the PDT10 format that this crate does not produce
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    #[error("alpha (mask) plane encoding")]
    AlphaPlane,

    #[error("scanlines wider than 4096 pixels (got {0})")]
    Width(u32),

    #[error("containers larger than 4 GiB (got {0} bytes)")]
    Length(usize),
}

/// Non-fatal inconsistencies found while decoding. The raster is still produced,
/// with any missing color samples set to black and missing alpha samples set to
/// fully opaque.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityWarning {
    #[error("color plane ended after {decoded} of {expected} samples")]
    ColorPlaneShort { expected: usize, decoded: usize },

    #[error("alpha plane ended after {decoded} of {expected} samples")]
    AlphaPlaneShort { expected: usize, decoded: usize },

    #[error("color plane has {color} samples but alpha plane has {alpha}")]
    PlaneMismatch { color: usize, alpha: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_errors_convert() {
        let err: PdtError = FormatError::BadMagic(*b"PDT11").into();
        assert!(err.is_format_error());
        assert!(err.to_string().contains("PDT10"));

        let err: PdtError = Unsupported::AlphaPlane.into();
        assert!(!err.is_format_error());
        assert!(err.to_string().contains("alpha"));
    }

    #[test]
    fn warning_display() {
        let warn = IntegrityWarning::AlphaPlaneShort {
            expected: 16,
            decoded: 8,
        };
        assert_eq!(warn.to_string(), "alpha plane ended after 8 of 16 samples");
    }
}
