//! Information and structures for `PDT10` files.
//!
//! A `PDT10` file is a fixed 32 byte header followed by one or two compressed sample planes:
//! 1. Header
//! 2. Color plane (RGB)
//! 3. Alpha plane (optional)
//!
//! ## Header
//! All fields are little endian. The key data can be extracted into a [`PdtHeader`]
//! by using [`pdt_info()`].
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..5     | magic bytes ("PDT10") |
//! | 5..8     | zero padding |
//! | 8..12    | total size of the file in bytes |
//! | 12..16   | width in pixels |
//! | 16..20   | height in pixels |
//! | 20..28   | reserved |
//! | 28..32   | byte offset of the alpha plane (0 => no alpha plane) |
//!
//! ## Planes
//! Each plane is an LZSS-like stream of tokens that fill a 4096 sample ring dictionary.
//! Tokens are tagged eight at a time by a flag byte that precedes them. The flag bits are
//! read from the most significant bit down: a set bit is an uncoded sample, and a clear
//! bit is a two byte little endian copy-back word.
//!
//! | Plane | Uncoded sample | Copy-back word |
//! | ----- | -------------- | -------------- |
//! | Color | 3 bytes, `0xRRGGBB` little endian | `offset << 4 \| (length - 1)` |
//! | Alpha | 1 byte | `offset << 8 \| (length - 2)` |
//!
//! A copy-back starts `offset + 1` slots behind the ring's write position and copies
//! `length` samples forward one at a time, so a copy may overlap its own output.
//! The decoder slices the ring's output into scanlines of `width` samples, which means
//! that a copy-back can straddle two rows.
//!
//! ## An Example
//! Let's encode a 4x1 image with the pixels `[A, A, A, B]`, where A is `#0a141e` and
//! B is `#28323c`. The tokens will be `[A, (0, 2), B]`, where (0, 2) is an offset of 0
//! (the sample just written) and a length of 2.
//! ```text
//! Header
//! 50 44 54 31 30 00 00 00 <- "PDT10"
//! 29 00 00 00             <- file size of 41 bytes
//! 04 00 00 00             <- width
//! 01 00 00 00             <- height
//! 00 00 00 00 00 00 00 00 <- reserved
//! 00 00 00 00             <- no alpha plane
//!
//! Color Plane
//! a0       <- flags 101 (uncoded, encoded, uncoded)
//! 1e 14 0a <- uncoded A
//! 01 00    <- encoded: length 2 (1 + 1), offset 0
//! 3c 32 28 <- uncoded B
//! ```
//! [`pdt_info()`]: crate::pdt_info

use crate::{
    errors::FormatError,
    raster::{pixel_count, Rgb},
};
use bitstream_io::{BitWriter, LittleEndian};
use std::{fmt, hash::Hash, io, io::Write};

/// The information stored at the start of a `PDT10` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdtHeader {
    /// size of the whole container in bytes
    pub length: u32,
    pub width: u32,
    pub height: u32,
    /// start of the alpha plane, or 0 if there isn't one
    pub mask_offset: u32,
}

impl PdtHeader {
    pub const SIZE: usize = 32;
    pub const MAGIC: &'static [u8; 5] = b"PDT10";

    /// Parse the PDT header from a byte array
    fn from_array(arr: &[u8; Self::SIZE]) -> Result<Self, FormatError> {
        let magic = [arr[0], arr[1], arr[2], arr[3], arr[4]];
        if &magic != Self::MAGIC {
            return Err(FormatError::BadMagic(magic));
        }

        Ok(Self {
            length: le_u32(arr, 8),
            width: le_u32(arr, 12),
            height: le_u32(arr, 16),
            mask_offset: le_u32(arr, 28),
        })
    }

    /// Parse and check the header at the start of `buf` against the rest of `buf`
    pub(crate) fn from_bytes(buf: &[u8]) -> Result<Self, FormatError> {
        let mut arr = [0u8; Self::SIZE];
        match buf.get(..Self::SIZE) {
            Some(hdr) => arr.copy_from_slice(hdr),
            None => return Err(FormatError::TooShort(buf.len())),
        }
        let header = Self::from_array(&arr)?;

        if buf.len() < header.length as usize {
            return Err(FormatError::Truncated {
                declared: header.length,
                actual: buf.len(),
            });
        }
        let samples = pixel_count(header.width, header.height)?;

        if header.has_mask()
            && (header.mask_offset < Self::SIZE as u32 || header.mask_offset > header.length)
        {
            return Err(FormatError::BadMaskOffset {
                offset: header.mask_offset,
                length: header.length,
            });
        }

        let len = header.color_range().len();
        if len < min_payload_len(samples) {
            return Err(FormatError::PayloadTooSmall { samples, len });
        }

        Ok(header)
    }

    /// Write out `self` to a little endian `BitWriter` to match the PDT10 layout
    pub(crate) fn write<W: Write>(&self, wtr: &mut BitWriter<W, LittleEndian>) -> io::Result<()> {
        wtr.write_bytes(Self::MAGIC)?; // 0..5
        wtr.write_bytes(&[0; 3])?; // 5..8
        wtr.write(32, self.length)?; // 8..12
        wtr.write(32, self.width)?; // 12..16
        wtr.write(32, self.height)?; // 16..20
        wtr.write_bytes(&[0; 8])?; // 20..28
        wtr.write(32, self.mask_offset) // 28..32
    }

    pub fn has_mask(&self) -> bool {
        self.mask_offset > 0
    }

    /// Byte range of the color plane within the container
    pub(crate) fn color_range(&self) -> std::ops::Range<usize> {
        let end = if self.has_mask() {
            self.mask_offset
        } else {
            self.length
        } as usize;

        Self::SIZE..end.max(Self::SIZE)
    }

    /// Byte range of the alpha plane within the container, if there is one
    pub(crate) fn alpha_range(&self) -> Option<std::ops::Range<usize>> {
        if self.has_mask() {
            Some(self.mask_offset as usize..self.length as usize)
        } else {
            None
        }
    }
}

impl fmt::Display for PdtHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PDT10 {}x{}, {} bytes", self.width, self.height, self.length)?;
        if self.has_mask() {
            write!(f, ", alpha plane at {:#x}", self.mask_offset)?;
        }
        Ok(())
    }
}

fn le_u32(arr: &[u8; PdtHeader::SIZE], at: usize) -> u32 {
    u32::from_le_bytes([arr[at], arr[at + 1], arr[at + 2], arr[at + 3]])
}

/// The smallest color payload that could possibly hold `samples` samples:
/// a flag byte and eight 2 byte copy-backs of 16 samples each per 128 samples
const fn min_payload_len(samples: usize) -> usize {
    const GROUP_BYTES: usize = 1 + 8 * 2;
    const GROUP_SAMPLES: usize = 8 * 16;

    (samples / GROUP_SAMPLES) * GROUP_BYTES + (samples % GROUP_SAMPLES > 0) as usize * 3
}

/// A value stored in a plane's ring dictionary
pub(crate) trait Sample: Copy + Default + Eq + Hash + fmt::Debug + 'static {
    /// size of an uncoded sample in the stream
    const BITS: u32;

    fn from_wire(raw: u32) -> Self;
    fn to_wire(self) -> u32;
}

impl Sample for Rgb {
    const BITS: u32 = 24;

    fn from_wire(raw: u32) -> Self {
        Self {
            r: (raw >> 16) as u8,
            g: (raw >> 8) as u8,
            b: raw as u8,
        }
    }

    fn to_wire(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

impl Sample for u8 {
    const BITS: u32 = 8;

    fn from_wire(raw: u32) -> Self {
        raw as u8
    }

    fn to_wire(self) -> u32 {
        self as u32
    }
}

/// The token layout of one of the two planes in a `PDT10` file.
///
/// A copy-back word is read least significant bits first: `LENGTH_BITS` for the length
/// (minus `LENGTH_BIAS`), then `OFFSET_BITS` for the offset.
pub(crate) trait Plane {
    type Sample: Sample;

    const NAME: &'static str;
    const OFFSET_BITS: u32;
    const LENGTH_BITS: u32;
    const LENGTH_BIAS: usize;

    /// shortest copy-back that can be encoded
    const MIN_LENGTH: usize = Self::LENGTH_BIAS;
    /// longest copy-back that can be encoded
    const MAX_LENGTH: usize = (1 << Self::LENGTH_BITS) - 1 + Self::LENGTH_BIAS;
    /// largest encodable offset
    const MAX_OFFSET: usize = (1 << Self::OFFSET_BITS) - 1;
}

/// RGB plane: 12 bit offsets and 1..=16 sample copies
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColorPlane;

impl Plane for ColorPlane {
    type Sample = Rgb;

    const NAME: &'static str = "color";
    const OFFSET_BITS: u32 = 12;
    const LENGTH_BITS: u32 = 4;
    const LENGTH_BIAS: usize = 1;
}

/// Mask plane: 8 bit offsets and 2..=257 sample copies
#[derive(Debug, Clone, Copy)]
pub(crate) struct AlphaPlane;

impl Plane for AlphaPlane {
    type Sample = u8;

    const NAME: &'static str = "alpha";
    const OFFSET_BITS: u32 = 8;
    const LENGTH_BITS: u32 = 8;
    const LENGTH_BIAS: usize = 2;
}

/// A single decoded or encoded plane token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<S> {
    Literal(S),
    /// copy `length` samples starting `offset + 1` slots behind the write position
    BackReference { offset: usize, length: usize },
}

impl<S> Token<S> {
    pub(crate) fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(..))
    }

    /// number of samples this token produces
    pub(crate) fn size(&self) -> usize {
        match self {
            Self::Literal(..) => 1,
            Self::BackReference { length, .. } => *length,
        }
    }
}
