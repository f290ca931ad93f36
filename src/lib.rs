//! Read and write `PDT10` bitmap containers.
//!
//! A `PDT10` file holds a 24-bit color image and an optional 8-bit transparency mask,
//! each compressed with a byte-aligned LZSS scheme over a 4096 entry ring dictionary.
//! See the [`PdtHeader`] documentation for the layout of the container.
//!
//! ```
//! # use pdt10::{RasterImage, Rgb};
//! let image = RasterImage::opaque(2, 2, vec![Rgb::new(0x20, 0x40, 0x60); 4]).unwrap();
//! let compressed = pdt10::encode(&image).unwrap();
//!
//! let decoded = pdt10::decode(&compressed).unwrap();
//! assert_eq!(decoded.image, image);
//! assert!(decoded.warnings.is_empty());
//! ```
//!
//! The token layout of each plane is internal; only rasters and containers cross the API.
//! ```compile_fail
//! use pdt10::ColorPlane;
//! ```

mod decode;
mod encode;
mod errors;
mod format;
mod raster;
mod ring;

pub use decode::{decode, pdt_info, Decoded, Decoder};
pub use encode::{encode, EncoderBuilder, MatchBackend};
pub use errors::{FormatError, IntegrityWarning, PdtError, Unsupported};
pub use format::PdtHeader;
pub use raster::{RasterImage, Rgb, OPAQUE};
