use crate::{
    errors::{PdtError, Unsupported},
    format::{ColorPlane, PdtHeader, Plane, Sample, Token},
    raster::{RasterImage, Rgb},
    ring::RING_SIZE,
};
use bitstream_io::{BitWriter, LittleEndian};
use std::{
    convert::TryFrom,
    fs,
    io::{self, Write},
    path::Path,
};

pub(crate) mod matcher;

type LogWtr<'a> = &'a mut dyn Write;

/// The algorithm used to find copy-backs when encoding a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchBackend {
    /// Look up runs of upcoming samples in an index of everything in the ring.
    /// Ties between equally long matches go to the most recently written one.
    Indexed,
    /// Scan back through the whole ring for every sample, nearest match first.
    /// Much slower; mainly useful to cross-check the index.
    Linear,
}

impl Default for MatchBackend {
    fn default() -> Self {
        Self::Indexed
    }
}

/// Settings for compressing one raster: the match search backend and an optional trace
///
/// Start from [`for_image()`], adjust the settings through the chained setters, then
/// produce the container with [`encode_to_writer()`], [`encode_to_file()`], or [`encode_to_vec()`].
/// ```
/// # use pdt10::{EncoderBuilder, MatchBackend, RasterImage, Rgb};
/// let image = RasterImage::opaque(3, 1, vec![Rgb::new(9, 9, 9); 3]).unwrap();
/// let compressed = EncoderBuilder::for_image(&image)
///     .backend(MatchBackend::Linear)
///     .with_logging(&mut ::std::io::stdout())
///     .encode_to_vec()
///     .unwrap();
/// assert_eq!(&compressed[..5], b"PDT10");
/// ```
///
/// Only the color plane is written. The alpha channel of the raster is ignored,
/// and asking for it with [`with_alpha(true)`] makes the encode fail with
/// [`Unsupported::AlphaPlane`].
///
/// [`for_image()`]: EncoderBuilder::for_image
/// [`encode_to_writer()`]: EncoderBuilder::encode_to_writer
/// [`encode_to_file()`]: EncoderBuilder::encode_to_file
/// [`encode_to_vec()`]: EncoderBuilder::encode_to_vec
/// [`with_alpha(true)`]: EncoderBuilder::with_alpha
pub struct EncoderBuilder<'a> {
    image: &'a RasterImage,
    backend: MatchBackend,
    alpha: bool,
    log: Option<LogWtr<'a>>,
}

impl<'a> EncoderBuilder<'a> {
    /// Create a new `EncoderBuilder` for `image`.
    #[inline]
    pub fn for_image(image: &'a RasterImage) -> Self {
        Self {
            image,
            backend: MatchBackend::default(),
            alpha: false,
            log: None,
        }
    }

    /// Set the algorithm used to search for copy-backs
    #[inline]
    pub fn backend(&mut self, backend: MatchBackend) -> &mut Self {
        self.backend = backend;
        self
    }

    /// Request that the alpha channel be written as a mask plane.
    #[inline]
    pub fn with_alpha(&mut self, alpha: bool) -> &mut Self {
        self.alpha = alpha;
        self
    }

    /// Write a trace of every token to `log` while the raster is being encoded.
    #[inline]
    pub fn with_logging<L: Write>(&mut self, log: &'a mut L) -> &mut Self {
        self.log = Some(log as LogWtr);
        self
    }

    /// Start the encoding and write the compressed data out to `wtr`
    #[inline]
    pub fn encode_to_writer<W: Write>(&mut self, mut wtr: W) -> Result<(), PdtError> {
        let bytes = self.encode_to_vec()?;
        wtr.write_all(&bytes).map_err(Into::into)
    }

    /// Start the encoding and write the compressed data out to the newly created
    /// file at `f`
    #[inline]
    pub fn encode_to_file<P: AsRef<Path>>(&mut self, f: P) -> Result<(), PdtError> {
        let bytes = self.encode_to_vec()?;
        fs::write(f, bytes).map_err(Into::into)
    }

    /// Start the encoding and return the compressed data in a `Vec<u8>`.
    #[inline]
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>, PdtError> {
        do_encode(self)
    }
}

/// Compress a raster into a `PDT10` `Vec<u8>`
///
/// This is a convenience function to encode a raster without having to
/// set up an [`EncoderBuilder`].
pub fn encode(image: &RasterImage) -> Result<Vec<u8>, PdtError> {
    EncoderBuilder::for_image(image).encode_to_vec()
}

fn do_encode(opts: &mut EncoderBuilder<'_>) -> Result<Vec<u8>, PdtError> {
    let EncoderBuilder {
        image,
        backend,
        alpha,
        log,
    } = opts;

    if *alpha {
        return Err(Unsupported::AlphaPlane.into());
    }
    // every row has to fit in the ring before the decoder flushes it
    if image.width() as usize > RING_SIZE {
        return Err(Unsupported::Width(image.width()).into());
    }

    let pass = matcher::compress::<ColorPlane>(image.color(), image.width() as usize, *backend, log)?;

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "{}", &pass)?;
    }

    write_container(image, &pass.tokens)
}

/// Write the header and color plane, then fill in the total length
fn write_container(image: &RasterImage, color: &[Token<Rgb>]) -> Result<Vec<u8>, PdtError> {
    let header = PdtHeader {
        length: 0,
        width: image.width(),
        height: image.height(),
        mask_offset: 0,
    };

    let mut bytes = Vec::new();
    {
        let mut out = BitWriter::endian(&mut bytes, LittleEndian);
        header.write(&mut out)?;
        write_plane::<ColorPlane, _>(color, &mut out)?;
    }

    let length = container_length(bytes.len())?;
    bytes[8..12].copy_from_slice(&length.to_le_bytes());

    Ok(bytes)
}

/// The header stores the total size in 32 bits
fn container_length(len: usize) -> Result<u32, Unsupported> {
    u32::try_from(len).map_err(|_| Unsupported::Length(len))
}

/// Write `tokens` as a plane: every group of eight tokens is preceded by its flag byte,
/// and the last flag byte is padded with zero bits
pub(crate) fn write_plane<P: Plane, W: Write>(
    tokens: &[Token<P::Sample>],
    out: &mut BitWriter<W, LittleEndian>,
) -> io::Result<()> {
    for group in tokens.chunks(8) {
        out.write(8, flag_byte(group))?;

        for token in group {
            match *token {
                Token::Literal(sample) => out.write(<P::Sample as Sample>::BITS, sample.to_wire())?,
                Token::BackReference { offset, length } => {
                    out.write(P::LENGTH_BITS, (length - P::LENGTH_BIAS) as u32)?;
                    out.write(P::OFFSET_BITS, offset as u32)?;
                }
            }
        }
    }

    Ok(())
}

/// Pack one bit per token, most significant bit first: 1 for uncoded, 0 for copy-back
fn flag_byte<S>(group: &[Token<S>]) -> u8 {
    group
        .iter()
        .enumerate()
        .filter(|(_, token)| token.is_literal())
        .fold(0, |flags, (i, _)| flags | 0x80 >> i)
}
