use crate::{
    errors::{IntegrityWarning, PdtError},
    format::{AlphaPlane, ColorPlane, PdtHeader, Plane, Sample, Token},
    raster::{self, RasterImage, Rgb},
    ring::RingDict,
};
use bitstream_io::{BitReader, LittleEndian};
use std::{
    borrow::Cow,
    fs,
    io::{self, Read, Write},
    path::Path,
};

type LogWtr<'a> = &'a mut dyn Write;

/// The result of decoding a `PDT10` file: the raster, plus anything odd
/// that was found along the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub image: RasterImage,
    pub warnings: Vec<IntegrityWarning>,
}

/// Specify the decoding settings, such as logging and input.
///
/// To create a new `Decoder`, use [`for_bytes()`], [`for_reader()`], or
/// [`for_file()`]. Then, change any of the decoder settings.
/// Finally, decode the input data with [`decode()`].
/// ```
/// # use pdt10::{Decoder, EncoderBuilder, RasterImage, Rgb};
/// let original = RasterImage::opaque(2, 2, vec![Rgb::new(1, 2, 3); 4]).unwrap();
/// let compressed = EncoderBuilder::for_image(&original)
///     .encode_to_vec()
///     .unwrap();
/// let decoded = Decoder::for_bytes(&compressed)
///     .decode()
///     .unwrap();
/// assert_eq!(decoded.image, original);
/// assert!(decoded.warnings.is_empty());
/// ```
/// You can use a `Decoder` to get the [`PdtHeader`] with [`header()`]:
/// ```
/// # use pdt10::{Decoder, EncoderBuilder, RasterImage, Rgb};
/// # let original = RasterImage::opaque(2, 2, vec![Rgb::new(1, 2, 3); 4]).unwrap();
/// # let compressed = EncoderBuilder::for_image(&original).encode_to_vec().unwrap();
/// let mut decoder = Decoder::for_bytes(&compressed);
/// let header = decoder.header().unwrap();
/// assert_eq!((header.width, header.height), (2, 2));
/// ```
/// [`for_bytes()`]: Decoder::for_bytes
/// [`for_reader()`]: Decoder::for_reader
/// [`for_file()`]: Decoder::for_file
/// [`decode()`]: Decoder::decode
/// [`header()`]: Decoder::header
pub struct Decoder<'a> {
    src: Cow<'a, [u8]>,
    log: Option<LogWtr<'a>>,
    header: Option<PdtHeader>,
}

impl<'a> Decoder<'a> {
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        Self {
            src: Cow::Borrowed(bytes),
            log: None,
            header: None,
        }
    }

    /// Read all of `rdr` into memory; the planes can only be decoded from a complete buffer
    pub fn for_reader<R: Read>(mut rdr: R) -> Result<Self, PdtError> {
        let mut buf = Vec::new();
        rdr.read_to_end(&mut buf)?;

        Ok(Self {
            src: Cow::Owned(buf),
            log: None,
            header: None,
        })
    }

    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, PdtError> {
        let buf = fs::read(p)?;

        Ok(Self {
            src: Cow::Owned(buf),
            log: None,
            header: None,
        })
    }

    /// Write the header and a trace of every token to `wtr` while decoding
    #[inline]
    pub fn with_logging<W: Write>(&mut self, wtr: &'a mut W) -> &mut Self {
        self.log = Some(wtr as LogWtr);
        self
    }

    #[inline]
    pub fn header(&mut self) -> Result<PdtHeader, PdtError> {
        match self.header {
            Some(hdr) => Ok(hdr),
            None => {
                let hdr = PdtHeader::from_bytes(&self.src)?;
                self.header = Some(hdr);
                Ok(hdr)
            }
        }
    }

    #[inline]
    pub fn decode(&mut self) -> Result<Decoded, PdtError> {
        let header = self.header()?;
        do_decode(&self.src, header, &mut self.log)
    }
}

/// Decompress `PDT10` data into a [`RasterImage`]
///
/// This is a convenience function to decode a buffer without
/// having to set up a [`Decoder`]
pub fn decode(bytes: &[u8]) -> Result<Decoded, PdtError> {
    Decoder::for_bytes(bytes).decode()
}

/// Extract the [`PdtHeader`] from `PDT10` data
///
/// The header is checked against the size of `bytes`, but the planes are not decoded.
pub fn pdt_info(bytes: &[u8]) -> Result<PdtHeader, PdtError> {
    Decoder::for_bytes(bytes).header()
}

fn do_decode(
    src: &[u8],
    header: PdtHeader,
    log: &mut Option<LogWtr>,
) -> Result<Decoded, PdtError> {
    if let Some(wtr) = log {
        writeln!(wtr, "# Header\n{:?}", &header)?;
        writeln!(wtr, "## Color Plane")?;
    }

    let width = header.width as usize;
    let height = header.height as usize;
    let expected = width * height;
    let mut warnings = Vec::new();

    let mut color = decode_plane::<ColorPlane>(&src[header.color_range()], width, height, log)?;
    if color.len() != expected {
        warnings.push(IntegrityWarning::ColorPlaneShort {
            expected,
            decoded: color.len(),
        });
        // undecoded pixels stay black
        color.resize(expected, Rgb::default());
    }

    let alpha = match header.alpha_range() {
        Some(range) => {
            if let Some(wtr) = log {
                writeln!(wtr, "## Alpha Plane")?;
            }
            let alpha = decode_plane::<AlphaPlane>(&src[range], width, height, log)?;
            if alpha.len() != expected {
                warnings.push(IntegrityWarning::AlphaPlaneShort {
                    expected,
                    decoded: alpha.len(),
                });
            }
            Some(alpha)
        }
        None => None,
    };

    let image = raster::assemble(header.width, header.height, color, alpha, &mut warnings)?;

    if let Some(wtr) = log {
        for warning in &warnings {
            writeln!(wtr, "# Warning: {}", warning)?;
        }
    }

    Ok(Decoded { image, warnings })
}

/// Tracks which token the current flag byte bit refers to
#[derive(Debug, Default)]
struct FlagCursor {
    flags: u8,
    mask: u8,
}

impl FlagCursor {
    /// Move to the next token's flag bit, reading a new flag byte after every eighth token.
    /// Returns `true` if the next token is uncoded
    fn next_is_literal<R: Read>(&mut self, src: &mut BitReader<R, LittleEndian>) -> io::Result<bool> {
        self.mask >>= 1;
        if self.mask == 0 {
            self.mask = 0x80;
            self.flags = src.read(8)?;
        }

        Ok(self.flags & self.mask != 0)
    }
}

fn read_token<P: Plane, R: Read>(
    src: &mut BitReader<R, LittleEndian>,
    flags: &mut FlagCursor,
) -> io::Result<Token<P::Sample>> {
    if flags.next_is_literal(src)? {
        let raw: u32 = src.read(<P::Sample as Sample>::BITS)?;
        Ok(Token::Literal(<P::Sample as Sample>::from_wire(raw)))
    } else {
        let length: u32 = src.read(P::LENGTH_BITS)?;
        let offset: u32 = src.read(P::OFFSET_BITS)?;

        Ok(Token::BackReference {
            offset: offset as usize,
            length: length as usize + P::LENGTH_BIAS,
        })
    }
}

/// Run the token stream in `payload` through a fresh ring dictionary and slice its
/// output into `height` rows of `width` samples.
///
/// Decoding stops after the last row or when `payload` runs out; in the latter case
/// only the rows completed so far are returned.
pub(crate) fn decode_plane<P: Plane>(
    payload: &[u8],
    width: usize,
    height: usize,
    log: &mut Option<LogWtr>,
) -> Result<Vec<P::Sample>, PdtError> {
    let mut src = BitReader::endian(payload, LittleEndian);
    let mut flags = FlagCursor::default();
    let mut ring = RingDict::<P::Sample>::new();
    let mut output = Vec::with_capacity(width * height);

    let mut column = 0;
    let mut rows = 0;
    let mut produced = 0;

    while rows < height {
        let token = match read_token::<P, _>(&mut src, &mut flags) {
            Ok(token) => token,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                if let Some(wtr) = log {
                    writeln!(
                        wtr,
                        "{} plane ended early at row {} of {}",
                        P::NAME,
                        rows,
                        height
                    )?;
                }
                break;
            }
            Err(e) => return Err(e.into()),
        };

        match token {
            Token::Literal(sample) => {
                if let Some(wtr) = log {
                    writeln!(wtr, "{:06x} - Uncoded: {:?}", produced, sample)?;
                }
                ring.push(sample);
            }
            Token::BackReference { offset, length } => {
                if let Some(wtr) = log {
                    writeln!(
                        wtr,
                        "{:06x} - Encoded [Copyback]: offset: {} length: {} | start: {:03x}",
                        produced,
                        offset,
                        length,
                        ring.source_of(offset)
                    )?;
                }
                ring.copy_back(offset, length);
            }
        }
        produced += token.size();
        column += token.size();

        // a long copy can complete more than one narrow row
        while column >= width && rows < height {
            ring.drain_into(&mut output, width);
            column -= width;
            rows += 1;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode::write_plane, raster::Rgb, ring::RING_SIZE};
    use bitstream_io::BitWriter;

    const A: Rgb = Rgb::new(10, 20, 30);
    const B: Rgb = Rgb::new(40, 50, 60);
    const C: Rgb = Rgb::new(70, 80, 90);

    fn color_stream(tokens: &[Token<Rgb>]) -> Vec<u8> {
        let mut out = Vec::new();
        write_plane::<ColorPlane, _>(tokens, &mut BitWriter::endian(&mut out, LittleEndian))
            .unwrap();
        out
    }

    fn back(offset: usize, length: usize) -> Token<Rgb> {
        Token::BackReference { offset, length }
    }

    /// Wrap a color plane in an opaque container
    fn container(width: u32, height: u32, plane: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        let header = PdtHeader {
            length: (PdtHeader::SIZE + plane.len()) as u32,
            width,
            height,
            mask_offset: 0,
        };
        header
            .write(&mut BitWriter::endian(&mut buf, LittleEndian))
            .unwrap();
        buf.extend_from_slice(plane);
        buf
    }

    #[test]
    fn decode_literal_and_copy() {
        // flags 101, A, (offset 0, length 2), B
        let plane = [0xA0, 30, 20, 10, 0x01, 0x00, 60, 50, 40];
        let decoded = decode_plane::<ColorPlane>(&plane, 4, 1, &mut None).unwrap();

        assert_eq!(decoded, [A, A, A, B]);
    }

    #[test]
    fn copy_back_wraps_the_ring() {
        let run = [A, B, C, Rgb::new(1, 1, 1), Rgb::new(2, 2, 2)];
        // leaves the write cursor at 4094, so the copy crosses slot 4095 => 0
        let filler = RING_SIZE - 7;

        let mut tokens: Vec<Token<Rgb>> = (0..filler)
            .map(|i| Token::Literal(Rgb::new(0, (i >> 8) as u8, i as u8)))
            .collect();
        tokens.extend(run.iter().copied().map(Token::Literal));
        tokens.push(back(4, 5));

        let plane = color_stream(&tokens);
        let total = filler + 10;
        let decoded = decode_plane::<ColorPlane>(&plane, 1, total, &mut None).unwrap();

        assert_eq!(decoded.len(), total);
        assert_eq!(&decoded[filler..filler + 5], &run);
        assert_eq!(&decoded[filler + 5..], &run);
    }

    #[test]
    fn copy_spans_two_rows() {
        // row 0: A B | A B, row 1: A B A | C
        let plane = color_stream(&[
            Token::Literal(A),
            Token::Literal(B),
            back(1, 5),
            Token::Literal(C),
        ]);
        let decoded = decode_plane::<ColorPlane>(&plane, 4, 2, &mut None).unwrap();

        assert_eq!(&decoded[..4], &[A, B, A, B]);
        assert_eq!(&decoded[4..], &[A, B, A, C]);
    }

    #[test]
    fn long_copy_fills_several_narrow_rows() {
        let plane = color_stream(&[Token::Literal(A), back(0, 16)]);
        let decoded = decode_plane::<ColorPlane>(&plane, 1, 17, &mut None).unwrap();

        assert_eq!(decoded, vec![A; 17]);
    }

    #[test]
    fn alpha_plane_layout() {
        // flags 101, 0x40, (offset 0, length 2 + 2), 0x80
        let plane = [0xA0, 0x40, 0x02, 0x00, 0x80];
        let decoded = decode_plane::<AlphaPlane>(&plane, 3, 2, &mut None).unwrap();

        assert_eq!(decoded, [0x40, 0x40, 0x40, 0x40, 0x40, 0x80]);
    }

    #[test]
    fn short_plane_returns_finished_rows() {
        // two literals, but three rows of two are expected
        let plane = color_stream(&[Token::Literal(A), Token::Literal(B), Token::Literal(C)]);
        let decoded = decode_plane::<ColorPlane>(&plane, 2, 3, &mut None).unwrap();

        assert_eq!(decoded, [A, B]);
    }

    #[test]
    fn missing_alpha_plane_is_opaque() {
        let plane = color_stream(&[Token::Literal(A), back(0, 3)]);
        let decoded = decode(&container(2, 2, &plane)).unwrap();

        assert!(decoded.warnings.is_empty());
        assert!(decoded.image.to_rgba().chunks(4).all(|px| px[3] == 0xFF));
    }

    #[test]
    fn decode_with_alpha_plane() {
        let color = color_stream(&[Token::Literal(A), back(0, 3)]);
        // flags 1000 0000, 0x10, then (offset 0, length 3)
        let alpha = [0x80, 0x10, 0x01, 0x00];

        let mut buf = container(2, 2, &color);
        let mask_offset = buf.len() as u32;
        buf.extend_from_slice(&alpha);
        let buf_len = buf.len() as u32;
        buf[8..12].copy_from_slice(&buf_len.to_le_bytes());
        buf[28..32].copy_from_slice(&mask_offset.to_le_bytes());

        let decoded = decode(&buf).unwrap();
        assert!(decoded.warnings.is_empty());
        assert_eq!(decoded.image.alpha(), &[0x10; 4]);
        assert_eq!(decoded.image.pixel(1, 1), Some([10, 20, 30, 0x10]));
    }

    #[test]
    fn short_alpha_plane_warns() {
        let color = color_stream(&[Token::Literal(A), back(0, 3)]);
        // only the first row of alpha
        let alpha = [0xC0, 0x10, 0x20];

        let mut buf = container(2, 2, &color);
        let mask_offset = buf.len() as u32;
        buf.extend_from_slice(&alpha);
        let buf_len = buf.len() as u32;
        buf[8..12].copy_from_slice(&buf_len.to_le_bytes());
        buf[28..32].copy_from_slice(&mask_offset.to_le_bytes());

        let mut log = Vec::new();
        let decoded = Decoder::for_bytes(&buf)
            .with_logging(&mut log)
            .decode()
            .unwrap();

        assert_eq!(decoded.image.alpha(), &[0x10, 0x20, 0xFF, 0xFF]);
        assert_eq!(
            decoded.warnings,
            [
                IntegrityWarning::AlphaPlaneShort {
                    expected: 4,
                    decoded: 2
                },
                IntegrityWarning::PlaneMismatch { color: 4, alpha: 2 },
            ]
        );
        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("alpha plane ended early"));
    }

    #[test]
    fn short_color_plane_is_padded() {
        // one row of three literals for a 3x2 image
        let plane = [0xE0, 30, 20, 10, 60, 50, 40, 90, 80, 70];
        let decoded = decode(&container(3, 2, &plane)).unwrap();

        assert_eq!(
            decoded.warnings,
            [IntegrityWarning::ColorPlaneShort {
                expected: 6,
                decoded: 3
            }]
        );
        assert_eq!(decoded.image.color()[..3], [A, B, C]);
        assert_eq!(decoded.image.color()[3..], [Rgb::default(); 3]);
        assert_eq!(decoded.image.pixel(2, 1), Some([0, 0, 0, 0xFF]));
    }

    #[test]
    fn header_without_decoding() {
        let plane = color_stream(&[Token::Literal(A)]);
        let header = pdt_info(&container(1, 1, &plane)).unwrap();

        assert_eq!(header.width, 1);
        assert_eq!(header.length as usize, PdtHeader::SIZE + plane.len());
        assert!(!header.has_mask());
    }

    #[test]
    fn token_trace() {
        let plane = color_stream(&[Token::Literal(A), back(0, 3)]);
        let buf = container(2, 2, &plane);

        let mut log = Vec::new();
        Decoder::for_bytes(&buf)
            .with_logging(&mut log)
            .decode()
            .unwrap();

        let log = String::from_utf8(log).unwrap();
        assert!(log.starts_with("# Header"));
        assert!(log.contains("000000 - Uncoded"));
        assert!(log.contains("000001 - Encoded [Copyback]: offset: 0 length: 3"));
    }
}
