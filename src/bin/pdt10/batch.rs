use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{debug, error, info, warn};
use pdt10::{Decoded, Decoder, EncoderBuilder, MatchBackend};
use std::{
    ffi::OsString,
    fmt, fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

use crate::bitmap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// bitmap to PDT10
    Compress,
    /// PDT10 to bitmap
    Decompress,
}

impl Mode {
    fn inputs(self) -> &'static [&'static str] {
        match self {
            Mode::Compress => &["png", "bmp"],
            Mode::Decompress => &["pdt"],
        }
    }

    fn output(self) -> &'static str {
        match self {
            Mode::Compress => "pdt",
            Mode::Decompress => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Settings {
    pub backend: MatchBackend,
    pub trace: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub converted: usize,
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "converted {} file(s), {} failed", self.converted, self.failed)
    }
}

/// Convert every matching file directly inside `input` into `output`.
/// A file that fails is logged and skipped.
pub fn run(mode: Mode, input: &Path, output: &Path, settings: &Settings) -> Result<Summary> {
    let files = matching_files(input, mode.inputs())?;
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
    info!("{:?}: {} file(s) in {}", mode, files.len(), input.display());

    let mut summary = Summary::default();
    for src in &files {
        let dst = output_path(src, output, mode.output());
        let result = match mode {
            Mode::Compress => compress_one(src, &dst, settings),
            Mode::Decompress => decompress_one(src, &dst, settings),
        };

        match result {
            Ok(()) => {
                debug!("{} -> {}", src.display(), dst.display());
                summary.converted += 1;
            }
            Err(e) => {
                error!("{}: {:#}", src.display(), e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

/// Files directly inside `dir` whose extension is one of `exts`, ignoring case
pub fn matching_files(dir: &Path, exts: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), exts) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// `dir/<stem of src>.<ext>`
fn output_path(src: &Path, dir: &Path, ext: &str) -> PathBuf {
    let mut name = src.file_stem().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(ext);

    dir.join(name)
}

fn compress_one(src: &Path, dst: &Path, settings: &Settings) -> Result<()> {
    let image = bitmap::load(src)?;
    if image.has_transparency() {
        warn!("{}: transparency is not stored and will be lost", src.display());
    }

    let mut trace = Vec::new();
    let mut encoder = EncoderBuilder::for_image(&image);
    encoder.backend(settings.backend);
    if settings.trace {
        encoder.with_logging(&mut trace);
    }
    encoder.encode_to_file(dst).context("compressing")?;

    if settings.trace {
        write_trace(dst, &trace)?;
    }

    Ok(())
}

fn decompress_one(src: &Path, dst: &Path, settings: &Settings) -> Result<()> {
    let mut trace = Vec::new();
    let mut decoder = Decoder::for_file(src)?;
    if settings.trace {
        decoder.with_logging(&mut trace);
    }
    let Decoded { image, warnings } = decoder.decode().context("decompressing")?;

    for warning in &warnings {
        warn!("{}: {}", src.display(), warning);
    }
    bitmap::save(&image, dst)?;

    if settings.trace {
        write_trace(dst, &trace)?;
    }

    Ok(())
}

fn write_trace(dst: &Path, trace: &[u8]) -> Result<()> {
    let path = dst.with_extension("trace");
    fs::write(&path, trace).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdt10::{RasterImage, Rgb};

    /// A fresh, empty directory under the system temp dir
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pdt10-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn gradient(width: u32, height: u32) -> RasterImage {
        let color = (0..width * height)
            .map(|i| Rgb::new((i % width) as u8 * 8, (i / width) as u8 * 8, 0x40))
            .collect();
        RasterImage::opaque(width, height, color).unwrap()
    }

    #[test]
    fn extension_filter_ignores_case() {
        assert!(has_extension(Path::new("a/BG01.PDT"), &["pdt"]));
        assert!(has_extension(Path::new("cg.Bmp"), &["png", "bmp"]));
        assert!(!has_extension(Path::new("readme.txt"), &["pdt"]));
        assert!(!has_extension(Path::new("pdt"), &["pdt"]));
    }

    #[test]
    fn outputs_keep_the_stem() {
        let out = output_path(Path::new("in/ev.01.png"), Path::new("out"), "pdt");
        assert_eq!(out, Path::new("out/ev.01.pdt"));
    }

    #[test]
    fn batch_round_trip() {
        let input = scratch("in");
        let packed = scratch("packed");
        let unpacked = scratch("unpacked");

        let image = gradient(13, 7);
        bitmap::save(&image, &input.join("a.png")).unwrap();
        bitmap::save(&gradient(4, 4), &input.join("B.BMP")).unwrap();
        fs::write(input.join("notes.txt"), "skip me").unwrap();

        let settings = Settings {
            trace: true,
            ..Settings::default()
        };
        let summary = run(Mode::Compress, &input, &packed, &settings).unwrap();
        assert_eq!(summary, Summary { converted: 2, failed: 0 });
        assert!(packed.join("a.trace").exists());

        // one bad container does not stop the batch
        fs::write(packed.join("broken.pdt"), b"PDT10 but not really").unwrap();
        let summary = run(Mode::Decompress, &packed, &unpacked, &Settings::default()).unwrap();
        assert_eq!(summary, Summary { converted: 2, failed: 1 });

        assert_eq!(bitmap::load(&unpacked.join("a.png")).unwrap(), image);
    }
}
