use anyhow::{Context, Result};
use image::RgbaImage;
use pdt10::RasterImage;
use std::path::Path;

/// Load any png or bmp as a raster, keeping its alpha channel
pub fn load(path: &Path) -> Result<RasterImage> {
    let bitmap = image::open(path)
        .with_context(|| format!("reading bitmap {}", path.display()))?
        .to_rgba8();
    let (width, height) = bitmap.dimensions();

    RasterImage::from_rgba(width, height, bitmap.as_raw()).map_err(Into::into)
}

/// Write a raster out as an RGBA bitmap; the format follows the extension of `path`
pub fn save(image: &RasterImage, path: &Path) -> Result<()> {
    let bitmap = RgbaImage::from_raw(image.width(), image.height(), image.to_rgba())
        .context("raster is smaller than its dimensions")?;

    bitmap
        .save(path)
        .with_context(|| format!("writing bitmap {}", path.display()))
}
