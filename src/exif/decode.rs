use anyhow::{Context, Result};
use image::RgbImage;
use std::io::Read;
use std::path::Path;

/// `ftyp` brands used by HEIC/HEIF files.
const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1"];

/// Decode an image file into an 8-bit RGB buffer.
///
/// Alpha channels and wider color models are flattened to RGB8. HEIC/HEIF is
/// recognized by extension or container brand and needs the `heic` feature;
/// everything else goes through the `image` crate with content sniffing, so a
/// mislabeled extension still decodes.
pub fn decode_rgb(path: &Path) -> Result<RgbImage> {
    if is_heif(path) {
        return decode_heif(path);
    }

    let img = image::ImageReader::open(path)
        .context("Failed to open image")?
        .with_guessed_format()
        .context("Failed to read image header")?
        .decode()
        .context("Failed to decode image")?;
    Ok(img.to_rgb8())
}

/// Check whether a file is HEIC/HEIF by extension, then by `ftyp` brand.
pub fn is_heif(path: &Path) -> bool {
    let by_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "heic" | "heif" | "hif"))
        .unwrap_or(false);
    if by_ext {
        return true;
    }

    let mut header = [0u8; 12];
    match std::fs::File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
        Ok(()) => &header[4..8] == b"ftyp" && HEIF_BRANDS.iter().any(|b| &header[8..12] == *b),
        Err(_) => false,
    }
}

#[cfg(feature = "heic")]
fn decode_heif(path: &Path) -> Result<RgbImage> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_file(path.to_string_lossy().as_ref())
        .map_err(|e| anyhow::anyhow!("Failed to read HEIF container: {e}"))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| anyhow::anyhow!("Failed to get primary HEIF image: {e}"))?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| anyhow::anyhow!("Failed to decode HEIF image: {e}"))?;

    let planes = decoded.planes();
    let plane = planes.interleaved.context("No interleaved RGB plane in HEIF image")?;
    let width = plane.width;
    let height = plane.height;
    let row_len = width as usize * 3;

    // Rows may be padded past width * 3.
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        let row = row
            .get(..row_len)
            .context("HEIF plane row shorter than image width")?;
        pixels.extend_from_slice(row);
    }

    RgbImage::from_raw(width, height, pixels).context("HEIF plane size does not match image size")
}

#[cfg(not(feature = "heic"))]
fn decode_heif(path: &Path) -> Result<RgbImage> {
    anyhow::bail!(
        "{} is HEIC/HEIF; rebuild with the `heic` feature to decode it",
        path.display()
    )
}
