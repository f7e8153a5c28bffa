use anyhow::{Context, Result};
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use img_parts::Bytes;
use img_parts::ImageEXIF;
use img_parts::jpeg::Jpeg;
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use serde::Serialize;
use std::path::Path;

use super::decode::decode_rgb;
use super::gps::{GeoReference, to_rational_bytes};
use crate::sidecar::MetadataRecord;

// IFD0 pointers to sub-IFDs
const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
const TAG_GPS_IFD_POINTER: u16 = 0x8825;

// GPS IFD tag IDs
const TAG_GPS_VERSION_ID: u16 = 0x0000;
const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
const TAG_GPS_LATITUDE: u16 = 0x0002;
const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
const TAG_GPS_LONGITUDE: u16 = 0x0004;

// TIFF data formats
const FORMAT_BYTE: u16 = 1;
const FORMAT_ASCII: u16 = 2;
const FORMAT_LONG: u16 = 4;
const FORMAT_RATIONAL: u16 = 5;

const IFD_ENTRY_LEN: usize = 12;

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

/// Which fields were embedded into an output image.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EmbedReport {
    pub datetime_written: bool,
    pub description_written: bool,
    pub gps_written: bool,
    pub width: u32,
    pub height: u32,
}

/// Re-encode `source` as a JPEG at `destination`, carrying the record's capture
/// time, description and location as EXIF.
///
/// The source file is never modified. The parent of `destination` must exist.
/// Any failure (unreadable source, decode or encode error, unwritable
/// destination) is returned to the caller; nothing is written on decode failure.
pub fn embed_metadata(
    source: &Path,
    record: &MetadataRecord,
    destination: &Path,
    quality: u8,
) -> Result<EmbedReport> {
    let rgb = decode_rgb(source)?;
    let (tags, mut report) = build_tags(record);
    report.width = rgb.width();
    report.height = rgb.height();

    let geo = record
        .location
        .map(|l| GeoReference::from_decimal(l.latitude, l.longitude));
    let tiff = match (build_tiff(&tags), geo.as_ref()) {
        (None, None) => None,
        (base, geo) => Some(rebuild_ifd0(&base.unwrap_or_else(empty_tiff), geo)?),
    };
    report.gps_written = geo.is_some() && tiff.is_some();

    let jpeg_bytes = encode_jpeg(&rgb, quality)?;
    let output = attach_exif(jpeg_bytes, tiff)?;

    std::fs::write(destination, &output)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    log::debug!(
        "  Embedded into {} (datetime: {}, description: {}, gps: {})",
        destination.display(),
        report.datetime_written,
        report.description_written,
        report.gps_written
    );
    Ok(report)
}

/// Collect the tags little_exif serializes: `DateTimeOriginal` in the Exif IFD
/// and `ImageDescription` in IFD0. GPS goes through [`rebuild_ifd0`].
fn build_tags(record: &MetadataRecord) -> (Vec<ExifTag>, EmbedReport) {
    let mut tags = Vec::new();
    let mut report = EmbedReport::default();

    if let Some(datetime) = record.exif_datetime() {
        tags.push(ExifTag::DateTimeOriginal(datetime));
        report.datetime_written = true;
    }

    if let Some(ref desc) = record.description {
        tags.push(ExifTag::ImageDescription(desc.clone()));
        report.description_written = true;
    }

    (tags, report)
}

/// Encode the pixel buffer as a baseline JPEG.
fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(rgb)
        .context("Failed to encode JPEG")?;
    Ok(buf)
}

/// Serialize the tags into bare TIFF data for an EXIF APP1 segment.
/// Returns `None` when there is nothing to embed.
fn build_tiff(tags: &[ExifTag]) -> Option<Vec<u8>> {
    if tags.is_empty() {
        return None;
    }

    let mut metadata = Metadata::new();
    for tag in tags {
        metadata.set_tag(tag.clone());
    }
    let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
    if exif_bytes.len() > JPEG_EXIF_OVERHEAD {
        Some(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())
    } else {
        None
    }
}

/// Little-endian TIFF header followed by an empty IFD0.
fn empty_tiff() -> Vec<u8> {
    let mut tiff = b"II*\0".to_vec();
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&0u16.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff
}

/// Byte order of a TIFF block, taken from its header.
#[derive(Debug, Clone, Copy)]
struct ByteOrder {
    big_endian: bool,
}

impl ByteOrder {
    fn detect(tiff: &[u8]) -> Result<Self> {
        match tiff.get(0..2) {
            Some(b"MM") => Ok(Self { big_endian: true }),
            Some(b"II") => Ok(Self { big_endian: false }),
            _ => anyhow::bail!("Invalid TIFF byte order"),
        }
    }

    fn u16(self, val: u16) -> [u8; 2] {
        if self.big_endian { val.to_be_bytes() } else { val.to_le_bytes() }
    }

    fn u32(self, val: u32) -> [u8; 4] {
        if self.big_endian { val.to_be_bytes() } else { val.to_le_bytes() }
    }

    fn read_u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
        Some(if self.big_endian { u16::from_be_bytes(bytes) } else { u16::from_le_bytes(bytes) })
    }

    fn read_u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(if self.big_endian { u32::from_be_bytes(bytes) } else { u32::from_le_bytes(bytes) })
    }
}

/// A raw IFD entry; the value sits inline when it fits in 4 bytes.
struct RawIfdEntry {
    tag_id: u16,
    data_format: u16,
    count: u32,
    inline_value: [u8; 4],
    extra_data: Option<Vec<u8>>,
}

impl RawIfdEntry {
    fn new(tag_id: u16, data_format: u16, count: u32, data: Vec<u8>) -> Self {
        if data.len() <= 4 {
            let mut inline_value = [0u8; 4];
            inline_value[..data.len()].copy_from_slice(&data);
            Self { tag_id, data_format, count, inline_value, extra_data: None }
        } else {
            Self { tag_id, data_format, count, inline_value: [0u8; 4], extra_data: Some(data) }
        }
    }

    fn hemisphere(tag_id: u16, reference: char) -> Self {
        let data = format!("{reference}\0").into_bytes();
        Self::new(tag_id, FORMAT_ASCII, data.len() as u32, data)
    }
}

/// GPS IFD entries in ascending tag order.
fn gps_entries(geo: &GeoReference, order: ByteOrder) -> Vec<RawIfdEntry> {
    vec![
        RawIfdEntry::new(TAG_GPS_VERSION_ID, FORMAT_BYTE, 4, vec![2, 2, 0, 0]),
        RawIfdEntry::hemisphere(TAG_GPS_LATITUDE_REF, geo.latitude_ref),
        RawIfdEntry::new(
            TAG_GPS_LATITUDE,
            FORMAT_RATIONAL,
            3,
            to_rational_bytes(&geo.latitude, order.big_endian),
        ),
        RawIfdEntry::hemisphere(TAG_GPS_LONGITUDE_REF, geo.longitude_ref),
        RawIfdEntry::new(
            TAG_GPS_LONGITUDE,
            FORMAT_RATIONAL,
            3,
            to_rational_bytes(&geo.longitude, order.big_endian),
        ),
    ]
}

/// Append `entries` as an IFD at the end of `out`, followed by their data.
fn append_ifd(out: &mut Vec<u8>, entries: &[RawIfdEntry], next: u32, order: ByteOrder) {
    let data_start = out.len() + 2 + entries.len() * IFD_ENTRY_LEN + 4;
    let mut data = Vec::new();

    out.extend_from_slice(&order.u16(entries.len() as u16));
    for entry in entries {
        out.extend_from_slice(&order.u16(entry.tag_id));
        out.extend_from_slice(&order.u16(entry.data_format));
        out.extend_from_slice(&order.u32(entry.count));
        match entry.extra_data {
            Some(ref extra) => {
                out.extend_from_slice(&order.u32((data_start + data.len()) as u32));
                data.extend_from_slice(extra);
                pad_to_word(&mut data);
            }
            None => out.extend_from_slice(&entry.inline_value),
        }
    }
    out.extend_from_slice(&order.u32(next));
    out.extend_from_slice(&data);
}

fn pad_to_word(buf: &mut Vec<u8>) {
    if buf.len() % 2 != 0 {
        buf.push(0);
    }
}

/// Append a GPS IFD for `geo` (if any) to `original`, then a copy of IFD0 that
/// points to it, and repoint the header at the new IFD0. Everything already in
/// `original` keeps its offset.
///
/// little_exif always writes an Exif IFD pointer into IFD0, even with no Exif
/// IFD behind it; sub-IFD pointers past the end of `original` are dropped.
fn rebuild_ifd0(original: &[u8], geo: Option<&GeoReference>) -> Result<Vec<u8>> {
    let order = ByteOrder::detect(original)?;

    let ifd0_offset = order
        .read_u32(original, 4)
        .context("TIFF header too short")? as usize;
    let ifd0_count = order
        .read_u16(original, ifd0_offset)
        .context("IFD0 offset out of bounds")? as usize;
    let ifd0_start = ifd0_offset + 2;
    let ifd0_end = ifd0_start + ifd0_count * IFD_ENTRY_LEN;
    let ifd0_next = order
        .read_u32(original, ifd0_end)
        .context("IFD0 entries extend beyond TIFF data")?;

    let dangling = |raw: &[u8]| match order.read_u16(raw, 0) {
        Some(TAG_GPS_IFD_POINTER) => true,
        Some(TAG_EXIF_IFD_POINTER) => order
            .read_u32(raw, 8)
            .is_none_or(|offset| offset as usize + 2 > original.len()),
        _ => false,
    };
    let mut ifd0: Vec<[u8; IFD_ENTRY_LEN]> = original[ifd0_start..ifd0_end]
        .chunks_exact(IFD_ENTRY_LEN)
        .filter(|raw| !dangling(*raw))
        .filter_map(|raw| raw.try_into().ok())
        .collect();

    let mut result = original.to_vec();
    pad_to_word(&mut result);

    if let Some(geo) = geo {
        let gps_start = result.len() as u32;
        append_ifd(&mut result, &gps_entries(geo, order), 0, order);

        let mut pointer = [0u8; IFD_ENTRY_LEN];
        pointer[0..2].copy_from_slice(&order.u16(TAG_GPS_IFD_POINTER));
        pointer[2..4].copy_from_slice(&order.u16(FORMAT_LONG));
        pointer[4..8].copy_from_slice(&order.u32(1));
        pointer[8..12].copy_from_slice(&order.u32(gps_start));
        ifd0.push(pointer);
    }
    ifd0.sort_by_key(|raw| order.read_u16(raw, 0));

    pad_to_word(&mut result);
    let new_ifd0_start = result.len() as u32;
    result.extend_from_slice(&order.u16(ifd0.len() as u16));
    for raw in &ifd0 {
        result.extend_from_slice(raw);
    }
    result.extend_from_slice(&order.u32(ifd0_next));

    result[4..8].copy_from_slice(&order.u32(new_ifd0_start));
    Ok(result)
}

/// Insert the EXIF segment into freshly encoded JPEG bytes.
fn attach_exif(jpeg_bytes: Vec<u8>, tiff: Option<Vec<u8>>) -> Result<Vec<u8>> {
    let Some(tiff) = tiff else {
        return Ok(jpeg_bytes);
    };

    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse encoded JPEG: {e}"))?;
    jpeg.set_exif(Some(Bytes::from(tiff)));
    Ok(jpeg.encoder().bytes().to_vec())
}
