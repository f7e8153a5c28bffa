use anyhow::{Context, Result};
use nom_exif::{EntryValue, Exif, ExifIter, ExifTag, LatLng, MediaParser, MediaSource};
use serde::Serialize;
use std::path::Path;

use super::gps::{Rational, dms_to_decimal};

/// Metadata read back from an image's EXIF container.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbeddedMetadata {
    pub description: Option<String>,
    pub date_time_original: Option<String>,
    pub has_gps: bool,
    pub gps_latitude_ref: Option<char>,
    pub gps_longitude_ref: Option<char>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
}

/// Read the description, capture time and GPS position embedded in an image.
///
/// An image without any EXIF block yields an empty [`EmbeddedMetadata`].
pub fn read_embedded(path: &Path) -> Result<EmbeddedMetadata> {
    let source = MediaSource::file_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut parser = MediaParser::new();
    let parsed: nom_exif::Result<ExifIter> = parser.parse(source);
    let Ok(iter) = parsed else {
        log::debug!("No EXIF data found in {}", path.display());
        return Ok(EmbeddedMetadata::default());
    };

    // GPS first: converting into Exif consumes the iterator
    let gps = iter.parse_gps_info().ok().flatten();
    let exif: Exif = iter.into();

    let text = |tag: ExifTag| exif.get(tag).and_then(text_value);
    let mut data = EmbeddedMetadata {
        description: text(ExifTag::ImageDescription),
        date_time_original: text(ExifTag::DateTimeOriginal),
        ..EmbeddedMetadata::default()
    };

    if let Some(gps) = gps {
        data.has_gps = true;
        data.gps_latitude_ref = Some(gps.latitude_ref);
        data.gps_longitude_ref = Some(gps.longitude_ref);
        data.gps_latitude = Some(dms_to_decimal(&to_dms(&gps.latitude), gps.latitude_ref));
        data.gps_longitude = Some(dms_to_decimal(&to_dms(&gps.longitude), gps.longitude_ref));
    }

    Ok(data)
}

/// Entry text without surrounding quotes; `None` when blank.
fn text_value(val: &EntryValue) -> Option<String> {
    let text = val.to_string();
    let text = text.trim().trim_matches('"');
    (!text.is_empty()).then(|| text.to_string())
}

fn to_dms(latlng: &LatLng) -> [Rational; 3] {
    [latlng.0, latlng.1, latlng.2].map(|r| Rational::new(r.0, r.1))
}
