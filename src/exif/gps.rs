use serde::Serialize;

/// Seconds are stored in hundredths.
const SECONDS_DENOMINATOR: u32 = 100;

/// An unsigned EXIF RATIONAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    pub fn to_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// A location in the shape the EXIF GPS IFD stores it: hemisphere letters plus
/// degree/minute/second rational triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeoReference {
    pub latitude_ref: char,
    pub latitude: [Rational; 3],
    pub longitude_ref: char,
    pub longitude: [Rational; 3],
}

impl GeoReference {
    /// Encode decimal degrees. Non-negative values map to `N` / `E`.
    pub fn from_decimal(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude_ref: if latitude >= 0.0 { 'N' } else { 'S' },
            latitude: encode_dms(latitude),
            longitude_ref: if longitude >= 0.0 { 'E' } else { 'W' },
            longitude: encode_dms(longitude),
        }
    }

    /// Signed decimal latitude.
    pub fn latitude_decimal(&self) -> f64 {
        dms_to_decimal(&self.latitude, self.latitude_ref)
    }

    /// Signed decimal longitude.
    pub fn longitude_decimal(&self) -> f64 {
        dms_to_decimal(&self.longitude, self.longitude_ref)
    }
}

/// Split the absolute value of a decimal coordinate into degrees, minutes and
/// seconds. Degrees and minutes are truncated; seconds are rounded to 1/100.
pub fn encode_dms(value: f64) -> [Rational; 3] {
    let abs = value.abs();
    let degrees = abs.trunc();
    let minutes_float = (abs - degrees) * 60.0;
    let minutes = minutes_float.trunc();
    let seconds = ((minutes_float - minutes) * 60.0 * SECONDS_DENOMINATOR as f64).round();

    [
        Rational::new(degrees as u32, 1),
        Rational::new(minutes as u32, 1),
        Rational::new(seconds as u32, SECONDS_DENOMINATOR),
    ]
}

/// Convert a degree/minute/second triple back to signed decimal degrees.
pub fn dms_to_decimal(dms: &[Rational; 3], reference: char) -> f64 {
    let value = dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0;
    if reference == 'S' || reference == 'W' {
        -value
    } else {
        value
    }
}

/// Serialize a triple as three RATIONALs (24 bytes) in the given byte order.
pub fn to_rational_bytes(dms: &[Rational; 3], big_endian: bool) -> Vec<u8> {
    let encode = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let mut bytes = Vec::with_capacity(24);
    for r in dms {
        bytes.extend_from_slice(&encode(r.numerator));
        bytes.extend_from_slice(&encode(r.denominator));
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// One hundredth of an arcsecond, in degrees.
    const QUANTUM: f64 = 1.0 / 360_000.0;

    #[test]
    fn zero_is_north_east() {
        let geo = GeoReference::from_decimal(0.0, 0.0);
        assert_eq!(geo.latitude_ref, 'N');
        assert_eq!(geo.longitude_ref, 'E');
        let zero = [Rational::new(0, 1), Rational::new(0, 1), Rational::new(0, 100)];
        assert_eq!(geo.latitude, zero);
        assert_eq!(geo.longitude, zero);
    }

    #[test]
    fn hemispheres() {
        let geo = GeoReference::from_decimal(40.0, -74.0);
        assert_eq!(geo.latitude_ref, 'N');
        assert_eq!(geo.longitude_ref, 'W');
        assert_eq!(geo.latitude[0], Rational::new(40, 1));
        assert_eq!(geo.longitude[0], Rational::new(74, 1));

        let geo = GeoReference::from_decimal(-33.8688, 151.2093);
        assert_eq!(geo.latitude_ref, 'S');
        assert_eq!(geo.longitude_ref, 'E');
    }

    #[test]
    fn known_value() {
        // 48.8584 N = 48° 51' 30.24"
        let dms = encode_dms(48.8584);
        assert_eq!(dms[0], Rational::new(48, 1));
        assert_eq!(dms[1], Rational::new(51, 1));
        assert_eq!(dms[2], Rational::new(3024, 100));
    }

    #[test]
    fn negative_input_uses_magnitude() {
        assert_eq!(encode_dms(-12.5), encode_dms(12.5));
        assert_eq!(encode_dms(-12.5)[1], Rational::new(30, 1));
    }

    #[test]
    fn decode_signs() {
        let geo = GeoReference::from_decimal(-10.25, -20.5);
        assert!((geo.latitude_decimal() + 10.25).abs() < QUANTUM);
        assert!((geo.longitude_decimal() + 20.5).abs() < QUANTUM);
    }

    #[test]
    fn rational_bytes_layout() {
        let bytes = to_rational_bytes(&encode_dms(40.5), false);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], &40u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &30u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &100u32.to_le_bytes());

        let bytes = to_rational_bytes(&encode_dms(40.5), true);
        assert_eq!(&bytes[0..4], &40u32.to_be_bytes());
        assert_eq!(&bytes[20..24], &100u32.to_be_bytes());
    }

    proptest! {
        #[test]
        fn round_trip_within_quantum(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let geo = GeoReference::from_decimal(lat, lon);
            prop_assert!((geo.latitude_decimal() - lat).abs() <= QUANTUM);
            prop_assert!((geo.longitude_decimal() - lon).abs() <= QUANTUM);
        }
    }
}
