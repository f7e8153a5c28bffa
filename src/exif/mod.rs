//! EXIF metadata embedding and reading.
//!
//! - [`embed_metadata`] — decode an image, attach a fresh EXIF tree built from a
//!   sidecar record, and write it out as JPEG
//! - [`read_embedded`] — read back what was embedded
//! - [`gps`] — decimal degrees ⇄ EXIF degree/minute/second rationals

pub mod decode;
pub mod gps;
mod reader;
mod writer;

pub use gps::{GeoReference, Rational};
pub use reader::{EmbeddedMetadata, read_embedded};
pub use writer::{EmbedReport, embed_metadata};
