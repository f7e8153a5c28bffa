//! # takeout-exif
//!
//! Reconcile a photo export whose metadata lives in JSON sidecar files: fold
//! each sidecar's capture time, GPS position and description back into its
//! image as EXIF, sort images into per-year folders, gather videos in one
//! place, and quarantine sidecars whose media cannot be found.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use takeout_exif::config::Config;
//! use takeout_exif::pipeline::run;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::new("Takeout/Google Photos", "Reconciled");
//!     let report = run(&config)?;
//!
//!     for record in &report.records {
//!         if let Err(ref err) = record.outcome {
//!             eprintln!("{}: {err}", record.sidecar.display());
//!         }
//!     }
//!     println!(
//!         "{} embedded, {} videos, {} quarantined",
//!         report.summary.embedded, report.summary.relocated, report.summary.quarantined
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! ```rust,no_run
//! use takeout_exif::exif::{embed_metadata, read_embedded};
//! use takeout_exif::locator::find_media;
//! use takeout_exif::sidecar::read_sidecar;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let record = read_sidecar(Path::new("Takeout/a.jpg.json"))?;
//!     let title = record.title.as_deref().unwrap_or_default();
//!
//!     if let Some(media) = find_media(Path::new("Takeout"), title) {
//!         embed_metadata(&media, &record, Path::new("out/a.jpg"), 90)?;
//!         let written = read_embedded(Path::new("out/a.jpg"))?;
//!         println!("DateTimeOriginal: {:?}", written.date_time_original);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Output Layout
//!
//! | Input | Destination |
//! |-------|-------------|
//! | Image (`jpg`, `jpeg`, `png`, `heic`, `heif`, `webp`, `gif`) | `<out>/<year>/<title>`, JPEG with EXIF |
//! | Video (`mp4`, `mov`, `avi`, `mkv`, `wmv`, `m4v`, `3gp`) | `<out>/Videos/<name>`, byte copy |
//! | Sidecar whose media is missing | `<out>/Not_Found/<sidecar>`, byte copy |
//! | Anything else | skipped and reported |
//!
//! HEIC/HEIF decoding needs the `heic` feature (libheif).
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading/saving
//! - [`sidecar`] — Sidecar JSON parsing
//! - [`exif`] — EXIF embedding, GPS encoding and reading back
//! - [`locator`] — Case-insensitive media lookup
//! - [`quarantine`] — Copies for unresolved records
//! - [`pipeline`] — Classification, routing and the parallel run

pub mod config;
pub mod exif;
pub mod locator;
pub mod pipeline;
pub mod quarantine;
pub mod sidecar;
