use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::config::Config;
use crate::exif::embed_metadata;
use crate::locator::{MediaIndex, walk_files};
use crate::quarantine::{quarantine_file, quarantine_target};
use crate::sidecar::{MetadataRecord, read_sidecar};

/// Extensions routed to the embedding path.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif", "webp", "gif"];

/// Extensions routed to the relocation path.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "wmv", "m4v", "3gp"];

const SIDECAR_EXTENSION: &str = "json";

/// How a title is handled, decided by its extension.
///
/// # Example
///
/// ```rust
/// use takeout_exif::pipeline::MediaKind;
///
/// assert_eq!(MediaKind::classify("IMG_0001.HEIC"), MediaKind::Image);
/// assert_eq!(MediaKind::classify("clip.mov"), MediaKind::Video);
/// assert_eq!(MediaKind::classify("notes.txt"), MediaKind::Unsupported);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaKind {
    /// Decoded, re-encoded as JPEG with embedded EXIF.
    Image,
    /// Copied as-is into the video directory.
    Video,
    /// Reported and skipped.
    Unsupported,
}

impl MediaKind {
    /// Classify a title by its lower-cased extension.
    pub fn classify(title: &str) -> Self {
        let ext = Path::new(title)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else {
            Self::Unsupported
        }
    }
}

/// What a successfully processed record produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivered {
    /// An image re-encoded with embedded metadata.
    Embedded(PathBuf),
    /// A video copied into the video directory.
    Relocated(PathBuf),
}

/// Why a record produced no output.
///
/// None of these stop the run; they are collected into the [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordError {
    #[error("failed to parse sidecar: {reason}")]
    Parse { reason: String },

    #[error("sidecar has no usable title")]
    MissingTitle,

    #[error("media not found for {title}")]
    LookupMiss { title: String },

    #[error("failed to embed metadata for {title}: {reason}")]
    Embed { title: String, reason: String },

    #[error("failed to relocate {title}: {reason}")]
    Relocate { title: String, reason: String },

    #[error("unsupported file type for {title}")]
    Unsupported { title: String },
}

/// The result of processing one sidecar.
#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub sidecar: PathBuf,
    pub title: Option<String>,
    pub kind: Option<MediaKind>,
    /// The media file the title resolved to.
    pub source: Option<PathBuf>,
    pub outcome: Result<Delivered, RecordError>,
    /// Where the sidecar was copied, if it was quarantined.
    pub quarantined: Option<PathBuf>,
}

impl RecordReport {
    fn new(sidecar: &Path) -> Self {
        Self {
            sidecar: sidecar.to_path_buf(),
            title: None,
            kind: None,
            source: None,
            outcome: Err(RecordError::MissingTitle),
            quarantined: None,
        }
    }

    fn failed(mut self, error: RecordError) -> Self {
        self.outcome = Err(error);
        self
    }
}

/// Counts per outcome for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub sidecars: usize,
    pub embedded: usize,
    pub relocated: usize,
    pub parse_failures: usize,
    pub missing_titles: usize,
    pub lookup_misses: usize,
    pub embed_failures: usize,
    pub relocate_failures: usize,
    pub unsupported: usize,
    pub quarantined: usize,
    pub orphans: usize,
}

impl RunSummary {
    fn tally(records: &[RecordReport], orphans: usize) -> Self {
        let mut summary = Self {
            sidecars: records.len(),
            orphans,
            ..Self::default()
        };

        for record in records {
            match &record.outcome {
                Ok(Delivered::Embedded(_)) => summary.embedded += 1,
                Ok(Delivered::Relocated(_)) => summary.relocated += 1,
                Err(RecordError::Parse { .. }) => summary.parse_failures += 1,
                Err(RecordError::MissingTitle) => summary.missing_titles += 1,
                Err(RecordError::LookupMiss { .. }) => summary.lookup_misses += 1,
                Err(RecordError::Embed { .. }) => summary.embed_failures += 1,
                Err(RecordError::Relocate { .. }) => summary.relocate_failures += 1,
                Err(RecordError::Unsupported { .. }) => summary.unsupported += 1,
            }
            if record.quarantined.is_some() {
                summary.quarantined += 1;
            }
        }

        summary
    }

    /// Records that produced no output, unsupported types excluded.
    pub fn failed(&self) -> usize {
        self.parse_failures
            + self.missing_titles
            + self.lookup_misses
            + self.embed_failures
            + self.relocate_failures
    }
}

/// Everything a run did, record by record, sorted by sidecar path.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub records: Vec<RecordReport>,
    /// Media files that no sidecar referred to (only collected when
    /// `output.quarantine_orphans` is set).
    pub orphans: Vec<PathBuf>,
    pub summary: RunSummary,
}

/// Work left for the worker pool after planning.
struct Job {
    report: RecordReport,
    action: Action,
    source: PathBuf,
    destination: PathBuf,
}

enum Action {
    Embed(MetadataRecord),
    Relocate,
}

/// A record is either finished during planning or needs a worker.
enum Plan {
    Done(RecordReport),
    Job(Job),
}

/// Reconcile the export described by `config`.
///
/// 1. Checks that the source root exists (the only fatal error)
/// 2. Collects every `*.json` sidecar and indexes every file name, once
/// 3. Parses, classifies and resolves each sidecar; quarantines misses
/// 4. Embeds images and copies videos on a bounded worker pool
///
/// # Example
///
/// ```rust,no_run
/// use takeout_exif::config::Config;
/// use takeout_exif::pipeline::run;
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::new("Takeout/Google Photos", "Reconciled");
/// let report = run(&config)?;
/// println!("{} embedded, {} quarantined", report.summary.embedded, report.summary.quarantined);
/// # Ok(())
/// # }
/// ```
pub fn run(config: &Config) -> Result<RunReport> {
    config.validate()?;

    let source_root = config
        .source_root
        .canonicalize()
        .context("Failed to resolve source directory")?;

    if !config.output.dry_run {
        std::fs::create_dir_all(&config.output_root)
            .context("Failed to create output directory")?;
    }
    let exclude = excluded_roots(&source_root, &config.output_root)?;

    let sidecars = collect_sidecars(&source_root, &exclude);
    log::info!("Found {} sidecar(s) under {}", sidecars.len(), source_root.display());

    let index = MediaIndex::build(&source_root, &exclude);
    log::info!("Indexed {} file name(s)", index.len());
    if index.duplicates() > 0 {
        log::warn!(
            "{} file(s) share a name with an earlier file; the first in sorted order is used",
            index.duplicates()
        );
    }

    let mut records = Vec::with_capacity(sidecars.len());
    let mut jobs = Vec::new();
    for sidecar in &sidecars {
        match plan_record(sidecar, &index, config) {
            Plan::Done(report) => records.push(report),
            Plan::Job(job) => jobs.push(job),
        }
    }

    records.extend(execute_jobs(jobs, config)?);
    records.sort_by(|a, b| a.sidecar.cmp(&b.sidecar));

    if config.output.quarantine_embed_failures {
        for record in records
            .iter_mut()
            .filter(|r| matches!(r.outcome, Err(RecordError::Embed { .. })))
        {
            quarantine_sidecar(record, config);
        }
    }

    let orphans = if config.output.quarantine_orphans {
        quarantine_orphans(&index, &records, config)
    } else {
        Vec::new()
    };

    let summary = RunSummary::tally(&records, orphans.len());
    Ok(RunReport {
        records,
        orphans,
        summary,
    })
}

/// Process a single sidecar against a prebuilt index, synchronously.
pub fn process_sidecar(sidecar: &Path, index: &MediaIndex, config: &Config) -> RecordReport {
    match plan_record(sidecar, index, config) {
        Plan::Done(report) => report,
        Plan::Job(job) => execute_job(job, config),
    }
}

/// Collect every sidecar file under `root`, in sorted order.
pub fn collect_sidecars(root: &Path, exclude: &[PathBuf]) -> Vec<PathBuf> {
    walk_files(root, exclude)
        .filter(|e| is_sidecar(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Media files in the index that no record resolved to, sorted.
pub fn find_orphans(index: &MediaIndex, records: &[RecordReport]) -> Vec<PathBuf> {
    let claimed: HashSet<&Path> = records.iter().filter_map(|r| r.source.as_deref()).collect();

    let mut orphans: Vec<PathBuf> = index
        .paths()
        .filter(|p| !claimed.contains(p))
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            MediaKind::classify(&name) != MediaKind::Unsupported
        })
        .map(Path::to_path_buf)
        .collect();
    orphans.sort();
    orphans
}

fn is_sidecar(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(SIDECAR_EXTENSION))
        .unwrap_or(false)
}

/// Subtrees to skip while scanning: the output root, when it lives inside the
/// source tree.
fn excluded_roots(source_root: &Path, output_root: &Path) -> Result<Vec<PathBuf>> {
    let Ok(output) = output_root.canonicalize() else {
        return Ok(Vec::new());
    };
    if output == source_root {
        anyhow::bail!("Output directory must differ from the source directory");
    }
    if output.starts_with(source_root) {
        log::debug!("Excluding output tree {} from the scan", output.display());
        Ok(vec![output])
    } else {
        Ok(Vec::new())
    }
}

/// Parse, classify and resolve one sidecar. Anything that cannot become a job
/// is finished here, including quarantine copies.
fn plan_record(sidecar: &Path, index: &MediaIndex, config: &Config) -> Plan {
    let report = RecordReport::new(sidecar);

    let record = match read_sidecar(sidecar) {
        Ok(record) => record,
        Err(e) => {
            log::warn!("Error processing JSON file {}: {e:#}", sidecar.display());
            return Plan::Done(report.failed(RecordError::Parse {
                reason: format!("{e:#}"),
            }));
        }
    };

    let Some((title, file_name)) = record
        .title
        .as_deref()
        .and_then(|t| leaf_name(t).map(|name| (t.to_string(), name)))
    else {
        log::warn!("No usable title in {}, quarantining", sidecar.display());
        let mut report = report.failed(RecordError::MissingTitle);
        quarantine_sidecar(&mut report, config);
        return Plan::Done(report);
    };

    let kind = MediaKind::classify(&file_name);
    let mut report = RecordReport {
        title: Some(title.clone()),
        kind: Some(kind),
        ..report
    };

    if kind == MediaKind::Unsupported {
        log::info!("Unsupported file type for {title}");
        return Plan::Done(report.failed(RecordError::Unsupported { title }));
    }

    let Some(source) = index.lookup(&file_name) else {
        log::warn!("Media not found for {title}, copying sidecar to quarantine");
        let mut report = report.failed(RecordError::LookupMiss { title });
        quarantine_sidecar(&mut report, config);
        return Plan::Done(report);
    };
    report.source = Some(source.to_path_buf());

    let (action, destination) = match kind {
        MediaKind::Image => (
            Action::Embed(record.clone()),
            config.year_dir(record.year()).join(&file_name),
        ),
        _ => {
            let name = source.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(&file_name));
            (Action::Relocate, config.video_dir().join(name))
        }
    };

    Plan::Job(Job {
        report,
        action,
        source: source.to_path_buf(),
        destination,
    })
}

/// Run jobs on the worker pool. Jobs sharing a destination stay together and
/// run in sidecar order, so one destination never has two writers.
fn execute_jobs(jobs: Vec<Job>, config: &Config) -> Result<Vec<RecordReport>> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let total = jobs.len();
    let groups = group_by_destination(jobs);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.output.workers)
        .build()
        .context("Failed to build worker pool")?;
    log::info!(
        "Processing {total} media file(s) on {} worker(s)",
        pool.current_num_threads()
    );

    let done = AtomicUsize::new(0);
    let reports = pool.install(|| {
        groups
            .into_par_iter()
            .flat_map_iter(|group| {
                group
                    .into_iter()
                    .map(|job| {
                        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                        log::info!("[{n}/{total}] Processing: {}", job.source.display());
                        execute_job(job, config)
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
    });

    Ok(reports)
}

/// Group jobs by destination, ignoring case, keeping sidecar order within a
/// group. `a.jpg` and `A.JPG` name the same file on case-insensitive filesystems.
fn group_by_destination(jobs: Vec<Job>) -> Vec<Vec<Job>> {
    let mut groups: BTreeMap<String, Vec<Job>> = BTreeMap::new();
    for job in jobs {
        let key = job.destination.to_string_lossy().to_lowercase();
        groups.entry(key).or_default().push(job);
    }
    groups.into_values().collect()
}

fn execute_job(job: Job, config: &Config) -> RecordReport {
    let Job {
        mut report,
        action,
        source,
        destination,
    } = job;
    let title = report.title.clone().unwrap_or_default();

    report.outcome = match action {
        Action::Embed(record) => match deliver_image(&source, &record, &destination, config) {
            Ok(()) => Ok(Delivered::Embedded(destination)),
            Err(e) => {
                log::warn!("Failed to embed metadata for {}: {e:#}", source.display());
                Err(RecordError::Embed {
                    title,
                    reason: format!("{e:#}"),
                })
            }
        },
        Action::Relocate => match deliver_video(&source, &destination, config) {
            Ok(()) => Ok(Delivered::Relocated(destination)),
            Err(e) => {
                log::warn!("Failed to copy video {}: {e:#}", source.display());
                Err(RecordError::Relocate {
                    title,
                    reason: format!("{e:#}"),
                })
            }
        },
    };

    report
}

fn deliver_image(
    source: &Path,
    record: &MetadataRecord,
    destination: &Path,
    config: &Config,
) -> Result<()> {
    if config.output.dry_run {
        log::info!("  Would embed metadata into {}", destination.display());
        return Ok(());
    }
    ensure_parent(destination)?;
    embed_metadata(source, record, destination, config.output.jpeg_quality)?;
    log::info!("  Metadata embedded and saved to {}", destination.display());
    Ok(())
}

fn deliver_video(source: &Path, destination: &Path, config: &Config) -> Result<()> {
    if config.output.dry_run {
        log::info!("  Would copy video to {}", destination.display());
        return Ok(());
    }
    ensure_parent(destination)?;
    std::fs::copy(source, destination)
        .with_context(|| format!("Failed to copy to {}", destination.display()))?;
    log::info!("  Video copied to {}", destination.display());
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Copy the record's sidecar into quarantine (or only record where it would go,
/// on a dry run). A failed copy is logged and leaves `quarantined` empty.
fn quarantine_sidecar(report: &mut RecordReport, config: &Config) {
    let dir = config.not_found_dir();
    if config.output.dry_run {
        report.quarantined = quarantine_target(&report.sidecar, &dir);
        return;
    }
    match quarantine_file(&report.sidecar, &dir) {
        Ok(target) => report.quarantined = Some(target),
        Err(e) => log::error!("Failed to quarantine {}: {e:#}", report.sidecar.display()),
    }
}

fn quarantine_orphans(index: &MediaIndex, records: &[RecordReport], config: &Config) -> Vec<PathBuf> {
    let orphans = find_orphans(index, records);
    if !orphans.is_empty() {
        log::info!("{} media file(s) have no sidecar", orphans.len());
    }
    if !config.output.dry_run {
        let dir = config.not_found_dir();
        for orphan in &orphans {
            if let Err(e) = quarantine_file(orphan, &dir) {
                log::error!("Failed to quarantine {}: {e:#}", orphan.display());
            }
        }
    }
    orphans
}

/// Reduce a title to a bare file name so it cannot escape the output tree.
fn leaf_name(title: &str) -> Option<String> {
    Path::new(title.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        config: Config,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Takeout");
        fs::create_dir_all(&source).unwrap();
        let config = Config::new(&source, dir.path().join("Reconciled"));
        Fixture {
            _dir: dir,
            source,
            config,
        }
    }

    fn write(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn write_image(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::new(4, 4).save_with_format(path, image::ImageFormat::Png).unwrap();
    }

    // ── MediaKind::classify ──────────────────────────────────────────

    #[test]
    fn classify_images() {
        for title in ["a.jpg", "a.JPEG", "a.png", "a.HEIC", "a.heif", "a.webp", "a.gif"] {
            assert_eq!(MediaKind::classify(title), MediaKind::Image, "{title}");
        }
    }

    #[test]
    fn classify_videos() {
        for title in ["a.mp4", "a.MOV", "a.avi", "a.mkv", "a.wmv", "a.m4v", "a.3gp"] {
            assert_eq!(MediaKind::classify(title), MediaKind::Video, "{title}");
        }
    }

    #[test]
    fn classify_unsupported() {
        for title in ["a.pdf", "a.txt", "noext", "", "Album name", "a.json"] {
            assert_eq!(MediaKind::classify(title), MediaKind::Unsupported, "{title}");
        }
    }

    // ── helpers ──────────────────────────────────────────────────────

    #[test]
    fn leaf_name_strips_directories() {
        assert_eq!(leaf_name("a.jpg").as_deref(), Some("a.jpg"));
        assert_eq!(leaf_name("../../etc/a.jpg").as_deref(), Some("a.jpg"));
        assert_eq!(leaf_name(".."), None);
        assert_eq!(leaf_name(""), None);
    }

    #[test]
    fn sidecar_detection() {
        assert!(is_sidecar(Path::new("a.jpg.json")));
        assert!(is_sidecar(Path::new("A.JPG.JSON")));
        assert!(!is_sidecar(Path::new("a.jpg")));
    }

    #[test]
    fn summary_tally() {
        let ok = RecordReport {
            outcome: Ok(Delivered::Embedded(PathBuf::from("x"))),
            ..RecordReport::new(Path::new("a.json"))
        };
        let miss = RecordReport {
            quarantined: Some(PathBuf::from("q")),
            ..RecordReport::new(Path::new("b.json")).failed(RecordError::LookupMiss {
                title: "b.jpg".into(),
            })
        };
        let unsupported = RecordReport::new(Path::new("c.json"))
            .failed(RecordError::Unsupported { title: "c.txt".into() });

        let summary = RunSummary::tally(&[ok, miss, unsupported], 2);
        assert_eq!(summary.sidecars, 3);
        assert_eq!(summary.embedded, 1);
        assert_eq!(summary.lookup_misses, 1);
        assert_eq!(summary.unsupported, 1);
        assert_eq!(summary.quarantined, 1);
        assert_eq!(summary.orphans, 2);
        assert_eq!(summary.failed(), 1);
    }

    // ── process_sidecar ──────────────────────────────────────────────

    #[test]
    fn image_goes_to_year_dir() {
        let fx = fixture();
        write_image(&fx.source.join("Photos from 2021/A.JPG"));
        let sidecar = fx.source.join("Photos from 2021/a.jpg.json");
        write(
            &sidecar,
            br#"{"title":"a.jpg","photoTakenTime":{"timestamp":"1609459200"}}"#,
        );

        let index = MediaIndex::build(&fx.source, &[]);
        let report = process_sidecar(&sidecar, &index, &fx.config);

        let expected = fx.config.output_root.join("2021/a.jpg");
        assert_eq!(report.outcome, Ok(Delivered::Embedded(expected.clone())));
        assert_eq!(report.kind, Some(MediaKind::Image));
        assert!(expected.exists());
        assert!(report.quarantined.is_none());
    }

    #[test]
    fn undated_image_goes_to_unknown_year() {
        let fx = fixture();
        write_image(&fx.source.join("b.png"));
        let sidecar = fx.source.join("b.png.json");
        write(&sidecar, br#"{"title":"b.png"}"#);

        let index = MediaIndex::build(&fx.source, &[]);
        let report = process_sidecar(&sidecar, &index, &fx.config);

        let expected = fx.config.output_root.join("Unknown_Year/b.png");
        assert_eq!(report.outcome, Ok(Delivered::Embedded(expected.clone())));
        assert!(expected.exists());
    }

    #[test]
    fn video_keeps_located_name() {
        let fx = fixture();
        write(&fx.source.join("clips/MOV_1.MP4"), b"video bytes");
        let sidecar = fx.source.join("clips/mov_1.mp4.json");
        write(&sidecar, br#"{"title":"mov_1.mp4"}"#);

        let index = MediaIndex::build(&fx.source, &[]);
        let report = process_sidecar(&sidecar, &index, &fx.config);

        let expected = fx.config.output_root.join("Videos/MOV_1.MP4");
        assert_eq!(report.outcome, Ok(Delivered::Relocated(expected.clone())));
        assert_eq!(fs::read(expected).unwrap(), b"video bytes");
    }

    #[test]
    fn missing_media_is_quarantined() {
        let fx = fixture();
        let sidecar = fx.source.join("missing.jpg.json");
        let body = br#"{"title":"missing.jpg"}"#;
        write(&sidecar, body);

        let index = MediaIndex::build(&fx.source, &[]);
        let report = process_sidecar(&sidecar, &index, &fx.config);

        assert_eq!(
            report.outcome,
            Err(RecordError::LookupMiss {
                title: "missing.jpg".into()
            })
        );
        let target = fx.config.output_root.join("Not_Found/missing.jpg.json");
        assert_eq!(report.quarantined.as_deref(), Some(target.as_path()));
        assert_eq!(fs::read(target).unwrap(), body);
    }

    #[test]
    fn missing_title_is_quarantined() {
        let fx = fixture();
        let sidecar = fx.source.join("untitled.json");
        write(&sidecar, br#"{"description":"no title"}"#);

        let index = MediaIndex::build(&fx.source, &[]);
        let report = process_sidecar(&sidecar, &index, &fx.config);

        assert_eq!(report.outcome, Err(RecordError::MissingTitle));
        assert!(report.quarantined.is_some());
    }

    #[test]
    fn parse_failure_is_not_quarantined() {
        let fx = fixture();
        let sidecar = fx.source.join("broken.json");
        write(&sidecar, b"{ nope");

        let index = MediaIndex::build(&fx.source, &[]);
        let report = process_sidecar(&sidecar, &index, &fx.config);

        assert!(matches!(report.outcome, Err(RecordError::Parse { .. })));
        assert!(report.quarantined.is_none());
        assert!(!fx.config.not_found_dir().exists());
    }

    #[test]
    fn unsupported_is_skipped() {
        let fx = fixture();
        write(&fx.source.join("doc.pdf"), b"%PDF");
        let sidecar = fx.source.join("doc.pdf.json");
        write(&sidecar, br#"{"title":"doc.pdf"}"#);

        let index = MediaIndex::build(&fx.source, &[]);
        let report = process_sidecar(&sidecar, &index, &fx.config);

        assert!(matches!(report.outcome, Err(RecordError::Unsupported { .. })));
        assert!(report.quarantined.is_none());
        assert!(!fx.config.output_root.exists());
    }

    #[test]
    fn corrupt_image_is_embed_failure_without_quarantine() {
        let fx = fixture();
        write(&fx.source.join("bad.jpg"), b"not an image");
        let sidecar = fx.source.join("bad.jpg.json");
        write(&sidecar, br#"{"title":"bad.jpg"}"#);

        let index = MediaIndex::build(&fx.source, &[]);
        let report = process_sidecar(&sidecar, &index, &fx.config);

        assert!(matches!(report.outcome, Err(RecordError::Embed { .. })));
        assert!(report.quarantined.is_none());
        assert!(!fx.config.not_found_dir().exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let mut fx = fixture();
        fx.config.output.dry_run = true;
        write_image(&fx.source.join("a.jpg"));
        write(&fx.source.join("a.jpg.json"), br#"{"title":"a.jpg"}"#);
        write(&fx.source.join("missing.jpg.json"), br#"{"title":"missing.jpg"}"#);

        let index = MediaIndex::build(&fx.source, &[]);
        let ok = process_sidecar(&fx.source.join("a.jpg.json"), &index, &fx.config);
        let miss = process_sidecar(&fx.source.join("missing.jpg.json"), &index, &fx.config);

        assert!(matches!(ok.outcome, Ok(Delivered::Embedded(_))));
        assert!(miss.quarantined.is_some());
        assert!(!fx.config.output_root.exists());
    }

    // ── group_by_destination ─────────────────────────────────────────

    fn job(sidecar: &str, destination: &str) -> Job {
        Job {
            report: RecordReport::new(Path::new(sidecar)),
            action: Action::Relocate,
            source: PathBuf::from("src"),
            destination: PathBuf::from(destination),
        }
    }

    #[test]
    fn destinations_differing_in_case_share_a_group() {
        let groups = group_by_destination(vec![
            job("1.json", "/out/2021/a.jpg"),
            job("2.json", "/out/2021/b.jpg"),
            job("3.json", "/out/2021/A.JPG"),
        ]);

        assert_eq!(groups.len(), 2);
        let shared: Vec<_> = groups
            .iter()
            .find(|g| g.len() == 2)
            .unwrap()
            .iter()
            .map(|j| j.report.sidecar.clone())
            .collect();
        assert_eq!(shared, vec![PathBuf::from("1.json"), PathBuf::from("3.json")]);
    }

    // ── find_orphans ─────────────────────────────────────────────────

    #[test]
    fn orphans_exclude_claimed_and_non_media() {
        let fx = fixture();
        let claimed = fx.source.join("a.jpg");
        let orphan = fx.source.join("b.mp4");
        write(&claimed, b"x");
        write(&orphan, b"x");
        write(&fx.source.join("notes.txt"), b"x");
        write(&fx.source.join("a.jpg.json"), b"{}");

        let index = MediaIndex::build(&fx.source, &[]);
        let record = RecordReport {
            source: Some(claimed),
            ..RecordReport::new(&fx.source.join("a.jpg.json"))
        };

        assert_eq!(find_orphans(&index, &[record]), vec![orphan]);
    }
}
