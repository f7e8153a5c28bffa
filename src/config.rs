use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a reconciliation run.
///
/// Names the export to scan, where the reconciled tree goes, how that tree is
/// laid out, and how the run behaves (dry run, worker count, quarantine policy).
///
/// # Loading
///
/// ```rust,no_run
/// use takeout_exif::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.source_root = "/exports/Takeout/Google Photos".into();
/// config.output_root = "/photos/reconciled".into();
/// config.output.workers = 4;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the export: scanned for sidecars and media files.
    pub source_root: PathBuf,
    /// Root of the reconciled output tree.
    pub output_root: PathBuf,
    /// Names of the fixed subdirectories under `output_root`.
    pub layout: LayoutConfig,
    /// Run behavior.
    pub output: OutputConfig,
}

/// Subdirectory names under the output root.
///
/// Dated images go to `<output_root>/<year>`; everything else lands in one of
/// these fixed buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Quarantine for sidecars whose media could not be located.
    pub not_found_subdir: String,
    /// Flat directory for relocated videos.
    pub video_subdir: String,
    /// Bucket for images whose capture time could not be extracted.
    pub unknown_year_subdir: String,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// If `true`, plan and report every record without writing anything.
    pub dry_run: bool,
    /// JPEG quality (1-100) used when re-encoding images.
    pub jpeg_quality: u8,
    /// Worker threads for the embed/copy stage. `0` lets rayon pick.
    pub workers: usize,
    /// Also copy the sidecar to quarantine when a located image fails to embed.
    pub quarantine_embed_failures: bool,
    /// Copy media files that no sidecar refers to into quarantine.
    pub quarantine_orphans: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            not_found_subdir: "Not_Found".to_string(),
            video_subdir: "Videos".to_string(),
            unknown_year_subdir: "Unknown_Year".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            jpeg_quality: 90,
            workers: 0,
            quarantine_embed_failures: false,
            quarantine_orphans: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("Takeout"),
            output_root: PathBuf::from("Reconciled"),
            layout: LayoutConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Build a config for the given roots with default layout and behavior.
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            ..Self::default()
        }
    }

    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Check the preconditions of a run.
    ///
    /// A missing source root is the only condition that stops a run before any
    /// record is processed.
    pub fn validate(&self) -> Result<()> {
        if !self.source_root.is_dir() {
            anyhow::bail!(
                "Source directory {} does not exist",
                self.source_root.display()
            );
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            anyhow::bail!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.output.jpeg_quality
            );
        }
        Ok(())
    }

    /// Quarantine directory for unresolved sidecars.
    pub fn not_found_dir(&self) -> PathBuf {
        self.output_root.join(&self.layout.not_found_subdir)
    }

    /// Flat output directory for relocated videos.
    pub fn video_dir(&self) -> PathBuf {
        self.output_root.join(&self.layout.video_subdir)
    }

    /// Output directory for images captured in `year`, or the unknown-year
    /// bucket when no capture time is known.
    pub fn year_dir(&self, year: Option<i32>) -> PathBuf {
        match year {
            Some(y) => self.output_root.join(y.to_string()),
            None => self.output_root.join(&self.layout.unknown_year_subdir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_export_layout() {
        let config = Config::default();
        assert_eq!(config.layout.not_found_subdir, "Not_Found");
        assert_eq!(config.layout.video_subdir, "Videos");
        assert_eq!(config.output.jpeg_quality, 90);
        assert!(!config.output.dry_run);
        assert!(!config.output.quarantine_embed_failures);
    }

    #[test]
    fn derived_directories() {
        let config = Config::new("/in", "/out");
        assert_eq!(config.not_found_dir(), PathBuf::from("/out/Not_Found"));
        assert_eq!(config.video_dir(), PathBuf::from("/out/Videos"));
        assert_eq!(config.year_dir(Some(2021)), PathBuf::from("/out/2021"));
        assert_eq!(config.year_dir(None), PathBuf::from("/out/Unknown_Year"));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config.layout.video_subdir, "Videos");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"source_root": "/a", "output": {"workers": 3}}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.source_root, PathBuf::from("/a"));
        assert_eq!(config.output.workers, 3);
        assert_eq!(config.output.jpeg_quality, 90);
        assert_eq!(config.layout.not_found_subdir, "Not_Found");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::new("/src", "/dst");
        config.layout.video_subdir = "Clips".to_string();
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.output_root, PathBuf::from("/dst"));
        assert_eq!(loaded.layout.video_subdir, "Clips");
    }

    #[test]
    fn validate_rejects_missing_source() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("absent"), dir.path().join("out"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_quality() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(dir.path(), dir.path().join("out"));
        assert!(config.validate().is_ok());
        config.output.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }
}
