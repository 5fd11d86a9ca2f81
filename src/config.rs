//! Configuration management for zipcrawl using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::BrowserEngineConfig;
use crate::crawl::{DelayPolicy, RecoveryPolicy, SiteProfile};
use crate::error::{CrawlError, CrawlResult};
use crate::models::Target;
use crate::regions;

/// Default region when neither config nor CLI names one.
pub const DEFAULT_REGION: &str = "dfw";

/// Default page bound per target.
pub const DEFAULT_MAX_PAGES: u32 = 20;

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "json";

/// Resolved runtime settings for one crawl.
#[derive(Debug, Clone)]
pub struct Settings {
    pub region_label: String,
    pub targets: Vec<Target>,
    pub max_pages: u32,
    pub output_dir: PathBuf,
    /// Extra copy of the merged dataset, written only if its directory exists.
    pub mirror_path: Option<PathBuf>,
    /// Directory for per-page HTML dumps.
    pub dump_html: Option<PathBuf>,
    pub browser: BrowserEngineConfig,
    pub site: SiteProfile,
    pub pacing: DelayPolicy,
    pub recovery: RecoveryPolicy,
}

impl Settings {
    pub fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.timeout)
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Built-in region label (see `zipcrawl regions`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Explicit target list; replaces the region's list when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    /// Maximum pages per target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    /// Output directory for per-target and merged files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Extra copy of the merged dataset (e.g. a frontend's public dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_path: Option<String>,
    /// Save every fetched page's HTML here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_html: Option<String>,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub site: SiteProfile,
    #[serde(default)]
    pub pacing: DelayPolicy,
    #[serde(default)]
    pub recovery: RecoveryPolicy,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers zipcrawl config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("zipcrawl").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config {}: {}", path.display(), e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            // No config file found, use defaults with env overrides
            Err(_) => Self::default_with_env(),
        }
    }

    /// Create a default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.browser = config.browser.with_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> CrawlResult<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CrawlError::Config(format!("Failed to read config file: {}", e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;

        config.source_path = Some(path.to_path_buf());
        config.browser = config.browser.with_env_overrides();
        Ok(config)
    }

    /// Parse config text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> CrawlResult<Self> {
        let config = match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| CrawlError::Config(format!("Failed to parse TOML config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| CrawlError::Config(format!("Failed to parse YAML config: {}", e)))?,
            _ => serde_json::from_str(contents)
                .map_err(|e| CrawlError::Config(format!("Failed to parse JSON config: {}", e)))?,
        };
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Resolve into runtime settings. `base_dir` anchors relative paths
    /// (typically the config file's directory or the CWD).
    pub fn settings(&self, base_dir: &Path) -> CrawlResult<Settings> {
        let region_label = self
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let targets = if self.targets.is_empty() {
            regions::find(&region_label)
                .map(|r| r.targets())
                .ok_or_else(|| {
                    CrawlError::Config(format!(
                        "Unknown region '{}' and no explicit targets",
                        region_label
                    ))
                })?
        } else {
            Target::unique(
                self.targets
                    .iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .map(Target::new),
            )
        };

        let max_pages = self.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
        if max_pages == 0 {
            return Err(CrawlError::Config("max_pages must be at least 1".into()));
        }

        Ok(Settings {
            region_label,
            targets,
            max_pages,
            output_dir: self.resolve_path(
                self.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR),
                base_dir,
            ),
            mirror_path: self
                .mirror_path
                .as_deref()
                .map(|p| self.resolve_path(p, base_dir)),
            dump_html: self
                .dump_html
                .as_deref()
                .map(|p| self.resolve_path(p, base_dir)),
            browser: self.browser.clone(),
            site: self.site.clone(),
            pacing: self.pacing.clone(),
            recovery: self.recovery,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::DelayRange;

    #[test]
    fn test_defaults_resolve_to_dfw() {
        let settings = Config::default().settings(Path::new("/work")).unwrap();

        assert_eq!(settings.region_label, "dfw");
        assert_eq!(settings.targets.len(), regions::DFW.zipcodes.len());
        assert_eq!(settings.max_pages, 20);
        assert_eq!(settings.output_dir, PathBuf::from("/work/json"));
        assert!(settings.mirror_path.is_none());
        assert_eq!(settings.recovery, RecoveryPolicy::default());
    }

    #[test]
    fn test_toml_sections() {
        let config = Config::parse(
            r#"
region = "dfw"
targets = ["75071", " 75070"]
max_pages = 5
output_dir = "out"
mirror_path = "/srv/frontend/public/listings.json"

[browser]
headless = false
timeout = 30

[site]
block_title_markers = ["denied", "captcha", "press & hold"]

[pacing.recovery]
min_ms = 1000
max_ms = 1000

[recovery]
failure_threshold = 2
"#,
            "toml",
        )
        .unwrap();
        let settings = config.settings(Path::new("/work")).unwrap();

        assert_eq!(
            settings.targets,
            vec![Target::from("75071"), Target::from("75070")]
        );
        assert_eq!(settings.max_pages, 5);
        assert_eq!(settings.output_dir, PathBuf::from("/work/out"));
        assert_eq!(
            settings.mirror_path,
            Some(PathBuf::from("/srv/frontend/public/listings.json"))
        );
        assert!(!settings.browser.headless);
        assert_eq!(settings.nav_timeout(), Duration::from_secs(30));
        assert_eq!(settings.site.block_title_markers.len(), 3);
        assert_eq!(settings.site.id_field, "zpid");
        assert_eq!(settings.pacing.recovery, DelayRange::fixed_secs(1));
        assert_eq!(settings.recovery.failure_threshold, 2);
        assert_eq!(settings.recovery.max_recoveries, 3);
    }

    #[test]
    fn test_yaml_and_json() {
        let yaml = Config::parse("region: dfw\nmax_pages: 3\n", "yml").unwrap();
        assert_eq!(yaml.max_pages, Some(3));

        let json = Config::parse(r#"{"targets": ["11111"]}"#, "json").unwrap();
        assert_eq!(json.targets, vec!["11111".to_string()]);
    }

    #[test]
    fn test_unknown_region_without_targets() {
        let config = Config {
            region: Some("atlantis".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.settings(Path::new(".")),
            Err(CrawlError::Config(_))
        ));
    }

    #[test]
    fn test_zero_max_pages_rejected() {
        let config = Config::parse("max_pages = 0\n", "toml").unwrap();
        assert!(matches!(
            config.settings(Path::new(".")),
            Err(CrawlError::Config(_))
        ));
    }

    #[test]
    fn test_duplicate_targets_keep_first() {
        let config = Config::parse(
            r#"targets = ["75071", "75070", " 75071", ""]"#,
            "toml",
        )
        .unwrap();
        let settings = config.settings(Path::new(".")).unwrap();

        assert_eq!(
            settings.targets,
            vec![Target::from("75071"), Target::from("75070")]
        );
    }

    #[test]
    fn test_resolve_path() {
        let config = Config::default();
        assert_eq!(
            config.resolve_path("/abs/dir", Path::new("/base")),
            PathBuf::from("/abs/dir")
        );
        assert_eq!(
            config.resolve_path("rel", Path::new("/base")),
            PathBuf::from("/base/rel")
        );
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zipcrawl.toml");
        std::fs::write(&path, "max_pages = 7\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.max_pages, Some(7));
        assert_eq!(config.base_dir(), Some(dir.path().to_path_buf()));
    }
}
