//! Application configuration loaded from TOML with environment overrides.
//!
//! Resolution order: explicit path, `HOMEMATCH_CONFIG`, then `homematch.toml`
//! in the working directory. A missing file is created with defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "HOMEMATCH_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "homematch.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub catalog: CatalogConfig,
    pub index: IndexConfig,
    pub assets: AssetsConfig,
    pub search: SearchConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub data_dir: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            data_dir: ".".into(),
        }
    }
}

/// How a cached catalog snapshot is checked against its source table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotValidation {
    /// Any readable snapshot is used as-is; delete it by hand when the CSV changes.
    #[default]
    Trust,
    /// Snapshot is used only when its stored SHA-256 matches the current source bytes.
    Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub listings_csv: String,
    /// Empty disables the snapshot cache.
    pub snapshot_path: String,
    pub snapshot_validation: SnapshotValidation,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            listings_csv: "listings.csv".into(),
            snapshot_path: "listings_cache.bin".into(),
            snapshot_validation: SnapshotValidation::Trust,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// JSON-lines file of precomputed vectors; empty embeds catalog descriptions at startup.
    pub vectors_path: String,
    pub dimension: usize,
    pub timeout_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            vectors_path: String::new(),
            dimension: 384,
            timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub images_dir: String,
    pub default_image: String,
    pub extensions: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            images_dir: "images".into(),
            default_image: "default_image.png".into(),
            extensions: vec!["png".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub fanout: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { fanout: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Empty logs to stderr only.
    pub file: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// Resolve a configured path against `app.data_dir` unless it is already absolute.
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let p = Path::new(raw);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            Path::new(&self.app.data_dir).join(p)
        }
    }

    /// Optional path: empty strings mean "not configured".
    pub fn resolve_optional(&self, raw: &str) -> Option<PathBuf> {
        if raw.trim().is_empty() {
            None
        } else {
            Some(self.resolve_path(raw))
        }
    }

    /// Apply environment overrides (`LISTINGS_CSV`, `IMAGES_DIR`, ...).
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LISTINGS_CSV") {
            self.catalog.listings_csv = v;
        }
        if let Some(v) = lookup("CACHE_FILE") {
            self.catalog.snapshot_path = v;
        }
        if let Some(v) = lookup("VECTORS_PATH") {
            self.index.vectors_path = v;
        }
        if let Some(v) = lookup("IMAGES_DIR") {
            self.assets.images_dir = v;
        }
        if let Some(v) = lookup("DEFAULT_IMAGE") {
            self.assets.default_image = v;
        }
        if let Some(v) = lookup("HOMEMATCH_FANOUT") {
            match v.parse::<usize>() {
                Ok(k) if k > 0 => self.search.fanout = k,
                _ => tracing::warn!(value = %v, "ignoring invalid HOMEMATCH_FANOUT"),
            }
        }
        if let Some(v) = lookup("HOMEMATCH_LOG") {
            self.logging.level = v;
        }
    }
}

/// Load the config from disk, writing defaults when the file does not exist yet.
pub fn load_or_create_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str::<AppConfig>(&raw)
            .with_context(|| format!("parse config {}", path.display()))?
    } else {
        let cfg = AppConfig::default();
        let rendered = toml::to_string_pretty(&cfg).context("render default config")?;
        if let Err(err) = fs::write(&path, rendered) {
            tracing::warn!(path = %path.display(), error = %err, "could not write default config");
        }
        cfg
    };

    cfg.apply_env_overrides();
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_created_with_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("homematch.toml");
        let cfg = load_or_create_config(Some(&path))?;
        assert!(path.exists());
        assert_eq!(cfg.search.fanout, 5);
        assert_eq!(cfg.catalog.snapshot_validation, SnapshotValidation::Trust);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cfg.toml");
        fs::write(
            &path,
            "[search]\nfanout = 8\n[catalog]\nsnapshot_validation = \"fingerprint\"\n",
        )?;
        let cfg = load_or_create_config(Some(&path))?;
        assert_eq!(cfg.search.fanout, 8);
        assert_eq!(cfg.catalog.snapshot_validation, SnapshotValidation::Fingerprint);
        assert_eq!(cfg.catalog.listings_csv, "listings.csv");
        assert_eq!(cfg.assets.extensions, vec!["png".to_string()]);
        Ok(())
    }

    #[test]
    fn overrides_replace_paths_and_skip_bad_fanout() {
        let vars: HashMap<&str, &str> = [
            ("IMAGES_DIR", "/srv/images"),
            ("DEFAULT_IMAGE", "/srv/none.png"),
            ("HOMEMATCH_FANOUT", "zero"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| (*v).to_string()));
        assert_eq!(cfg.assets.images_dir, "/srv/images");
        assert_eq!(cfg.assets.default_image, "/srv/none.png");
        assert_eq!(cfg.search.fanout, 5);
    }

    #[test]
    fn relative_paths_resolve_under_data_dir() {
        let mut cfg = AppConfig::default();
        cfg.app.data_dir = "/var/lib/homematch".into();
        assert_eq!(
            cfg.resolve_path("listings.csv"),
            PathBuf::from("/var/lib/homematch/listings.csv")
        );
        assert!(cfg.resolve_optional("  ").is_none());
    }
}
