use std::path::{Component, Path, PathBuf};

use core_types::config::AssetsConfig;
use core_types::{AssetPath, ListingId};
use tracing::debug;

/// Maps listing ids to gallery images, falling back to a configured placeholder.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    dir: PathBuf,
    extensions: Vec<String>,
    default_path: PathBuf,
}

impl AssetResolver {
    pub fn new(dir: impl Into<PathBuf>, default_path: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extensions: vec!["png".into()],
            default_path: default_path.into(),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let exts: Vec<String> = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if !exts.is_empty() {
            self.extensions = exts;
        }
        self
    }

    pub fn from_config(cfg: &AssetsConfig, dir: PathBuf, default_path: PathBuf) -> Self {
        Self::new(dir, default_path).with_extensions(cfg.extensions.iter().cloned())
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Never fails: a missing asset is the common case, not an error.
    pub fn resolve(&self, id: &ListingId) -> AssetPath {
        if !is_plain_file_stem(id.as_str()) {
            debug!(listing_id = %id, "listing id is not a plain file name; using placeholder");
            return AssetPath::Placeholder(self.default_path.clone());
        }
        for ext in &self.extensions {
            let candidate = self.dir.join(format!("{id}.{ext}"));
            if candidate.is_file() {
                return AssetPath::Found(candidate);
            }
        }
        debug!(listing_id = %id, "image missing for listing; using placeholder");
        AssetPath::Placeholder(self.default_path.clone())
    }
}

/// Ids must name a file directly inside the asset directory.
fn is_plain_file_stem(raw: &str) -> bool {
    let mut components = Path::new(raw).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !raw.contains(['/', '\\'])
}
