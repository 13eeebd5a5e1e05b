// Crawl results on disk: one JSON file per brand.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lugnut_walker::BrandRecord;
use thiserror::Error;
use tracing::{debug, warn};

/// Reasons a store write can fail. Reads never fail; they fall back to an
/// empty store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory view of one brand file.
///
/// A file holds a mapping from brand name to record, pretty-printed, keys in
/// insertion order. Loading never fails: a missing file is an empty store,
/// and a corrupt one is logged and treated the same, since the crawl that is
/// loading it is about to overwrite the brand anyway.
#[derive(Debug, Default)]
pub struct ResultStore {
    brands: IndexMap<String, BrandRecord>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no existing results at {}", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!("could not read {}, starting fresh: {}", path.display(), e);
                return Self::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(brands) => Self { brands },
            Err(e) => {
                warn!("could not parse {}, starting fresh: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Replace one brand's record wholesale. Every other brand in the store
    /// stays exactly as loaded.
    pub fn merge(&mut self, brand: String, record: BrandRecord) {
        self.brands.insert(brand, record);
    }

    pub fn get(&self, brand: &str) -> Option<&BrandRecord> {
        self.brands.get(brand)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BrandRecord)> {
        self.brands.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }

    /// Write the store to disk, pretty-printed, through a sibling temp file
    /// so an interrupted write cannot leave a half-written result behind.
    pub fn persist(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let pretty = serde_json::to_string_pretty(&self.brands)?;

        let tmp = temp_path(path);
        fs::write(&tmp, pretty)?;
        match fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(e.into())
            }
        }
    }
}

/// File a brand's results live in, with path separators flattened out of the
/// brand name.
pub fn brand_file(dir: &Path, brand: &str) -> PathBuf {
    let safe: String = brand
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    dir.join(format!("{safe}.json"))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "results.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
