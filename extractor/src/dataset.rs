use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ExtractionError;

const IMAGE_EXTENSION: &str = "tif";

/// Directory of `<finger>_<impression>.tif` images.
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    root: PathBuf,
}

impl ImageDirectory {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        ImageDirectory { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the image named `image`, which must exist.
    pub fn resolve(&self, image: &str) -> Result<PathBuf, ExtractionError> {
        let path = self.root.join(format!("{}.{}", image, IMAGE_EXTENSION));
        if path.is_file() {
            Ok(path)
        } else {
            Err(ExtractionError::NotFound(path))
        }
    }

    /// Distinct finger ids, the first two `_`-separated parts of every image name, sorted.
    pub fn ids(&self) -> Result<Vec<String>, ExtractionError> {
        let mut ids = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != IMAGE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                let id: Vec<&str> = stem.splitn(3, '_').take(2).collect();
                ids.insert(id.join("_"));
            }
        }
        Ok(ids.into_iter().collect())
    }
}
