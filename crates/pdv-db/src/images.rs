//! # Product Images
//!
//! Product pictures are copied into `<data_dir>/images/` and referenced from
//! `produtos.imagem` by file name only, so the data directory can be moved.
//!
//! ```text
//!   /home/ana/fotos/camiseta.PNG ──save_product_image(_, "CAM-001")──►
//!   <data_dir>/images/CAM-001.PNG        produtos.imagem = "CAM-001.PNG"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::AppConfig;

/// File store for product images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ImageStore { dir: dir.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        ImageStore::new(config.images_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies `source` into the store as `<code><ext>` and returns the file
    /// name to persist.
    ///
    /// Returns `None` when the source doesn't exist or the copy fails; the
    /// product is then saved without an image.
    pub fn save_product_image(&self, source: &Path, code: &str) -> Option<String> {
        if !source.is_file() {
            debug!(source = %source.display(), "Image source missing");
            return None;
        }

        let stem = file_stem_for(code)?;
        let file_name = match source.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        };
        let destination = self.dir.join(&file_name);

        let copied = fs::create_dir_all(&self.dir).and_then(|_| fs::copy(source, &destination));
        match copied {
            Ok(bytes) => {
                debug!(destination = %destination.display(), bytes, "Image saved");
                Some(file_name)
            }
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Failed to copy product image");
                None
            }
        }
    }

    /// Full path of a stored image, if the file is there.
    pub fn image_path(&self, file_name: &str) -> Option<PathBuf> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return None;
        }

        let path = self.dir.join(file_name);
        path.is_file().then_some(path)
    }
}

/// Product codes are free text; keep them from escaping the directory.
fn file_stem_for(code: &str) -> Option<String> {
    let stem: String = code
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();

    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        None
    } else {
        Some(stem)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
