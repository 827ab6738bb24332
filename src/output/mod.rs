//! Files written by the command-line driver.

pub mod obj_writer;
pub mod summary;

use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::info;

use crate::error::{AtlasError, Result};

pub use obj_writer::{ObjOutput, write_obj, write_obj_file};
pub use summary::{AtlasSummary, MeshSummary, RejectedSummary, write_summary};

/// Save each page image as `page_<n>.png` in `dir`. Returns the written paths.
pub fn write_page_images(images: &[RgbaImage], dir: &Path) -> Result<Vec<PathBuf>> {
    images
        .iter()
        .enumerate()
        .map(|(i, img)| {
            let path = dir.join(format!("page_{i}.png"));
            img.save(&path)
                .map_err(|e| AtlasError::Output(format!("Failed to write {}: {e}", path.display())))?;
            info!(page = i, path = %path.display(), "Wrote page image");
            Ok(path)
        })
        .collect()
}
