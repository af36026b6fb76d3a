use std::path::Path;

use image::GrayImage;

use crate::error::{CellverseError, Result};

/// Write `<dir>/<k>.png` for every slice, creating `dir` on demand.
pub fn save_slices(dir: &Path, slices: &[GrayImage]) -> Result<()> {
    profiling::scope!("save_slices");
    std::fs::create_dir_all(dir).map_err(|e| CellverseError::io(dir, e))?;
    for (k, slice) in slices.iter().enumerate() {
        slice.save(dir.join(format!("{k}.png")))?;
    }
    Ok(())
}
