use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use cellverse::settings::{Settings, DEFAULT_SETTINGS_FILE};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // configure Rayon's global thread pool once at startup so worker threads get nice names like "rayon-0".
    let _ = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-{i}"))
        .build_global();

    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;

    let mut lineage = settings.build_lineage().context("building lineage")?;
    if lineage.is_empty() {
        info!("no images configured in {}, nothing to do", settings_path.display());
        return Ok(());
    }

    // frames past the seed cutoff start from the previous frame's result
    let start = settings.continue_from.unwrap_or(0);
    for i in 0..lineage.len() {
        if i >= start && lineage.frames()[i].is_empty() {
            lineage.copy_cells_forward(i)?;
        }
        lineage.optimize(i).with_context(|| format!("optimizing frame {i}"))?;
        lineage.save_images(i).with_context(|| format!("saving images of frame {i}"))?;
    }

    let csv = lineage.save_cells().context("exporting cells")?;
    info!("done, cells written to {}", csv.display());
    Ok(())
}
