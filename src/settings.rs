/// run settings for a cellverse fit
/// loaded from a JSON file; every field is optional and falls back to its default
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::cell::Sphere;
use crate::config::SimulationConfig;
use crate::error::{CellverseError, Result};
use crate::io::read_cells_csv;
use crate::lineage::Lineage;

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// one image (or multi-page stack) per time point, in time order
    pub image_paths: Vec<PathBuf>,
    /// root for real/, synth/ and cells.csv
    pub output_dir: PathBuf,
    /// seed cells as `file,name,x,y,z,radius` rows keyed by image path
    pub initial_cells: Option<PathBuf>,
    /// frames at or after this index ignore their seed cells
    pub continue_from: Option<usize>,
    pub simulation: SimulationConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_paths: Vec::new(),
            output_dir: PathBuf::from("output"),
            initial_cells: None,
            continue_from: None,
            simulation: SimulationConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file gives the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let settings: Settings = serde_json::from_str(&json)?;
                settings.simulation.validate()?;
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{} not found, using default settings", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(CellverseError::io(path, e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| CellverseError::io(path, e))
    }

    /// seed cells from `initial_cells`, empty when none is configured
    pub fn seed_cells(&self) -> Result<HashMap<String, Vec<Sphere>>> {
        match &self.initial_cells {
            Some(path) => read_cells_csv(path),
            None => Ok(HashMap::new()),
        }
    }

    pub fn build_lineage(&self) -> Result<Lineage> {
        let seeds = self.seed_cells()?;
        Lineage::new(
            &seeds,
            &self.image_paths,
            &self.simulation,
            &self.output_dir,
            self.continue_from,
        )
    }
}
