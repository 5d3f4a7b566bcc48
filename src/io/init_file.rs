//! Initialization descriptions stored as YAML.
//!
//! ```yaml
//! type: towel_corners
//! towel_corners:
//!   corners: [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]]
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::error::TrackingError;
use crate::tracking::{InitializationService, ObjectInitMsg, ObservedPointSet};

pub fn load_init_yaml<P: AsRef<Path>>(path: P) -> Result<ObjectInitMsg> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let init: ObjectInitMsg = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(init)
}

/// Initialization service answering every request with the description
/// stored in a file. The cloud is not inspected.
#[derive(Debug, Clone)]
pub struct FileInitializationService {
    path: PathBuf,
}

impl FileInitializationService {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl InitializationService for FileInitializationService {
    fn request(&mut self, cloud: &ObservedPointSet) -> Result<ObjectInitMsg, TrackingError> {
        info!(
            "Requesting initialization from {} for a cloud of {} points",
            self.path.display(),
            cloud.len()
        );
        load_init_yaml(&self.path).map_err(|e| TrackingError::InitializationFailed(format!("{:#}", e)))
    }
}
