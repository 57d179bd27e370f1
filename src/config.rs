use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest image fed to the clusterer; bigger inputs are thumbnailed to fit.
pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// What to do with a centroid that ended an assignment pass with no pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyClusterPolicy {
    /// Leave the centroid where it was.
    #[default]
    Keep,
    /// Move the centroid onto a randomly chosen pixel.
    Reseed,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Options {
    /// Seed for centroid initialization. `None` draws from the thread rng.
    pub seed: Option<u64>,
    /// Stop after this many centroid updates even if labels are still moving.
    pub max_iterations: Option<usize>,
    pub empty_cluster: EmptyClusterPolicy,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            seed: None,
            max_iterations: None,
            empty_cluster: EmptyClusterPolicy::Keep,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

impl Options {
    pub fn from_json_str(path: &Path, s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(path, &s)
    }
}
