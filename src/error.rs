use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// K was zero or larger than the number of pixels available to sample from.
    #[error("invalid cluster count: requested {requested}, but image has {pixels} pixels")]
    InvalidClusterCount { requested: usize, pixels: usize },

    #[error("label buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch { len: usize, width: u32, height: u32 },

    #[error("pixel {index} has label {label}, but only {k} centroids exist")]
    LabelOutOfRange { index: usize, label: usize, k: usize },

    /// The input directory lies inside the output directory, so every output
    /// would be picked up again as an input.
    #[error("input {} is inside output directory {}", .input.display(), .output.display())]
    InputInsideOutput { input: PathBuf, output: PathBuf },

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error on {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
