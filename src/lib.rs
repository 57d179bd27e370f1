//! Colour quantization by k-means clustering.
//!
//! An image is flattened to RGB pixels, the pixels are clustered into `k`
//! groups, and every pixel is repainted with the mean colour of its group.
//!
//! ```no_run
//! use kmeans_filter::{Options, diagnostics::NoopObserver, filter_image};
//!
//! let report = filter_image("demo.jpg", "demo-out.png", 3, &Options::default(), &mut NoopObserver)?;
//! println!("{} iterations", report.fit.iterations);
//! # Ok::<(), kmeans_filter::Error>(())
//! ```

use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod k_means;
pub mod reconstruct;
pub mod sample;

pub use config::{EmptyClusterPolicy, Options};
pub use error::{Error, Result};
pub use k_means::{Centroid, KMeans, KMeansFit, Pixel};
pub use sample::Samples;

use diagnostics::{JsonLinesObserver, LogObserver, Observer, Snapshot};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Clone, Debug)]
pub struct FilterReport {
    /// Size of the output, after any downscaling.
    pub width: u32,
    pub height: u32,
    pub fit: KMeansFit,
}

/// Reduces `input` to `k` colours and writes the result to `output`.
///
/// The output format follows `output`'s extension. Nothing is written if any
/// step fails.
pub fn filter_image<O: Observer + ?Sized>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    k: usize,
    options: &Options,
    observer: &mut O,
) -> Result<FilterReport> {
    let input = input.as_ref();
    let samples = Samples::open(input, options.max_width, options.max_height)?;
    info!(
        "clustering {} ({}x{}) into {} colours",
        input.display(),
        samples.width,
        samples.height,
        k
    );

    let fit = KMeans::from_options(k, options).fit_with_observer(&samples.pixels, observer)?;
    let image = reconstruct::reconstruct(samples.width, samples.height, &fit.labels, &fit.centroids)?;
    reconstruct::save(&image, output)?;

    Ok(FilterReport {
        width: samples.width,
        height: samples.height,
        fit,
    })
}

/// Like [`filter_image`], and also writes a JSON-lines trace of every
/// iteration to `trace`. The trace is kept in memory and only written once the
/// image has been saved, so a failed run leaves neither file behind.
pub fn filter_image_traced(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    trace: impl AsRef<Path>,
    k: usize,
    options: &Options,
) -> Result<FilterReport> {
    let trace = trace.as_ref();
    let mut json = JsonLinesObserver::new(Vec::new());
    let mut observer = |s: &Snapshot<'_>| {
        json.observe(s);
        LogObserver.observe(s);
    };
    let report = filter_image(input, output, k, options, &mut observer)?;

    let buf = json.finish().map_err(|source| Error::Io {
        path: trace.to_path_buf(),
        source,
    })?;
    reconstruct::write_file(trace, &buf)?;

    Ok(report)
}

#[derive(Debug)]
pub struct BatchEntry {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<FilterReport>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Filters every png/jpeg under `input_dir`, mirroring its layout under
/// `output_dir`. A failing image is logged and recorded; the rest still run.
///
/// `output_dir` may sit inside `input_dir`; anything under it is skipped so
/// earlier outputs are never filtered again.
pub fn filter_directory(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    k: usize,
    options: &Options,
) -> Result<Vec<BatchEntry>> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir).map_err(|source| Error::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let input_root = canonical(input_dir.as_ref())?;
    let output_root = canonical(output_dir)?;
    if input_root.starts_with(&output_root) {
        return Err(Error::InputInsideOutput {
            input: input_root,
            output: output_root,
        });
    }

    let mut entries = Vec::new();
    let walker = WalkDir::new(&input_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.path().starts_with(&output_root));

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io {
            path: e.path().unwrap_or(&input_root).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }

        let input = entry.path().to_path_buf();
        let relative = input.strip_prefix(&input_root).unwrap_or(&input);
        let output = output_dir.join(relative);

        let result = match output.parent() {
            Some(parent) => std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            }),
            None => Ok(()),
        }
        .and_then(|()| filter_image(&input, &output, k, options, &mut LogObserver));

        match &result {
            Ok(report) => info!(
                "{} -> {} in {} iterations",
                input.display(),
                output.display(),
                report.fit.iterations
            ),
            Err(e) => warn!("Error while filtering {}: {}", input.display(), e),
        }

        entries.push(BatchEntry {
            input,
            output,
            result,
        });
    }

    Ok(entries)
}
