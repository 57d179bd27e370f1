use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::Context;
use clap::{Parser, ValueEnum, ValueHint};
use kmeans_filter::{
    EmptyClusterPolicy, Options,
    diagnostics::LogObserver,
    filter_directory, filter_image, filter_image_traced,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmptyCluster {
    Keep,
    Reseed,
}

impl From<EmptyCluster> for EmptyClusterPolicy {
    fn from(value: EmptyCluster) -> Self {
        match value {
            EmptyCluster::Keep => EmptyClusterPolicy::Keep,
            EmptyCluster::Reseed => EmptyClusterPolicy::Reseed,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Reduce an image to K colours with k-means")]
struct Args {
    /// Image file, or a directory of png/jpeg images
    #[arg(value_hint = ValueHint::AnyPath)]
    input: PathBuf,

    /// Output file (or directory when the input is a directory)
    #[arg(value_hint = ValueHint::AnyPath)]
    output: PathBuf,

    /// Number of colours
    #[arg(short, default_value_t = 3)]
    k: usize,

    /// JSON file with default options; flags below override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Give up after this many centroid updates and keep what we have
    #[arg(long)]
    max_iterations: Option<usize>,

    /// What to do with a colour that loses all of its pixels
    #[arg(long, value_enum)]
    empty_cluster: Option<EmptyCluster>,

    /// Images bigger than this are shrunk before clustering
    #[arg(long)]
    max_width: Option<u32>,
    #[arg(long)]
    max_height: Option<u32>,

    /// Write every iteration's centroids to this file as JSON lines
    #[arg(long, value_hint = ValueHint::FilePath)]
    trace: Option<PathBuf>,

    /// Log every iteration
    #[arg(long, short)]
    debug: bool,
}

fn build_options(args: &Args) -> anyhow::Result<Options> {
    let mut options = match &args.config {
        Some(path) => Options::from_json_file(path)?,
        None => Options::default(),
    };
    if let Some(v) = args.seed {
        options.seed = Some(v);
    }
    if let Some(v) = args.max_iterations {
        options.max_iterations = Some(v);
    }
    if let Some(v) = args.empty_cluster {
        options.empty_cluster = v.into();
    }
    if let Some(v) = args.max_width {
        options.max_width = v;
    }
    if let Some(v) = args.max_height {
        options.max_height = v;
    }
    Ok(options)
}

fn filter_one(args: &Args, options: &Options) -> anyhow::Result<()> {
    let report = match &args.trace {
        Some(trace) => filter_image_traced(&args.input, &args.output, trace, args.k, options)?,
        None => filter_image(&args.input, &args.output, args.k, options, &mut LogObserver)?,
    };

    if !report.fit.converged {
        eprintln!(
            "Stopped after {} iterations without converging",
            report.fit.iterations
        );
    }
    println!(
        "Wrote {} ({}x{}, {} colours, {} iterations)",
        args.output.display(),
        report.width,
        report.height,
        report.fit.centroids.len(),
        report.fit.iterations
    );

    Ok(())
}

fn filter_many(args: &Args, options: &Options) -> anyhow::Result<()> {
    anyhow::ensure!(
        args.trace.is_none(),
        "--trace only works with a single input image"
    );
    let entries = filter_directory(&args.input, &args.output, args.k, options)
        .with_context(|| format!("Walking {}", args.input.display()))?;

    let failed = entries.iter().filter(|e| e.result.is_err()).count();
    for entry in &entries {
        if let Err(e) = &entry.result {
            eprintln!("Error while filtering \"{}\": {}", entry.input.display(), e);
        }
    }
    println!(
        "Filtered {} of {} images into {}",
        entries.len() - failed,
        entries.len(),
        args.output.display()
    );
    anyhow::ensure!(failed == 0, "{} images failed", failed);

    Ok(())
}

fn is_dir(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_dir())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let options = build_options(&args).context("Loading options")?;

    let start = Instant::now();
    if is_dir(&args.input) {
        filter_many(&args, &options)?;
    } else {
        filter_one(&args, &options)?;
    }
    println!("Execution time: {:?}", start.elapsed());

    Ok(())
}
