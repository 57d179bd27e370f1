use anyhow::Context;
use clap::Parser;
use kmeans_filter::{
    KMeans, Samples,
    config::{DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH},
    reconstruct::palette_hex,
};

/// Print the K colours an image would be reduced to
#[derive(Parser, Debug)]
struct Args {
    file: String,

    #[arg(short, default_value_t = 4)]
    k: usize,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let Args { file, k, seed } = Args::parse();

    let samples = Samples::open(&file, DEFAULT_MAX_WIDTH, DEFAULT_MAX_HEIGHT)
        .with_context(|| format!("Reading image {}", file))?;

    let mut k_means = KMeans::new(k);
    if let Some(seed) = seed {
        k_means = k_means.with_seed(seed);
    }
    let fit = k_means.fit(&samples.pixels).context("Clustering pixels")?;

    let mut sizes = vec![0usize; fit.centroids.len()];
    for &label in &fit.labels {
        sizes[label] += 1;
    }

    let total = fit.labels.len() as f64;
    for (hex, size) in palette_hex(&fit.centroids).iter().zip(sizes) {
        println!("{} {:>6.2}%", hex, size as f64 * 100. / total);
    }

    Ok(())
}
