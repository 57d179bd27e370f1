use image::Rgb;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom, seq::index};

use crate::{
    config::{EmptyClusterPolicy, Options},
    diagnostics::{NoopObserver, Observer, Phase, Snapshot},
    error::{Error, Result},
};

pub type Pixel = Rgb<u8>;

/// Mean colour of a cluster. Kept in floating point between iterations so the
/// means don't drift from repeated rounding.
pub type Centroid = [f64; 3];

/// Label of a pixel that hasn't been through an assignment pass yet.
pub const UNASSIGNED: usize = usize::MAX;

pub fn to_centroid(p: Pixel) -> Centroid {
    [p[0] as f64, p[1] as f64, p[2] as f64]
}

pub fn dist_sq(p: Pixel, c: &Centroid) -> f64 {
    (p[0] as f64 - c[0]).powi(2) + (p[1] as f64 - c[1]).powi(2) + (p[2] as f64 - c[2]).powi(2)
}

/// Index of the nearest centroid. Ties go to the lowest index.
pub fn closest(p: Pixel, centroids: &[Centroid]) -> usize {
    let mut min_dist = f64::INFINITY;
    let mut min_i = 0;

    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(p, c);
        if d < min_dist {
            min_dist = d;
            min_i = i;
        }
    }

    min_i
}

/// Relabels every pixel with its nearest centroid and returns how many labels
/// changed.
pub fn assign(pixels: &[Pixel], centroids: &[Centroid], labels: &mut [usize]) -> usize {
    debug_assert_eq!(pixels.len(), labels.len());
    let mut changed = 0;

    for (pixel, label) in pixels.iter().zip(labels.iter_mut()) {
        let nearest = closest(*pixel, centroids);
        if *label != nearest {
            *label = nearest;
            changed += 1;
        }
    }

    changed
}

/// Moves every centroid to the mean of the pixels labelled with it.
///
/// Centroids with no pixels are handled according to `policy` and never become
/// NaN. Returns the number of such empty clusters.
pub fn update_centroids<R: Rng + ?Sized>(
    pixels: &[Pixel],
    labels: &[usize],
    centroids: &mut [Centroid],
    policy: EmptyClusterPolicy,
    rng: &mut R,
) -> usize {
    let k = centroids.len();
    let mut sums = vec![[0f64; 3]; k];
    let mut counts = vec![0usize; k];

    for (p, &label) in pixels.iter().zip(labels) {
        if label == UNASSIGNED {
            continue;
        }
        let sum = &mut sums[label];
        sum[0] += p[0] as f64;
        sum[1] += p[1] as f64;
        sum[2] += p[2] as f64;
        counts[label] += 1;
    }

    let mut empty = 0;
    for (i, centroid) in centroids.iter_mut().enumerate() {
        if counts[i] == 0 {
            empty += 1;
            let reseed = match policy {
                EmptyClusterPolicy::Keep => None,
                EmptyClusterPolicy::Reseed => pixels.choose(rng),
            };
            match reseed {
                Some(p) => {
                    warn!("cluster {} has no pixels, reseeding from {:?}", i, p.0);
                    *centroid = to_centroid(*p);
                }
                None => warn!("cluster {} has no pixels, keeping {:?}", i, centroid),
            }
            continue;
        }

        let n = counts[i] as f64;
        *centroid = sums[i].map(|s| s / n);
    }

    empty
}

fn check_k(k: usize, pixels: usize) -> Result<()> {
    if k == 0 || k > pixels {
        return Err(Error::InvalidClusterCount {
            requested: k,
            pixels,
        });
    }
    Ok(())
}

/// Picks `k` distinct pixels, uniformly without replacement, as starting centroids.
pub fn random_centroids<R: Rng + ?Sized>(
    pixels: &[Pixel],
    k: usize,
    rng: &mut R,
) -> Result<Vec<Centroid>> {
    check_k(k, pixels.len())?;
    Ok(index::sample(rng, pixels.len(), k)
        .into_iter()
        .map(|i| to_centroid(pixels[i]))
        .collect())
}

#[derive(Clone, Debug, PartialEq)]
pub struct KMeansFit {
    /// One label per pixel, each in `0..centroids.len()`.
    pub labels: Vec<usize>,
    pub centroids: Vec<Centroid>,
    /// Number of centroid updates performed.
    pub iterations: usize,
    /// `false` when the iteration cap stopped the loop before labels settled.
    pub converged: bool,
}

#[derive(Clone, Debug)]
pub struct KMeans {
    k: usize,
    seed: Option<u64>,
    max_iterations: Option<usize>,
    empty_cluster: EmptyClusterPolicy,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            seed: None,
            max_iterations: None,
            empty_cluster: EmptyClusterPolicy::default(),
        }
    }

    pub fn from_options(k: usize, options: &Options) -> Self {
        Self {
            k,
            seed: options.seed,
            max_iterations: options.max_iterations,
            empty_cluster: options.empty_cluster,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_empty_cluster_policy(mut self, policy: EmptyClusterPolicy) -> Self {
        self.empty_cluster = policy;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    pub fn fit(&self, pixels: &[Pixel]) -> Result<KMeansFit> {
        self.fit_with_observer(pixels, &mut NoopObserver)
    }

    pub fn fit_with_observer<O: Observer + ?Sized>(
        &self,
        pixels: &[Pixel],
        observer: &mut O,
    ) -> Result<KMeansFit> {
        let mut rng = self.rng();
        let centroids = random_centroids(pixels, self.k, &mut rng)?;
        self.run(pixels, centroids, &mut rng, observer)
    }

    /// Runs the loop from caller-chosen starting centroids. Their count is the
    /// cluster count for this run; `self.k` is not consulted.
    pub fn fit_from<O: Observer + ?Sized>(
        &self,
        pixels: &[Pixel],
        centroids: Vec<Centroid>,
        observer: &mut O,
    ) -> Result<KMeansFit> {
        check_k(centroids.len(), pixels.len())?;
        let mut rng = self.rng();
        self.run(pixels, centroids, &mut rng, observer)
    }

    fn run<O: Observer + ?Sized>(
        &self,
        pixels: &[Pixel],
        mut centroids: Vec<Centroid>,
        rng: &mut StdRng,
        observer: &mut O,
    ) -> Result<KMeansFit> {
        let mut labels = vec![UNASSIGNED; pixels.len()];
        let mut iteration = 0;

        let converged = loop {
            let changed = assign(pixels, &centroids, &mut labels);
            debug!("iteration {}: {} labels changed", iteration, changed);
            observer.observe(&Snapshot {
                pixels,
                labels: &labels,
                centroids: &centroids,
                iteration,
                phase: Phase::Assign,
            });

            if changed == 0 {
                break true;
            }
            if self.max_iterations.is_some_and(|max| iteration >= max) {
                warn!(
                    "stopping after {} iterations with {} labels still changing",
                    iteration, changed
                );
                break false;
            }

            update_centroids(pixels, &labels, &mut centroids, self.empty_cluster, rng);
            observer.observe(&Snapshot {
                pixels,
                labels: &labels,
                centroids: &centroids,
                iteration,
                phase: Phase::Update,
            });

            iteration += 1;
        };

        if converged {
            info!("converged after {} iterations, k = {}", iteration, centroids.len());
        }

        Ok(KMeansFit {
            labels,
            centroids,
            iterations: iteration,
            converged,
        })
    }
}
