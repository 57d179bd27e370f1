//! Read-only hooks into the k-means loop.
//!
//! The loop hands an [`Observer`] a [`Snapshot`] after every assignment pass
//! and every centroid update. Observers only get shared borrows, so nothing
//! they do can change labels, centroids or when the loop stops.

use std::io::{self, Write};

use image::Rgb;
use log::debug;
use serde::Serialize;

use crate::k_means::{Centroid, UNASSIGNED};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Labels were just recomputed.
    Assign,
    /// Centroids were just recomputed.
    Update,
}

#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    pub pixels: &'a [Rgb<u8>],
    pub labels: &'a [usize],
    pub centroids: &'a [Centroid],
    pub iteration: usize,
    pub phase: Phase,
}

impl Snapshot<'_> {
    /// Number of pixels currently labelled with each centroid.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in self.labels {
            if label != UNASSIGNED {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

pub trait Observer {
    fn observe(&mut self, snapshot: &Snapshot<'_>);
}

impl<F> Observer for F
where
    F: FnMut(&Snapshot<'_>),
{
    fn observe(&mut self, snapshot: &Snapshot<'_>) {
        self(snapshot)
    }
}

pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&mut self, _: &Snapshot<'_>) {}
}

/// Logs centroids and cluster sizes at debug level.
pub struct LogObserver;

impl Observer for LogObserver {
    fn observe(&mut self, snapshot: &Snapshot<'_>) {
        let title = match snapshot.phase {
            Phase::Assign => "Re-cluster points",
            Phase::Update => "Re-calculate centroids",
        };
        debug!(
            "{}: {} centroids={:?} sizes={:?}",
            title,
            snapshot.iteration,
            snapshot
                .centroids
                .iter()
                .map(|c| c.map(|v| (v * 10.).round() / 10.))
                .collect::<Vec<_>>(),
            snapshot.cluster_sizes()
        );
    }
}

#[derive(Serialize)]
struct TraceRecord<'a> {
    iteration: usize,
    phase: Phase,
    centroids: &'a [Centroid],
    sizes: Vec<usize>,
}

/// Writes one JSON object per snapshot, newline separated.
///
/// Write failures can't be allowed to stop the clustering, so the first one is
/// kept and handed back from [`JsonLinesObserver::finish`].
pub struct JsonLinesObserver<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> JsonLinesObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_record(&mut self, snapshot: &Snapshot<'_>) -> io::Result<()> {
        let record = TraceRecord {
            iteration: snapshot.iteration,
            phase: snapshot.phase,
            centroids: snapshot.centroids,
            sizes: snapshot.cluster_sizes(),
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write> Observer for JsonLinesObserver<W> {
    fn observe(&mut self, snapshot: &Snapshot<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_record(snapshot) {
            self.error = Some(e);
        }
    }
}
