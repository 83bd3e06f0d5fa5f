//! K-means training of IVF partition centroids.

use log::{debug, info};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::error::Result;
use crate::vector::core::distance::DistanceMetric;
use crate::vector::index::config::IvfParams;
use crate::vector::store::VectorStore;

/// Training rows above which assignment runs on the rayon pool.
const PARALLEL_ASSIGN_THRESHOLD: usize = 1000;

/// Nearest centroid of `vector`, ties going to the lower partition index.
pub(crate) fn nearest_centroid(
    centroids: &VectorStore,
    metric: DistanceMetric,
    vector: &[f32],
) -> (usize, f32) {
    let mut best_partition = 0;
    let mut best_distance = f32::INFINITY;

    for (i, centroid) in centroids.iter() {
        let distance = metric.distance_unchecked(vector, centroid);
        if distance < best_distance {
            best_distance = distance;
            best_partition = i as usize;
        }
    }

    (best_partition, best_distance)
}

/// Lloyd-style k-means with k-means++ seeding over a deterministic sample.
pub(crate) struct CentroidTrainer<'a> {
    store: &'a VectorStore,
    metric: DistanceMetric,
    params: &'a IvfParams,
    rng: StdRng,
}

impl<'a> CentroidTrainer<'a> {
    pub(crate) fn new(store: &'a VectorStore, metric: DistanceMetric, params: &'a IvfParams) -> Self {
        Self {
            store,
            metric,
            params,
            rng: StdRng::seed_from_u64(params.seed),
        }
    }

    /// Train `min(n_partitions, N)` centroids.
    ///
    /// Stops after `max_iterations` passes or once the mean centroid movement
    /// drops below `convergence_threshold`. A partition left empty by an
    /// assignment pass is re-seeded with the training row farthest from its
    /// own centroid, so every partition keeps at least one training row.
    pub(crate) fn train(mut self) -> Result<VectorStore> {
        let dimension = self.store.dimension();
        let n = self.store.size();
        let n_partitions = self.params.n_partitions.min(n);
        if n_partitions == 0 {
            return Ok(VectorStore::new(dimension));
        }

        let rows = self.sample_rows(n, n_partitions);
        info!(
            "Training {} partitions on {} of {} vectors",
            n_partitions,
            rows.len(),
            n
        );

        let mut centroids = self.init_centroids_kmeans_plus_plus(&rows, n_partitions)?;

        for iteration in 0..self.params.max_iterations {
            let (mut assignments, mut distances) = self.assign(&rows, &centroids);
            let reseeded =
                self.reseed_empty_partitions(&rows, &mut assignments, &mut distances, n_partitions);
            if reseeded > 0 {
                debug!("Re-seeded {reseeded} empty partitions in iteration {iteration}");
            }

            let updated = self.update_centroids(&rows, &assignments, n_partitions)?;
            let movement = self.mean_movement(&centroids, &updated);
            centroids = updated;

            debug!("k-means iteration {iteration}: mean centroid movement {movement}");
            if movement < self.params.convergence_threshold {
                info!("k-means converged after {} iterations", iteration + 1);
                break;
            }
        }

        Ok(centroids)
    }

    /// Sorted training rows: all of them, or a seeded sample of the configured size.
    fn sample_rows(&mut self, n: usize, n_partitions: usize) -> Vec<usize> {
        let wanted = self.params.training_points().max(n_partitions);
        if wanted >= n {
            return (0..n).collect();
        }

        let mut rows = rand::seq::index::sample(&mut self.rng, n, wanted).into_vec();
        rows.sort_unstable();
        rows
    }

    fn init_centroids_kmeans_plus_plus(
        &mut self,
        rows: &[usize],
        n_partitions: usize,
    ) -> Result<VectorStore> {
        let mut centroids = VectorStore::with_capacity(self.store.dimension(), n_partitions);

        let first = rows[self.rng.random_range(0..rows.len())];
        centroids.add(self.store.row(first))?;

        // Squared-distance weights to the closest chosen centroid so far.
        let mut min_distances: Vec<f32> = rows
            .iter()
            .map(|&row| {
                self.metric
                    .distance_unchecked(self.store.row(row), self.store.row(first))
            })
            .collect();

        for _ in 1..n_partitions {
            let total_weight: f64 = min_distances.iter().map(|&d| d as f64).sum();

            let chosen = if total_weight <= 0.0 {
                rows[self.rng.random_range(0..rows.len())]
            } else {
                let target = self.rng.random::<f64>() * total_weight;
                let mut cumsum = 0.0;
                // Rounding can leave `cumsum` short of `target`; fall back to the farthest row.
                let farthest = min_distances
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                let mut chosen = rows[farthest];
                for (i, &weight) in min_distances.iter().enumerate() {
                    cumsum += weight as f64;
                    if cumsum >= target && weight > 0.0 {
                        chosen = rows[i];
                        break;
                    }
                }
                chosen
            };

            let centroid = self.store.row(chosen);
            centroids.add(centroid)?;
            for (slot, &row) in min_distances.iter_mut().zip(rows) {
                let d = self.metric.distance_unchecked(self.store.row(row), centroid);
                if d < *slot {
                    *slot = d;
                }
            }
        }

        Ok(centroids)
    }

    fn assign(&self, rows: &[usize], centroids: &VectorStore) -> (Vec<usize>, Vec<f32>) {
        let nearest = |&row: &usize| nearest_centroid(centroids, self.metric, self.store.row(row));
        let pairs: Vec<(usize, f32)> = if rows.len() > PARALLEL_ASSIGN_THRESHOLD {
            rows.par_iter().map(nearest).collect()
        } else {
            rows.iter().map(nearest).collect()
        };
        pairs.into_iter().unzip()
    }

    /// Move rows into empty partitions. Returns the number of partitions re-seeded.
    pub(super) fn reseed_empty_partitions(
        &self,
        rows: &[usize],
        assignments: &mut [usize],
        distances: &mut [f32],
        n_partitions: usize,
    ) -> usize {
        let mut counts = vec![0usize; n_partitions];
        for &partition in assignments.iter() {
            counts[partition] += 1;
        }

        let mut reseeded = 0;
        for empty in 0..n_partitions {
            if counts[empty] > 0 {
                continue;
            }

            // Farthest row from its own centroid, among partitions that can spare one.
            let mut donor: Option<usize> = None;
            for i in 0..rows.len() {
                if counts[assignments[i]] < 2 {
                    continue;
                }
                match donor {
                    Some(best) if distances[i] <= distances[best] => {}
                    _ => donor = Some(i),
                }
            }

            let Some(i) = donor else {
                break;
            };
            counts[assignments[i]] -= 1;
            counts[empty] += 1;
            assignments[i] = empty;
            distances[i] = 0.0;
            reseeded += 1;
        }

        reseeded
    }

    fn update_centroids(
        &self,
        rows: &[usize],
        assignments: &[usize],
        n_partitions: usize,
    ) -> Result<VectorStore> {
        let dimension = self.store.dimension();
        let mut sums = vec![0.0f64; n_partitions * dimension];
        let mut counts = vec![0usize; n_partitions];

        for (&row, &partition) in rows.iter().zip(assignments) {
            counts[partition] += 1;
            let sum = &mut sums[partition * dimension..(partition + 1) * dimension];
            for (acc, &value) in sum.iter_mut().zip(self.store.row(row)) {
                *acc += value as f64;
            }
        }

        let mut centroids = VectorStore::with_capacity(dimension, n_partitions);
        let mut mean = vec![0.0f32; dimension];
        for (partition, &count) in counts.iter().enumerate() {
            let sum = &sums[partition * dimension..(partition + 1) * dimension];
            // Re-seeding leaves every partition with at least one row.
            let count = count.max(1) as f64;
            for (m, &s) in mean.iter_mut().zip(sum) {
                *m = (s / count) as f32;
            }
            centroids.add(&mean)?;
        }

        Ok(centroids)
    }

    fn mean_movement(&self, old: &VectorStore, new: &VectorStore) -> f32 {
        let total: f32 = old
            .iter()
            .zip(new.iter())
            .map(|((_, a), (_, b))| self.metric.distance_unchecked(a, b))
            .sum();
        total / old.size().max(1) as f32
    }
}
