//! Lloyd's k-means with k-means++ seeding and silhouette scoring.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::FEATURE_COUNT;

pub(crate) type Point = [f64; FEATURE_COUNT];

/// One clustering run.
#[derive(Debug, Clone)]
pub(crate) struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Point>,
    pub inertia: f64,
}

pub(crate) fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &Point, centroids: &[Point]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

/// k-means++: each next seed is drawn with probability proportional to its
/// squared distance from the nearest seed already chosen.
fn seed_centroids(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);
    while centroids.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = weights.iter().sum();
        let idx = if total <= 0.0 {
            rng.gen_range(0..points.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        };
        centroids.push(points[idx]);
    }
    centroids
}

fn recompute_centroids(points: &[Point], labels: &[usize], k: usize) -> (Vec<Point>, Vec<usize>) {
    let mut sums = vec![[0.0; FEATURE_COUNT]; k];
    let mut counts = vec![0usize; k];
    for (p, &l) in points.iter().zip(labels) {
        counts[l] += 1;
        for j in 0..FEATURE_COUNT {
            sums[l][j] += p[j];
        }
    }
    for (sum, &count) in sums.iter_mut().zip(&counts) {
        if count > 0 {
            for v in sum.iter_mut() {
                *v /= count as f64;
            }
        }
    }
    (sums, counts)
}

/// Move the worst-fitting point of a multi-member cluster into each empty
/// cluster. Requires `points.len() >= k`.
fn repair_empty_clusters(points: &[Point], labels: &mut [usize], centroids: &mut [Point]) {
    let k = centroids.len();
    loop {
        let counts = labels.iter().fold(vec![0usize; k], |mut acc, &l| {
            acc[l] += 1;
            acc
        });
        let Some(empty) = counts.iter().position(|&c| c == 0) else {
            return;
        };
        let donor = points
            .iter()
            .enumerate()
            .filter(|(i, _)| counts[labels[*i]] > 1)
            .map(|(i, p)| (i, squared_distance(p, &centroids[labels[i]])))
            .fold(None::<(usize, f64)>, |best, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });
        let Some((i, _)) = donor else {
            return;
        };
        labels[i] = empty;
        centroids[empty] = points[i];
    }
}

fn run_once(
    points: &[Point],
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut StdRng,
) -> KMeansFit {
    let mut centroids = seed_centroids(points, k, rng);
    let mut labels = vec![0usize; points.len()];

    for _ in 0..max_iterations {
        for (label, p) in labels.iter_mut().zip(points) {
            *label = nearest(p, &centroids).0;
        }
        repair_empty_clusters(points, &mut labels, &mut centroids);

        let (next, _) = recompute_centroids(points, &labels, k);
        let shift = centroids
            .iter()
            .zip(&next)
            .map(|(a, b)| squared_distance(a, b))
            .fold(0.0, f64::max);
        centroids = next;
        if shift <= tolerance * tolerance {
            break;
        }
    }

    for (label, p) in labels.iter_mut().zip(points) {
        *label = nearest(p, &centroids).0;
    }
    repair_empty_clusters(points, &mut labels, &mut centroids);
    let (centroids, _) = recompute_centroids(points, &labels, k);
    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| squared_distance(p, &centroids[l]))
        .sum();

    KMeansFit {
        labels,
        centroids,
        inertia,
    }
}

/// Best of `restarts` seeded runs by lowest inertia; earlier runs win ties.
pub(crate) fn fit(
    points: &[Point],
    k: usize,
    restarts: usize,
    max_iterations: usize,
    tolerance: f64,
    seed: u64,
) -> KMeansFit {
    let mut best: Option<KMeansFit> = None;
    for restart in 0..restarts.max(1) {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(restart as u64));
        let candidate = run_once(points, k, max_iterations, tolerance, &mut rng);
        tracing::trace!(restart, inertia = candidate.inertia, "k-means restart finished");
        if best
            .as_ref()
            .map_or(true, |b| candidate.inertia < b.inertia)
        {
            best = Some(candidate);
        }
    }
    best.unwrap_or_else(|| KMeansFit {
        labels: vec![0; points.len()],
        centroids: vec![[0.0; FEATURE_COUNT]; k],
        inertia: 0.0,
    })
}

/// Mean silhouette coefficient over all points, in [-1, 1].
///
/// Singleton clusters contribute 0, as does a fit with fewer than two
/// clusters.
pub(crate) fn silhouette(points: &[Point], labels: &[usize], k: usize) -> f64 {
    if points.len() < 2 || k < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (j, q) in points.iter().enumerate() {
            if i != j {
                sums[labels[j]] += squared_distance(p, q).sqrt();
                counts[labels[j]] += 1;
            }
        }
        let own = labels[i];
        if counts[own] == 0 {
            continue;
        }
        let a = sums[own] / counts[own] as f64;
        let b = (0..k)
            .filter(|&c| c != own && counts[c] > 0)
            .map(|c| sums[c] / counts[c] as f64)
            .fold(f64::INFINITY, f64::min);
        if !b.is_finite() {
            continue;
        }
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    total / points.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(center: f64, n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let mut p = [center; FEATURE_COUNT];
                p[0] += i as f64 * 0.01;
                p
            })
            .collect()
    }

    fn three_blobs() -> Vec<Point> {
        let mut points = blob(0.0, 5);
        points.extend(blob(10.0, 5));
        points.extend(blob(-10.0, 5));
        points
    }

    #[test]
    fn test_separates_well_spaced_blobs() {
        let points = three_blobs();
        let fit = fit(&points, 3, 5, 100, 1e-9, 7);
        for chunk in fit.labels.chunks(5) {
            assert!(chunk.iter().all(|&l| l == chunk[0]));
        }
        assert_ne!(fit.labels[0], fit.labels[5]);
        assert_ne!(fit.labels[5], fit.labels[10]);
        assert!(fit.inertia < 1.0);
    }

    #[test]
    fn test_same_seed_same_result() {
        let points = three_blobs();
        let a = fit(&points, 3, 4, 100, 1e-9, 99);
        let b = fit(&points, 3, 4, 100, 1e-9, 99);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_identical_points_still_fill_every_cluster() {
        let points = vec![[1.0; FEATURE_COUNT]; 4];
        let fit = fit(&points, 3, 2, 10, 1e-9, 1);
        for c in 0..3 {
            assert!(fit.labels.contains(&c));
        }
    }

    #[test]
    fn test_silhouette_high_for_separated_blobs() {
        let points = three_blobs();
        let fit = fit(&points, 3, 5, 100, 1e-9, 7);
        assert!(silhouette(&points, &fit.labels, 3) > 0.9);
    }
}
