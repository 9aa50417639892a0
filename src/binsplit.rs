//! A binary splitting vector quantizer with Lloyd refinement.
//!
//! The quantizer starts with a single cluster at the mean of all points and repeatedly splits
//! the cluster with the greatest distortion. Instead of computing the principal axis of a cluster,
//! the new centroid is placed at the distortion-weighted mean of the cluster's members,
//! which displaces it along the direction of greatest error.
//! After every round of splits, a fixed number of Lloyd (k-means) passes reassigns each point
//! to its nearest centroid, and any cluster left empty is refilled by splitting another cluster.
//!
//! The algorithm is fully deterministic: ties in distance favor the lower cluster index.
//! It does no allocation of its own; all state lives in caller supplied buffers.

use crate::Rgbaf;
use tracing::debug;

/// A cluster of points and the running statistics used to train it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cluster {
    /// The center of the cluster.
    centroid: Rgbaf,
    /// The number of points trained into the cluster.
    count: u32,
    /// The component-wise sum of the trained points.
    sum: Rgbaf,
    /// The sum of each trained point multiplied by its squared deviation from `centroid`.
    weighted_sum: Rgbaf,
    /// The component-wise sum of squared deviations from `centroid`.
    deviation: Rgbaf,
    /// The next cluster in whichever list (distortion ordered or empty) this cluster is on.
    link: Option<usize>,
}

impl Cluster {
    /// The center of the cluster.
    #[must_use]
    pub const fn centroid(&self) -> Rgbaf {
        self.centroid
    }

    /// The number of points assigned to the cluster.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// The sum of squared deviations of the members, per channel.
    #[must_use]
    pub const fn deviation(&self) -> Rgbaf {
        self.deviation
    }

    /// Resets the training statistics, keeping the centroid.
    fn clear_training(&mut self) {
        self.count = 0;
        self.sum = Rgbaf::ZERO;
        self.weighted_sum = Rgbaf::ZERO;
        self.deviation = Rgbaf::ZERO;
    }

    /// Adds a point to the training statistics.
    #[inline]
    fn train(&mut self, point: Rgbaf) {
        let dist = point - self.centroid;
        let dist = dist * dist;
        self.count += 1;
        self.sum += point;
        self.weighted_sum += point * dist;
        self.deviation += dist;
    }

    /// Moves the centroid to the mean of the trained points, if there are any.
    ///
    /// Returns the number of trained points.
    fn resolve(&mut self) -> u32 {
        if self.count > 0 {
            #[allow(clippy::cast_precision_loss)]
            {
                self.centroid = self.sum / self.count as f32;
            }
        }
        self.count
    }

    /// The rank used to pick the next cluster to split.
    fn split_rank(&self) -> f32 {
        self.deviation.len2()
    }
}

/// Inserts cluster `index` into the distortion list starting at `head`, returning the new head.
///
/// The list is sorted by decreasing [`Cluster::split_rank`].
/// A cluster that ranks equal to an existing one is placed before it.
/// Clusters with zero distortion cannot be split and are left out of the list.
fn insert_by_rank(clusters: &mut [Cluster], index: usize, head: Option<usize>) -> Option<usize> {
    let rank = clusters[index].split_rank();
    if rank == 0.0 {
        return head;
    }

    let mut prev = None;
    let mut next = head;
    while let Some(i) = next {
        if rank < clusters[i].split_rank() {
            prev = Some(i);
            next = clusters[i].link;
        } else {
            break;
        }
    }

    clusters[index].link = next;
    if let Some(prev) = prev {
        clusters[prev].link = Some(index);
        head
    } else {
        Some(index)
    }
}

/// Splits the current members of cluster `src` between `src` and `dst`.
///
/// The new centroid for `dst` is the deviation-weighted mean of `src`'s members,
/// falling back to `src`'s centroid for channels without any deviation.
/// Each member of `src` then moves to whichever of the two centroids is nearer
/// (staying in `src` only if strictly nearer), and both clusters are retrained and resolved.
#[allow(clippy::cast_possible_truncation)]
fn split(
    clusters: &mut [Cluster],
    src: usize,
    dst: usize,
    data: &[Rgbaf],
    assignments: &mut [u32],
) {
    let parent = clusters[src];
    clusters[dst].centroid = parent
        .weighted_sum
        .div_safe(parent.deviation, parent.centroid);

    clusters[src].clear_training();
    clusters[dst].clear_training();

    let src_centroid = clusters[src].centroid;
    let dst_centroid = clusters[dst].centroid;
    for (&point, assignment) in data.iter().zip(assignments.iter_mut()) {
        if *assignment as usize == src {
            if point.distance(src_centroid) < point.distance(dst_centroid) {
                clusters[src].train(point);
            } else {
                clusters[dst].train(point);
                *assignment = dst as u32;
            }
        }
    }

    clusters[src].resolve();
    clusters[dst].resolve();
}

/// Returns the index of the nearest of the given centroids, preferring lower indices on ties.
#[inline]
fn nearest(clusters: &[Cluster], point: Rgbaf) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, cluster) in clusters.iter().enumerate() {
        let dist = point.distance(cluster.centroid);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// The state of a single quantizer run over caller supplied buffers.
struct Quantizer<'a> {
    /// The cluster storage.
    clusters: &'a mut [Cluster],
    /// The input points.
    data: &'a [Rgbaf],
    /// The cluster index of each point.
    assignments: &'a mut [u32],
    /// The number of clusters in use.
    active: usize,
    /// The head of the distortion ordered list of splittable clusters.
    head: Option<usize>,
    /// The head of the list of empty clusters.
    empty: Option<usize>,
}

impl Quantizer<'_> {
    /// Places every point in cluster `0` at the mean of the data.
    ///
    /// Returns `false` if all points are identical and there is nothing left to split.
    #[allow(clippy::cast_precision_loss)]
    fn seed(&mut self) -> bool {
        let mut mean = Rgbaf::ZERO;
        for &point in self.data {
            mean += point;
        }
        let mean = mean / self.data.len() as f32;

        self.assignments.fill(0);
        let first = &mut self.clusters[0];
        first.centroid = mean;
        first.clear_training();
        for &point in self.data {
            first.train(point);
        }
        first.link = None;
        self.active = 1;

        if first.split_rank() == 0.0 {
            false
        } else {
            self.head = Some(0);
            true
        }
    }

    /// Splits `src` into `dst` and puts both back into the distortion list.
    fn split_into(&mut self, src: usize, dst: usize) {
        split(self.clusters, src, dst, self.data, self.assignments);
        self.head = insert_by_rank(self.clusters, src, self.head);
        self.head = insert_by_rank(self.clusters, dst, self.head);
    }

    /// Runs one round of splits, splitting at most as many clusters as are currently active.
    ///
    /// After each split the list head is skipped over,
    /// so a single round spreads its splits across the distortion list instead of
    /// repeatedly splitting the two halves of the previous split.
    fn grow(&mut self, target: usize) {
        for _ in 0..self.active {
            let Some(src) = self.head else { break };

            let dst = if let Some(dst) = self.empty {
                self.empty = self.clusters[dst].link;
                dst
            } else {
                self.active += 1;
                self.active - 1
            };

            self.head = self.clusters[src].link;
            self.split_into(src, dst);
            self.head = self.head.and_then(|head| self.clusters[head].link);

            if self.head.is_none() || self.active >= target {
                break;
            }
        }
    }

    /// Runs one Lloyd pass over all points, then refills any emptied clusters.
    #[allow(clippy::cast_possible_truncation)]
    fn refine(&mut self) {
        let active = &mut self.clusters[..self.active];
        for cluster in active.iter_mut() {
            cluster.clear_training();
        }

        for (&point, assignment) in self.data.iter().zip(self.assignments.iter_mut()) {
            let best = nearest(active, point);
            *assignment = best as u32;
            active[best].train(point);
        }

        self.head = None;
        self.empty = None;
        for i in 0..self.active {
            if self.clusters[i].resolve() > 0 {
                self.head = insert_by_rank(self.clusters, i, self.head);
            } else {
                self.clusters[i].link = self.empty;
                self.empty = Some(i);
            }
        }

        while let (Some(src), Some(dst)) = (self.head, self.empty) {
            self.head = self.clusters[src].link;
            self.empty = self.clusters[dst].link;
            self.split_into(src, dst);
        }
    }
}

/// Builds a codebook of at most `target` clusters for the given points.
///
/// `clusters` must have room for at least `target` clusters,
/// and `assignments` must have the same length as `data`.
/// On return, `assignments[i]` holds the index of the cluster that owns `data[i]`
/// and the first `n` clusters are in use, where `n` is the returned value.
/// Clusters in use may have no members; their centroid is left as it was.
///
/// `passes` is the exact number of refinement passes run after each round of splits.
///
/// If `data` is empty, nothing is modified and `0` is returned.
/// If all points are identical, a single cluster holding every point is produced.
///
/// # Panics
/// Panics if `clusters.len() < target` or `data.len() != assignments.len()`.
pub fn quantize(
    clusters: &mut [Cluster],
    target: usize,
    data: &[Rgbaf],
    assignments: &mut [u32],
    passes: u32,
) -> usize {
    assert!(target <= clusters.len(), "not enough room for {target} clusters");
    assert_eq!(data.len(), assignments.len(), "one assignment per point is needed");

    if data.is_empty() || target == 0 {
        return 0;
    }

    let mut quantizer = Quantizer {
        clusters,
        data,
        assignments,
        active: 0,
        head: None,
        empty: None,
    };

    if quantizer.seed() {
        while quantizer.head.is_some() && quantizer.active < target {
            quantizer.grow(target);
            for _ in 0..passes {
                quantizer.refine();
            }
        }
    }

    debug!(
        points = data.len(),
        target,
        active = quantizer.active,
        "built codebook"
    );

    quantizer.active
}

/// The clusters produced by a single [`quantize`] call with freshly allocated buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Codebook {
    /// Storage for `target` clusters, unused ones zeroed.
    clusters: Vec<Cluster>,
    /// The number of clusters in use.
    active: usize,
}

impl Codebook {
    /// Builds a codebook of at most `target` clusters for `data`.
    ///
    /// Returns the codebook and the cluster index of each point.
    /// See [`quantize`] for details.
    #[must_use]
    pub fn build(data: &[Rgbaf], target: usize, passes: u32) -> (Self, Vec<u32>) {
        let mut clusters = vec![Cluster::default(); target];
        let mut assignments = vec![0; data.len()];
        let active = quantize(&mut clusters, target, data, &mut assignments, passes);
        (Self { clusters, active }, assignments)
    }

    /// All `target` clusters, including unused ones.
    #[must_use]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// The number of clusters in use.
    #[must_use]
    pub const fn active(&self) -> usize {
        self.active
    }

    /// The centroid of each of the `target` clusters. Unused clusters are zero.
    pub fn centroids(&self) -> impl Iterator<Item = Rgbaf> + '_ {
        self.clusters.iter().map(Cluster::centroid)
    }

    /// The member count of each of the `target` clusters.
    pub fn counts(&self) -> impl Iterator<Item = u32> + '_ {
        self.clusters.iter().map(Cluster::count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use std::collections::BTreeSet;

    /// The sum of squared distances from each point to its assigned centroid.
    fn total_distortion(clusters: &[Cluster], data: &[Rgbaf], assignments: &[u32]) -> f64 {
        data.iter()
            .zip(assignments)
            .map(|(&p, &a)| f64::from(p.distance(clusters[a as usize].centroid)))
            .sum()
    }

    fn assert_point_conservation(clusters: &[Cluster], active: usize, assignments: &[u32]) {
        let mut counts = vec![0u32; clusters.len()];
        for &a in assignments {
            assert!((a as usize) < active);
            counts[a as usize] += 1;
        }
        for (cluster, &count) in clusters[..active].iter().zip(&counts) {
            assert_eq!(cluster.count(), count);
        }
        #[allow(clippy::cast_possible_truncation)]
        let total = assignments.len() as u32;
        assert_eq!(counts.iter().sum::<u32>(), total);
    }

    #[test]
    fn empty_input() {
        let mut clusters = vec![Cluster::default(); 4];
        let active = quantize(&mut clusters, 4, &[], &mut [], 8);
        assert_eq!(active, 0);
        assert!(clusters.iter().all(|c| *c == Cluster::default()));
    }

    #[test]
    fn identical_points_make_one_cluster() {
        let data = vec![Rgbaf::new(10.0, -3.0, 2.0, 255.0); 100];
        let mut clusters = vec![Cluster::default(); 8];
        let mut assignments = vec![7; data.len()];
        let active = quantize(&mut clusters, 8, &data, &mut assignments, 32);

        assert_eq!(active, 1);
        assert_eq!(clusters[0].count(), 100);
        assert!(assignments.iter().all(|&a| a == 0));
        assert!(clusters[1..].iter().all(|c| *c == Cluster::default()));
    }

    #[test]
    fn deterministic() {
        let data = test_points_ycocg(2048);
        let a = Codebook::build(&data, 16, 8);
        let b = Codebook::build(&data, 16, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn point_conservation() {
        let data = test_points_ycocg(1500);
        for target in [1, 2, 3, 7, 16, 64] {
            let mut clusters = vec![Cluster::default(); target];
            let mut assignments = vec![0; data.len()];
            let active = quantize(&mut clusters, target, &data, &mut assignments, 4);
            assert!(active <= target);
            assert_point_conservation(&clusters, active, &assignments);

            let used = assignments.iter().copied().collect::<BTreeSet<_>>();
            assert!(used.len() <= target);
        }
    }

    #[test]
    fn reaches_target_with_enough_colors() {
        let data = test_points_ycocg(1024);
        let (codebook, assignments) = Codebook::build(&data, 16, 32);
        let used = assignments.iter().copied().collect::<BTreeSet<_>>();
        assert_eq!(used.len(), 16);
        assert_eq!(codebook.active(), 16);
        assert!(codebook.counts().all(|n| n > 0));
    }

    #[test]
    fn separates_unbalanced_colors() {
        let black = Rgbaf::new(0.0, 0.0, 0.0, 255.0);
        let white = Rgbaf::new(255.0, 0.0, 0.0, 255.0);
        let mut data = vec![black; 64];
        data.extend(std::iter::repeat(white).take(192));

        let (codebook, assignments) = Codebook::build(&data, 2, 32);
        let clusters = codebook.clusters();
        assert_eq!(clusters[0].centroid(), white);
        assert_eq!(clusters[0].count(), 192);
        assert_eq!(clusters[1].centroid(), black);
        assert_eq!(clusters[1].count(), 64);
        assert!(assignments[..64].iter().all(|&a| a == 1));
        assert!(assignments[64..].iter().all(|&a| a == 0));
    }

    #[test]
    fn fewer_colors_than_target() {
        let colors = [
            (Rgbaf::new(0.0, 0.0, 0.0, 255.0), 50),
            (Rgbaf::new(100.0, 0.0, 0.0, 255.0), 100),
            (Rgbaf::new(200.0, 0.0, 0.0, 255.0), 250),
        ];
        let data = colors
            .iter()
            .flat_map(|&(color, n)| std::iter::repeat(color).take(n))
            .collect::<Vec<_>>();

        let (codebook, assignments) = Codebook::build(&data, 8, 32);
        assert_eq!(codebook.active(), 3);
        assert!(codebook.centroids().skip(3).all(|c| c == Rgbaf::ZERO));
        let distortion = total_distortion(codebook.clusters(), &data, &assignments);
        assert!(distortion < 1e-3, "distortion {distortion}");

        let used = assignments.iter().copied().collect::<BTreeSet<_>>();
        assert_eq!(used.len(), colors.len());
    }

    #[test]
    fn refinement_does_not_increase_distortion() {
        let data = test_points_ycocg(2000);
        let target = 12;
        let mut clusters = vec![Cluster::default(); target];
        let mut assignments = vec![0; data.len()];
        let active = quantize(&mut clusters, target, &data, &mut assignments, 0);

        let mut quantizer = Quantizer {
            clusters: &mut clusters,
            data: &data,
            assignments: &mut assignments,
            active,
            head: None,
            empty: None,
        };

        let mut prev = f64::INFINITY;
        for _ in 0..10 {
            quantizer.refine();
            let distortion =
                total_distortion(quantizer.clusters, quantizer.data, quantizer.assignments);
            assert!(distortion <= prev * (1.0 + 1e-5), "{distortion} > {prev}");
            prev = distortion;
        }
    }

    #[test]
    fn distortion_list_is_sorted_and_skips_inert_clusters() {
        let mut clusters = vec![Cluster::default(); 5];
        for (i, dev) in [4.0, 0.0, 9.0, 4.0, 1.0].into_iter().enumerate() {
            clusters[i].deviation = Rgbaf::new(dev, 0.0, 0.0, 0.0);
        }

        let mut head = None;
        for i in 0..clusters.len() {
            head = insert_by_rank(&mut clusters, i, head);
        }

        let mut order = Vec::new();
        let mut next = head;
        while let Some(i) = next {
            order.push(i);
            next = clusters[i].link;
        }

        // equal ranks: the later insertion comes first
        assert_eq!(order, vec![2, 3, 0, 4]);
    }

    #[test]
    fn split_moves_members_toward_weighted_mean() {
        let data = vec![
            Rgbaf::new(0.0, 0.0, 0.0, 0.0),
            Rgbaf::new(0.0, 0.0, 0.0, 0.0),
            Rgbaf::new(0.0, 0.0, 0.0, 0.0),
            Rgbaf::new(8.0, 0.0, 0.0, 0.0),
        ];
        let mut clusters = vec![Cluster::default(); 2];
        let mut assignments = vec![0; data.len()];
        clusters[0].centroid = Rgbaf::new(2.0, 0.0, 0.0, 0.0);
        for &p in &data {
            clusters[0].train(p);
        }

        split(&mut clusters, 0, 1, &data, &mut assignments);

        assert_eq!(assignments, vec![0, 0, 0, 1]);
        assert_eq!(clusters[0].centroid(), Rgbaf::ZERO);
        assert_eq!(clusters[1].centroid(), Rgbaf::new(8.0, 0.0, 0.0, 0.0));
    }
}
