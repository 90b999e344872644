//! Feature-based entity clustering and bridge detection.
//!
//! Entities are partitioned into at most five groups by k-means over a
//! fixed 7-dimensional feature vector. The seed is fixed, so labels are
//! stable for a given repository state.

use dossier_core::{Entity, EntityId, Repository};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

const MAX_CLUSTERS: usize = 5;
const MAX_ITERATIONS: usize = 100;
const SEED: u64 = 42;

/// Cluster label per entity id.
pub type ClusterLabels = HashMap<EntityId, usize>;

/// The fixed feature vector: counts of phones, emails, addresses,
/// relations, jobs, distinct social platforms and bank accounts.
pub fn feature_vector(entity: &Entity) -> [f64; 7] {
    [
        entity.phones.len() as f64,
        entity.emails.len() as f64,
        entity.addresses.len() as f64,
        entity.relations.len() as f64,
        entity.jobs.len() as f64,
        entity.social_media.len() as f64,
        entity.bank_accounts.len() as f64,
    ]
}

fn distance_sq(a: &[f64; 7], b: &[f64; 7]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Partitions all entities into `min(5, N)` groups.
///
/// Plain Lloyd iterations with seeded initial centroids; ties go to the
/// lowest cluster index, so the result is deterministic.
pub fn cluster(repo: &Repository) -> ClusterLabels {
    let ids = repo.sorted_ids();
    let n = ids.len();
    if n == 0 {
        return ClusterLabels::new();
    }

    let points: Vec<[f64; 7]> = ids
        .iter()
        .filter_map(|id| repo.get(*id).map(feature_vector))
        .collect();
    let k = MAX_CLUSTERS.min(n);

    let mut rng = StdRng::seed_from_u64(SEED);
    let mut centroids: Vec<[f64; 7]> = rand::seq::index::sample(&mut rng, n, k)
        .into_iter()
        .map(|i| points[i])
        .collect();

    let mut assignment = vec![0usize; n];
    for iteration in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (c, centroid) in centroids.iter().enumerate() {
                let dist = distance_sq(point, centroid);
                if dist < best_dist {
                    best = c;
                    best_dist = dist;
                }
            }
            if assignment[i] != best {
                assignment[i] = best;
                changed = true;
            }
        }
        if !changed && iteration > 0 {
            break;
        }

        // recompute centroids; an emptied cluster keeps its old one
        for c in 0..k {
            let members: Vec<&[f64; 7]> = points
                .iter()
                .enumerate()
                .filter(|(i, _)| assignment[*i] == c)
                .map(|(_, p)| p)
                .collect();
            if members.is_empty() {
                continue;
            }
            let mut mean = [0.0; 7];
            for point in &members {
                for d in 0..7 {
                    mean[d] += point[d];
                }
            }
            for value in &mut mean {
                *value /= members.len() as f64;
            }
            centroids[c] = mean;
        }
    }

    debug!(entities = n, clusters = k, "clustered repository");
    ids.into_iter().zip(assignment).collect()
}

/// Entities whose relations span at least two cluster labels other than
/// their own: the people connecting otherwise separate groups.
pub fn find_bridges(repo: &Repository, labels: &ClusterLabels) -> Vec<EntityId> {
    let mut bridges = Vec::new();
    for id in repo.sorted_ids() {
        let entity = match repo.get(id) {
            Some(e) => e,
            None => continue,
        };
        let own = match labels.get(&id) {
            Some(&l) => l,
            None => continue,
        };
        let mut connected: BTreeSet<usize> = BTreeSet::new();
        for rel in &entity.relations {
            if let dossier_core::RelationTarget::Resolved(target) = rel.target {
                if let Some(&label) = labels.get(&target) {
                    if label != own {
                        connected.insert(label);
                    }
                }
            }
        }
        if connected.len() > 1 {
            bridges.push(id);
        }
    }
    bridges
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::{Actor, Details, RelationTarget, KIND_LINK};

    #[test]
    fn test_every_entity_gets_a_label() {
        let mut repo = Repository::new();
        for i in 0..8 {
            let id = repo.get_or_create(&format!("Иванов Иван{}", i), None);
            let e = repo.get_mut(id).unwrap();
            for p in 0..i {
                e.phones.insert(format!("7999000{}{}", i, p));
            }
        }
        let labels = cluster(&repo);
        assert_eq!(labels.len(), 8);
        assert!(labels.values().all(|&l| l < 5));
    }

    #[test]
    fn test_labels_are_deterministic() {
        let mut repo = Repository::new();
        for i in 0..6 {
            repo.get_or_create(&format!("Петров Петр{}", i), None);
        }
        assert_eq!(cluster(&repo), cluster(&repo));
    }

    #[test]
    fn test_small_repository_uses_fewer_clusters() {
        let mut repo = Repository::new();
        repo.get_or_create("Иванов Иван", None);
        repo.get_or_create("Петров Петр", None);
        let labels = cluster(&repo);
        assert_eq!(labels.len(), 2);
        assert!(labels.values().all(|&l| l < 2));
    }

    #[test]
    fn test_empty_repository_clusters_to_nothing() {
        let repo = Repository::new();
        assert!(cluster(&repo).is_empty());
    }

    #[test]
    fn test_bridge_spans_two_foreign_labels() {
        let mut repo = Repository::new();
        let hub = repo.get_or_create("Иванов Иван", None);
        let left = repo.get_or_create("Петров Петр", None);
        let right = repo.get_or_create("Сидоров Олег", None);
        for other in [left, right] {
            repo.add_relation(
                hub,
                KIND_LINK,
                RelationTarget::Resolved(other),
                Details::new(),
                Actor::System,
            )
            .unwrap();
        }

        // synthetic labels: hub alone in 0, neighbors in 1 and 2
        let mut labels = ClusterLabels::new();
        labels.insert(hub, 0);
        labels.insert(left, 1);
        labels.insert(right, 2);

        assert_eq!(find_bridges(&repo, &labels), vec![hub]);
    }
}
