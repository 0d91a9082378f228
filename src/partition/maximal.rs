//! Maximal partitioning
//!
//! Applies the per-position grouping hierarchically: group by the first
//! position of an ordering over the whole table, then group by the second
//! position *within* each group already formed, and so on. The partition
//! count depends on the ordering, so all 4! = 24 orderings are evaluated
//! (in parallel on the worker pool) and the one producing the most
//! partitions wins.

use rayon::prelude::*;
use tracing::debug;

use super::grouping::{group_position, Facet};
use crate::model::{MappingRule, Position};
use crate::pool::WorkerPool;

/// Compute a partition key per rule using the maximal algorithm.
pub(crate) fn maximal_keys(rules: &[&MappingRule], pool: &WorkerPool) -> Vec<String> {
    if rules.is_empty() {
        return Vec::new();
    }

    // Facets are ordering-independent; compute them once up front.
    let facets: Vec<Vec<Facet>> = Position::ALL
        .iter()
        .map(|&position| rules.iter().map(|r| Facet::of(r, position)).collect())
        .collect();

    let orderings = permutations(Position::ALL);

    let evaluated: Vec<(usize, Vec<String>)> = pool.install(|| {
        orderings
            .par_iter()
            .map(|ordering| {
                let keys = hierarchical_keys(&facets, ordering, rules.len());
                let count = distinct_count(&keys);
                (count, keys)
            })
            .collect()
    });

    // Deterministic winner: most partitions, earliest ordering on ties.
    let (best_idx, (best_count, _)) = evaluated
        .iter()
        .enumerate()
        .max_by(|(ia, (ca, _)), (ib, (cb, _))| ca.cmp(cb).then(ib.cmp(ia)))
        .expect("at least one ordering");
    debug!(
        partitions = best_count,
        ordering = ?orderings[best_idx],
        "maximal partitioning selected ordering"
    );

    evaluated.into_iter().nth(best_idx).map(|(_, k)| k).unwrap_or_default()
}

/// Apply grouping hierarchically along one position ordering.
fn hierarchical_keys(
    facets: &[Vec<Facet>],
    ordering: &[Position; 4],
    len: usize,
) -> Vec<String> {
    let mut keys = vec![String::new(); len];
    let mut clusters: Vec<Vec<usize>> = vec![(0..len).collect()];

    for &position in ordering {
        let position_facets = &facets[position_index(position)];
        let mut next_clusters: Vec<Vec<usize>> = Vec::new();

        for cluster in &clusters {
            let cluster_facets: Vec<Facet> = cluster
                .iter()
                .map(|&i| position_facets[i].clone())
                .collect();
            let labels = group_position(&cluster_facets);

            let mut by_label: Vec<(&str, Vec<usize>)> = Vec::new();
            for (j, &i) in cluster.iter().enumerate() {
                if keys[i].is_empty() {
                    keys[i] = labels[j].clone();
                } else {
                    keys[i] = format!("{}-{}", keys[i], labels[j]);
                }
                match by_label.iter_mut().find(|(l, _)| *l == labels[j]) {
                    Some((_, members)) => members.push(i),
                    None => by_label.push((&labels[j], vec![i])),
                }
            }
            next_clusters.extend(by_label.into_iter().map(|(_, members)| members));
        }
        clusters = next_clusters;
    }

    keys
}

fn position_index(position: Position) -> usize {
    match position {
        Position::Subject => 0,
        Position::Predicate => 1,
        Position::Object => 2,
        Position::Graph => 3,
    }
}

fn distinct_count(keys: &[String]) -> usize {
    let mut seen: Vec<&str> = Vec::new();
    for key in keys {
        if !seen.contains(&key.as_str()) {
            seen.push(key);
        }
    }
    seen.len()
}

/// All orderings of the four quad positions (Heap's algorithm).
fn permutations(items: [Position; 4]) -> Vec<[Position; 4]> {
    let mut out = Vec::with_capacity(24);
    let mut work = items;
    heap_permute(&mut work, 4, &mut out);
    out
}

fn heap_permute(items: &mut [Position; 4], k: usize, out: &mut Vec<[Position; 4]>) {
    if k == 1 {
        out.push(*items);
        return;
    }
    for i in 0..k {
        heap_permute(items, k - 1, out);
        if k % 2 == 0 {
            items.swap(i, k - 1);
        } else {
            items.swap(0, k - 1);
        }
    }
}
