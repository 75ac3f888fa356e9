//! Whole-corpus similarity clustering.
//!
//! Partitions every indexed record into duplicate groups, similar
//! groups, and unique leftovers using two thresholds and a
//! connectivity rule. Relationships come from per-record top-k queries
//! against a point-in-time snapshot of the index, bounding memory to
//! O(n * k) neighbor entries instead of an n x n similarity matrix.

mod union_find;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;

use crate::cluster::union_find::UnionFind;
use crate::error::{ClusterError, ClusterResult};
use crate::vector::{Score, SimilarityIndex, VectorId, VectorRecord, inner_product};
use crate::vector::top_k_neighbors;

/// Default cap on neighbors fetched per record during a pass.
pub const DEFAULT_NEIGHBOR_CAP: usize = 512;

/// The two similarity thresholds driving a clustering pass.
///
/// `duplicate` must be at least as strict as `similar`. Equal thresholds
/// are legal and make every resulting group duplicate-kind.
#[derive(Debug, Clone, Copy)]
pub struct ClusterThresholds {
    duplicate: f32,
    similar: f32,
}

impl ClusterThresholds {
    /// Validates and creates a threshold pair.
    pub fn new(duplicate: f32, similar: f32) -> ClusterResult<Self> {
        // NaN on either side also fails this comparison.
        if !(duplicate >= similar) {
            return Err(ClusterError::InvalidThresholds { duplicate, similar });
        }
        Ok(Self { duplicate, similar })
    }

    #[must_use]
    pub fn duplicate(&self) -> f32 {
        self.duplicate
    }

    #[must_use]
    pub fn similar(&self) -> f32 {
        self.similar
    }
}

/// Whether every member pair of a group is near-identical, or merely
/// transitively similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Duplicate,
    Similar,
}

/// A non-representative group member with its similarity to the
/// group's representative.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub record: VectorRecord,
    pub similarity: Score,
}

/// One group out of a clustering pass.
///
/// A record belongs to at most one group per pass; the representative
/// is not repeated in `members`.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityGroup {
    pub group_id: usize,
    pub kind: GroupKind,
    pub representative: VectorRecord,
    /// Ordered by descending similarity to the representative, ties by
    /// ascending id.
    pub members: Vec<GroupMember>,
}

/// The full outcome of a clustering pass over an index snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub groups: Vec<SimilarityGroup>,
    /// Records in no group, in ascending id order.
    pub unique: Vec<VectorRecord>,
}

/// Groups an entire corpus by visual similarity.
///
/// Read-only against the index for the whole pass; it never mutates
/// the records it analyzes.
#[derive(Debug)]
pub struct ClusteringEngine {
    thresholds: ClusterThresholds,
    neighbor_cap: usize,
}

impl ClusteringEngine {
    /// Creates an engine with the default neighbor cap.
    #[must_use]
    pub fn new(thresholds: ClusterThresholds) -> Self {
        Self {
            thresholds,
            neighbor_cap: DEFAULT_NEIGHBOR_CAP,
        }
    }

    /// Caps how many neighbors each record fetches in step 1.
    ///
    /// The cap bounds memory on large corpora; a cap below the corpus
    /// size can miss edges past the k-th neighbor.
    #[must_use]
    pub fn with_neighbor_cap(mut self, cap: usize) -> Self {
        self.neighbor_cap = cap.max(1);
        self
    }

    /// Runs a full clustering pass.
    pub fn analyze(&self, index: &SimilarityIndex) -> ClusterResult<ClusterReport> {
        self.analyze_with_cancel(index, &AtomicBool::new(false))
    }

    /// Runs a full clustering pass, checking `cancel` between
    /// per-record neighbor queries.
    ///
    /// A cancelled pass aborts cleanly with [`ClusterError::Cancelled`]
    /// and leaves the index untouched.
    pub fn analyze_with_cancel(
        &self,
        index: &SimilarityIndex,
        cancel: &AtomicBool,
    ) -> ClusterResult<ClusterReport> {
        let snapshot = index.snapshot();
        let n = snapshot.len();

        if n <= 1 {
            return Ok(ClusterReport {
                groups: Vec::new(),
                unique: snapshot,
            });
        }

        let edges = self.collect_edges(&snapshot, cancel)?;
        Ok(self.partition(&snapshot, &edges))
    }

    /// Step 1-2: per-record neighbor queries, kept only at or above the
    /// similar threshold. Record order in the output matches snapshot
    /// order, so the pass is deterministic regardless of thread count.
    fn collect_edges(
        &self,
        snapshot: &[VectorRecord],
        cancel: &AtomicBool,
    ) -> ClusterResult<Vec<Vec<(VectorId, Score)>>> {
        let k = self.neighbor_cap.min(snapshot.len() - 1);
        let processed = AtomicUsize::new(0);

        let neighbor_lists: Vec<Vec<(VectorId, Score)>> = snapshot
            .par_iter()
            .map(|record| {
                if cancel.load(Ordering::Relaxed) {
                    return Vec::new();
                }
                let neighbors = top_k_neighbors(snapshot, &record.vector, k, Some(record.id));
                processed.fetch_add(1, Ordering::Relaxed);
                neighbors
                    .into_iter()
                    .filter(|(_, score)| score.get() >= self.thresholds.similar)
                    .collect()
            })
            .collect();

        if cancel.load(Ordering::Relaxed) {
            return Err(ClusterError::Cancelled {
                records_processed: processed.load(Ordering::Relaxed),
            });
        }

        Ok(neighbor_lists)
    }

    /// Steps 3-6: connected components, group classification,
    /// representative selection, member scoring.
    fn partition(
        &self,
        snapshot: &[VectorRecord],
        edges: &[Vec<(VectorId, Score)>],
    ) -> ClusterReport {
        let position: HashMap<VectorId, usize> = snapshot
            .iter()
            .enumerate()
            .map(|(pos, record)| (record.id, pos))
            .collect();

        let mut uf = UnionFind::new(snapshot.len());
        for (pos, neighbors) in edges.iter().enumerate() {
            for (neighbor_id, score) in neighbors {
                let neighbor_pos = position[neighbor_id];
                uf.union(pos, neighbor_pos, score.get() >= self.thresholds.duplicate);
            }
        }

        // Components keyed by root, members kept in ascending id order.
        let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
        for pos in 0..snapshot.len() {
            components.entry(uf.find(pos)).or_default().push(pos);
        }

        // Deterministic group order: by the smallest member id.
        let mut component_list: Vec<Vec<usize>> = components.into_values().collect();
        component_list.sort_by_key(|members| snapshot[members[0]].id);

        let mut groups = Vec::new();
        let mut unique = Vec::new();

        for members in component_list {
            if members.len() == 1 {
                unique.push(snapshot[members[0]].clone());
                continue;
            }

            let kind = if uf.is_all_duplicate(members[0]) {
                GroupKind::Duplicate
            } else {
                GroupKind::Similar
            };

            let rep_pos = select_representative(snapshot, &members);
            let representative = snapshot[rep_pos].clone();

            let mut group_members: Vec<GroupMember> = members
                .iter()
                .filter(|&&pos| pos != rep_pos)
                .map(|&pos| GroupMember {
                    similarity: Score::clamped(inner_product(
                        &snapshot[pos].vector,
                        &representative.vector,
                    )),
                    record: snapshot[pos].clone(),
                })
                .collect();
            group_members.sort_by(|a, b| {
                b.similarity
                    .cmp(&a.similarity)
                    .then(a.record.id.cmp(&b.record.id))
            });

            groups.push(SimilarityGroup {
                group_id: groups.len(),
                kind,
                representative,
                members: group_members,
            });
        }

        ClusterReport { groups, unique }
    }
}

/// Picks the densest member of a component: the one with the highest
/// sum of similarity to all other members, ties broken by lowest id.
///
/// Components are usually small, so the m^2 inner products here stay
/// cheap even when the corpus is large.
fn select_representative(snapshot: &[VectorRecord], members: &[usize]) -> usize {
    let mut best_pos = members[0];
    let mut best_sum = f32::NEG_INFINITY;

    // Ascending id order plus a strict comparison breaks ties low.
    for &pos in members {
        let sum: f32 = members
            .iter()
            .filter(|&&other| other != pos)
            .map(|&other| inner_product(&snapshot[pos].vector, &snapshot[other].vector))
            .sum();
        if sum > best_sum {
            best_sum = sum;
            best_pos = pos;
        }
    }

    best_pos
}
