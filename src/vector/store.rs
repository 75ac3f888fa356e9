//! Append-only store of embedding records.
//!
//! Owns the normalized vectors and their metadata, and assigns stable
//! monotonic ids. The store never reuses an id, even across reloads:
//! the next-id counter persists with the vectors.

use crate::error::{IndexError, IndexResult};
use crate::vector::types::{VectorDimension, VectorId, VectorRecord};

/// Epsilon below which a vector magnitude is treated as zero.
const NORM_EPSILON: f32 = 1e-10;

/// Holds every indexed record in id order plus the id counter.
///
/// Vectors are L2-normalized on the way in; a zero-magnitude vector, or
/// one carrying NaN or infinite components, is rejected with
/// [`IndexError::DegenerateVector`] because it has no direction to
/// compare against.
#[derive(Debug, Clone)]
pub struct VectorRecordStore {
    records: Vec<VectorRecord>,
    dimension: Option<VectorDimension>,
    next_id: u32,
}

impl VectorRecordStore {
    /// Creates an empty store with no fixed dimensionality.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            dimension: None,
            next_id: 1,
        }
    }

    /// Reassembles a store from persisted parts.
    ///
    /// Used by the load path after the on-disk layout has been validated;
    /// the records must already be normalized and in ascending id order.
    pub(crate) fn from_parts(
        records: Vec<VectorRecord>,
        dimension: Option<VectorDimension>,
        next_id: u32,
    ) -> Self {
        Self {
            records,
            dimension,
            next_id,
        }
    }

    /// Appends a batch of vectors, assigning ids in input order.
    ///
    /// All-or-nothing: every vector is validated and normalized before
    /// any of them is committed, so a bad vector in the middle of a
    /// batch leaves the store untouched.
    ///
    /// The first successful append fixes the store's dimensionality.
    /// Fails with `EmptyInput` if the batch is empty and no
    /// dimensionality is fixed yet.
    pub fn append(&mut self, pairs: &[(String, Vec<f32>)]) -> IndexResult<Vec<VectorId>> {
        if pairs.is_empty() {
            return match self.dimension {
                Some(_) => Ok(Vec::new()),
                None => Err(IndexError::EmptyInput),
            };
        }

        let dimension = match self.dimension {
            Some(dim) => dim,
            None => VectorDimension::new(pairs[0].1.len())?,
        };

        // Validate and normalize everything before committing anything.
        let mut normalized = Vec::with_capacity(pairs.len());
        for (source_path, vector) in pairs {
            dimension.validate_vector(vector)?;
            normalized.push(normalize(vector).ok_or_else(|| IndexError::DegenerateVector {
                source_path: source_path.clone(),
            })?);
        }

        self.dimension = Some(dimension);

        let mut assigned = Vec::with_capacity(pairs.len());
        for ((source_path, _), vector) in pairs.iter().zip(normalized) {
            let id = VectorId::new_unchecked(self.next_id);
            self.next_id += 1;
            self.records.push(VectorRecord {
                id,
                source_path: source_path.clone(),
                vector,
            });
            assigned.push(id);
        }

        Ok(assigned)
    }

    /// Looks up a record by id.
    ///
    /// Records are stored in ascending id order, so this is a binary search.
    #[must_use]
    pub fn get(&self, id: VectorId) -> Option<&VectorRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// All records in ascending id order.
    #[must_use]
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The fixed dimensionality, if any vectors have been stored.
    #[must_use]
    pub fn dimension(&self) -> Option<VectorDimension> {
        self.dimension
    }

    /// The id the next appended vector will receive.
    #[must_use]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }
}

impl Default for VectorRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns an L2-normalized copy, or `None` for a vector with no usable
/// direction: zero magnitude, or any NaN/infinite component.
pub(crate) fn normalize(vector: &[f32]) -> Option<Vec<f32>> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    // A NaN or infinite component makes the norm NaN or infinite, so
    // both comparisons must hold.
    if !norm.is_finite() || norm < NORM_EPSILON {
        return None;
    }
    Some(vector.iter().map(|x| x / norm).collect())
}
