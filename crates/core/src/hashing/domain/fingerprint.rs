use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash_vector::{HashAlgorithm, HashVector};

/// Geometric perturbation applied to a crop before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageVariant {
    Identity,
    Mirrored,
    /// Rotated 5 degrees clockwise.
    RotatedCw,
    /// Rotated 5 degrees counter-clockwise.
    RotatedCcw,
}

impl ImageVariant {
    pub const ALL: [ImageVariant; 4] = [
        ImageVariant::Identity,
        ImageVariant::Mirrored,
        ImageVariant::RotatedCw,
        ImageVariant::RotatedCcw,
    ];
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{algorithm} vector has {actual} bits, expected {expected}")]
pub struct VectorLengthError {
    pub algorithm: HashAlgorithm,
    pub expected: usize,
    pub actual: usize,
}

/// Combined distance between a query and a reference, with its upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintDistance {
    pub combined: u32,
    pub max: u32,
}

impl FingerprintDistance {
    /// `combined / max` in [0, 1]; 0 for an empty bound.
    pub fn normalized(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            self.combined as f64 / self.max as f64
        }
    }
}

/// Hash vectors of one face crop keyed by (algorithm, variant).
///
/// A query set carries every variant; a reference set only the identity
/// variant. Every vector holds exactly `hash_size²` bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintSet {
    hash_size: u32,
    vectors: BTreeMap<(HashAlgorithm, ImageVariant), HashVector>,
}

impl FingerprintSet {
    pub fn new(hash_size: u32) -> Self {
        Self {
            hash_size,
            vectors: BTreeMap::new(),
        }
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    pub fn bits_per_vector(&self) -> usize {
        self.hash_size as usize * self.hash_size as usize
    }

    pub fn insert(
        &mut self,
        variant: ImageVariant,
        vector: HashVector,
    ) -> Result<(), VectorLengthError> {
        if vector.len() != self.bits_per_vector() {
            return Err(VectorLengthError {
                algorithm: vector.algorithm(),
                expected: self.bits_per_vector(),
                actual: vector.len(),
            });
        }
        self.vectors.insert((vector.algorithm(), variant), vector);
        Ok(())
    }

    pub fn get(&self, algorithm: HashAlgorithm, variant: ImageVariant) -> Option<&HashVector> {
        self.vectors.get(&(algorithm, variant))
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithm, ImageVariant, &HashVector)> {
        self.vectors.iter().map(|(&(a, v), h)| (a, v, h))
    }

    /// The identity-variant subset, i.e. what gets stored for a registered person.
    pub fn reference(&self) -> FingerprintSet {
        FingerprintSet {
            hash_size: self.hash_size,
            vectors: self
                .vectors
                .iter()
                .filter(|((_, variant), _)| *variant == ImageVariant::Identity)
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
        }
    }

    /// Distance from this query to `reference`.
    ///
    /// For each identity-variant vector of `reference`, takes the minimum
    /// Hamming distance over every query vector of the same algorithm, then
    /// sums those minima across algorithms. `None` when the sets share no
    /// comparable algorithm or a reference algorithm is missing from the query.
    pub fn distance_to(&self, reference: &FingerprintSet) -> Option<FingerprintDistance> {
        if self.hash_size != reference.hash_size {
            return None;
        }
        let mut combined = 0u32;
        let mut max = 0u32;
        let mut compared = false;
        for ((algorithm, variant), stored) in &reference.vectors {
            if *variant != ImageVariant::Identity {
                continue;
            }
            let best = self
                .vectors
                .iter()
                .filter(|((a, _), _)| a == algorithm)
                .filter_map(|(_, query)| query.hamming_distance(stored))
                .min()?;
            combined += best;
            max += stored.len() as u32;
            compared = true;
        }
        compared.then_some(FingerprintDistance { combined, max })
    }
}
