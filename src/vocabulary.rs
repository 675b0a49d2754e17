//! Generic context vocabulary: the platform-independent fingerprint system.
//!
//! Patent Claims 1 and 8: composite context key as the fundamental unit
//! of situational awareness.
//!
//! A vocabulary is a fixed number of *closed integer dimensions*. Everything
//! else (the stable hash, the normalised feature vector, cosine similarity)
//! is derived from those integers, so two vocabularies with equal dimensions
//! are interchangeable.
//!
//! # Implementing a vocabulary
//!
//! ```rust,ignore
//! use ccf_text::vocabulary::SensorVocabulary;
//!
//! #[derive(Clone, Debug, PartialEq, Eq, Hash)]
//! pub struct ThreeSensorBot {
//!     pub light: u8,   // 0=dark, 1=dim, 2=bright
//!     pub sound: u8,   // 0=quiet, 1=loud
//!     pub motion: u8,  // 0=still, 1=moving
//! }
//!
//! impl SensorVocabulary<3> for ThreeSensorBot {
//!     const MAXIMA: [u32; 3] = [2, 1, 1];
//!     fn dimensions(&self) -> [u32; 3] {
//!         [self.light as u32, self.sound as u32, self.motion as u32]
//!     }
//! }
//! ```
//!
//! # Hash contract
//!
//! [`SensorVocabulary::context_hash_u32`] is 32-bit FNV-1a over the
//! little-endian 4-byte encoding of each dimension, in declaration order.
//! Persisted trust is keyed by this value, so it must never change.

use core::hash::Hash;

/// FNV-1a 32-bit offset basis.
pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
/// FNV-1a 32-bit prime.
pub const FNV_PRIME: u32 = 16_777_619;

/// Norms below this are treated as zero by [`SensorVocabulary::cosine_similarity`].
const NORM_EPSILON: f32 = 1e-9;

/// FNV-1a over the little-endian bytes of each value, in order.
pub fn fnv1a_u32(values: &[u32]) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for v in values {
        for byte in v.to_le_bytes() {
            h ^= byte as u32;
            h = h.wrapping_mul(FNV_PRIME);
        }
    }
    h
}

/// Platform-independent context vocabulary trait.
///
/// Implementors define the discrete space the agent operates in as `N`
/// bounded integer dimensions. CCF is generic over this trait; the same
/// trust accumulation logic works for any vocabulary that can report its
/// dimensions and their inclusive maxima.
///
/// Patent Claims 1 and 8.
pub trait SensorVocabulary<const N: usize>: Eq + Hash + Clone + core::fmt::Debug {
    /// Dimensionality of the feature vector encoding (equal to the const generic `N`).
    const FEATURE_DIM: usize = N;

    /// Inclusive maximum of each dimension. Every entry must be non-zero.
    const MAXIMA: [u32; N];

    /// The raw integer dimensions, in declaration order.
    fn dimensions(&self) -> [u32; N];

    /// Normalised feature vector: each dimension divided by its maximum.
    ///
    /// Every element is in [0.0, 1.0] for in-range dimensions.
    fn to_feature_vec(&self) -> [f32; N] {
        let dims = self.dimensions();
        let mut out = [0.0f32; N];
        for i in 0..N {
            out[i] = dims[i] as f32 / Self::MAXIMA[i] as f32;
        }
        out
    }

    /// Deterministic FNV-1a hash of the integer dimensions.
    ///
    /// Identical dimensions produce the same hash across restarts, machines
    /// and implementations.
    fn context_hash_u32(&self) -> u32 {
        fnv1a_u32(&self.dimensions())
    }

    /// Cosine similarity between the two feature vectors.
    ///
    /// Returns a value in [0.0, 1.0]; exactly 0.0 when either vector is
    /// (numerically) zero.
    fn cosine_similarity(&self, other: &Self) -> f32 {
        let a = self.to_feature_vec();
        let b = other.to_feature_vec();

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a < NORM_EPSILON || norm_b < NORM_EPSILON {
            0.0
        } else {
            (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
        }
    }
}

/// The `k` entries of `known` most similar to `candidate`, best first.
///
/// Ties keep input order. `k` larger than `known.len()` is clamped; an empty
/// `known` yields an empty result. Used to seed an unseen context from its
/// nearest familiar neighbours.
pub fn nearest_k<'a, V, const N: usize>(
    candidate: &V,
    known: &'a [V],
    k: usize,
) -> Vec<(&'a V, f32)>
where
    V: SensorVocabulary<N>,
{
    let mut scored: Vec<(&'a V, f32)> = known
        .iter()
        .map(|v| (v, candidate.cosine_similarity(v)))
        .collect();
    // Stable sort keeps input order among equal similarities.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    // Simple two-dimensional test vocabulary used throughout the unit tests.
    // For the production five-dimensional vocabulary see `ccf_text::fingerprint`.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    struct TwoSensor { light: u8, noise: u8 } // 0=low, 1=mid, 2=high

    impl SensorVocabulary<2> for TwoSensor {
        const MAXIMA: [u32; 2] = [2, 2];
        fn dimensions(&self) -> [u32; 2] {
            [self.light as u32, self.noise as u32]
        }
    }

    fn bright_quiet() -> TwoSensor {
        TwoSensor { light: 2, noise: 0 }
    }

    fn dark_loud() -> TwoSensor {
        TwoSensor { light: 0, noise: 2 }
    }

    #[test]
    fn test_claim_1_context_key_is_deterministic() {
        assert_eq!(bright_quiet().context_hash_u32(), bright_quiet().context_hash_u32());
    }

    #[test]
    fn test_claim_1_different_contexts_have_different_hashes() {
        assert_ne!(bright_quiet().context_hash_u32(), dark_loud().context_hash_u32());
    }

    #[test]
    fn test_fnv1a_empty_is_offset_basis() {
        assert_eq!(fnv1a_u32(&[]), FNV_OFFSET_BASIS);
    }

    #[test]
    fn test_fnv1a_reference_vectors() {
        // Pinned values; any change here breaks every persisted state file.
        assert_eq!(fnv1a_u32(&[0, 0, 0, 0, 0]), 3_120_489_557);
        assert_eq!(fnv1a_u32(&[5, 1, 0, 1, 1]), 1_705_053_169);
        assert_eq!(fnv1a_u32(&[63, 2, 3, 3, 2]), 1_043_647_210);
    }

    #[test]
    fn test_claim_8_feature_vec_normalised() {
        let vec = bright_quiet().to_feature_vec();
        assert_eq!(vec.len(), TwoSensor::FEATURE_DIM);
        assert!((vec[0] - 1.0).abs() < 1e-6);
        assert!(vec[1].abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_identical_contexts() {
        let k = bright_quiet();
        assert!((k.cosine_similarity(&k) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_orthogonal_contexts() {
        let sim = bright_quiet().cosine_similarity(&dark_loud());
        assert!(sim.abs() < 1e-6, "sim={}", sim);
    }

    #[test]
    fn test_cosine_similarity_zero_vector_is_zero() {
        let zero = TwoSensor { light: 0, noise: 0 };
        assert_eq!(zero.cosine_similarity(&bright_quiet()), 0.0);
        assert_eq!(bright_quiet().cosine_similarity(&zero), 0.0);
        assert_eq!(zero.cosine_similarity(&zero), 0.0);
    }

    #[test]
    fn test_nearest_k_sorted_and_clamped() {
        let known = [
            dark_loud(),
            TwoSensor { light: 2, noise: 1 },
            bright_quiet(),
        ];
        let got = nearest_k::<_, 2>(&bright_quiet(), &known, 10);
        assert_eq!(got.len(), 3);
        assert_eq!(*got[0].0, bright_quiet());
        assert_eq!(*got[1].0, TwoSensor { light: 2, noise: 1 });
        assert_eq!(*got[2].0, dark_loud());
        assert!(got[0].1 >= got[1].1 && got[1].1 >= got[2].1);
    }

    #[test]
    fn test_nearest_k_ties_keep_input_order() {
        let diagonal = TwoSensor { light: 1, noise: 1 };
        let quiet = TwoSensor { light: 2, noise: 0 };
        let loud = TwoSensor { light: 0, noise: 2 };
        let known = [loud.clone(), quiet.clone()];
        let got = nearest_k::<_, 2>(&diagonal, &known, 2);
        assert_eq!(got[0].1, got[1].1);
        assert_eq!(*got[0].0, loud);
        assert_eq!(*got[1].0, quiet);
    }

    #[test]
    fn test_nearest_k_empty_and_zero() {
        let none: [TwoSensor; 0] = [];
        assert!(nearest_k::<_, 2>(&bright_quiet(), &none, 3).is_empty());
        assert!(nearest_k::<_, 2>(&bright_quiet(), &[dark_loud()], 0).is_empty());
    }
}
