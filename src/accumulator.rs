/*
 * Notice of Provisional Patent Filing:
 * The methods and algorithms implemented in this file (specifically relating to
 * Contextual Coherence Fields and relational coherence accumulation) are the
 * subject of a United States Provisional Patent Application (63/988,438)
 * filed on February 23, 2026.
 *
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE and PATENTS.md in the root directory for full details.
 */

//! Per-context coherence accumulators and the full coherence field.
//!
//! # Patent Claims 2–7, 13
//!
//! - [`CoherenceAccumulator`]: per-context trust with an earned floor and asymmetric decay (Claims 2–5).
//! - [`CoherenceField`]: hash-keyed accumulator population with the asymmetric min-gate (Claims 6–7, 13).
//!
//! # Invariants
//!
//! - **Asymmetric gate**: `effective_coherence` is
//!   - unfamiliar contexts (coherence < 0.3): `min(instant, coherence)`, both signals must agree;
//!   - familiar contexts (coherence ≥ 0.3): `0.3 × instant + 0.7 × coherence`, history buffers noise.
//! - **Earned floor**: `0 ≤ earned_floor ≤ coherence ≤ 1` after every operation, and
//!   `earned_floor` never decreases.
//! - **Personality modulates deltas, not structure.**
//! - Zero unsafe code; no I/O on this path.

use hashbrown::HashMap;

use crate::phase::{Personality, SocialPhase};

/// Gain per positive interaction at `curiosity = 1.0`.
pub const GAIN_SCALE: f32 = 0.12;
/// Fraction of each gain that is banked into the earned floor.
pub const FLOOR_RATE: f32 = 0.3;
/// Drop per negative interaction at `recovery = 0.0`.
pub const DECAY_SCALE: f32 = 0.15;
/// Coherence at which a context counts as familiar.
pub const FAMILIARITY_THRESHOLD: f32 = 0.3;

const INSTANT_WEIGHT: f32 = 0.3;
const HISTORY_WEIGHT: f32 = 0.7;

// ─── Coherence Accumulator ──────────────────────────────────────────────────

/// Per-context coherence accumulator.
///
/// Grows through repeated positive interaction and drops on negative events,
/// but never below the floor that earlier positive interactions have banked.
/// Trust is slow to build and resistant to single-event collapse.
///
/// This is a leaf type: inputs are assumed to be in [0.0, 1.0] already.
/// [`CoherenceField`] is the validating boundary.
///
/// Patent Claims 2–5.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoherenceAccumulator {
    /// Learned trust for this context [0.0, 1.0].
    pub coherence: f32,
    /// Protective lower bound [0.0, coherence].
    pub earned_floor: f32,
    /// Every recorded event, positive or negative.
    pub interaction_count: u32,
}

impl CoherenceAccumulator {
    /// Fresh accumulator: everything at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a positive interaction.
    ///
    /// ```text
    /// gain         = curiosity × 0.12
    /// coherence    = min(1, coherence + gain)
    /// earned_floor = min(coherence, earned_floor + 0.3 × gain)
    /// ```
    pub fn positive_interaction(&mut self, curiosity: f32) {
        let gain = curiosity * GAIN_SCALE;
        self.coherence = (self.coherence + gain).min(1.0);
        self.earned_floor = (self.earned_floor + gain * FLOOR_RATE).min(self.coherence);
        self.interaction_count = self.interaction_count.saturating_add(1);
    }

    /// Record a negative interaction.
    ///
    /// `decay = 0.15 × (1 − recovery)`; coherence drops by `decay` but is
    /// floored at `earned_floor`. The floor itself is untouched.
    pub fn negative_interaction(&mut self, recovery: f32) {
        let decay = DECAY_SCALE * (1.0 - recovery);
        self.coherence = (self.coherence - decay).max(self.earned_floor);
        self.interaction_count = self.interaction_count.saturating_add(1);
    }

    /// Blend learned coherence with an instantaneous signal. Pure read.
    pub fn effective_coherence(&self, instant: f32) -> f32 {
        gate(self.coherence, instant)
    }
}

fn gate(coherence: f32, instant: f32) -> f32 {
    if coherence < FAMILIARITY_THRESHOLD {
        instant.min(coherence)
    } else {
        (INSTANT_WEIGHT * instant + HISTORY_WEIGHT * coherence).clamp(0.0, 1.0)
    }
}

fn unit(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ─── Coherence Field ────────────────────────────────────────────────────────

/// One tracked context: its accumulator and the phase it was last seen in.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextEntry {
    /// Trust state for the context.
    pub accumulator: CoherenceAccumulator,
    /// Phase classified on the most recent turn in this context.
    pub last_phase: SocialPhase,
}

impl Default for ContextEntry {
    fn default() -> Self {
        Self { accumulator: CoherenceAccumulator::new(), last_phase: SocialPhase::ShyObserver }
    }
}

/// The coherence field: fingerprint hash → [`ContextEntry`], plus the
/// personality that modulates every update.
///
/// Entries spring into existence on the first *recorded event* for a hash;
/// reads of an unseen hash never insert. The field is owned by exactly one
/// session; callers needing shared access serialise externally.
///
/// Patent Claims 6–7, 13.
pub struct CoherenceField {
    entries: HashMap<u32, ContextEntry>,
    personality: Personality,
}

impl CoherenceField {
    /// Empty field with the given personality.
    pub fn new(personality: Personality) -> Self {
        Self { entries: HashMap::new(), personality }
    }

    /// The active personality.
    pub fn personality(&self) -> &Personality {
        &self.personality
    }

    /// Replace the personality wholesale (e.g. after loading a snapshot).
    pub fn set_personality(&mut self, personality: Personality) {
        self.personality = personality;
    }

    // ── Asymmetric min-gate ────────────────────────────────────────────────

    /// Effective coherence for `hash` given an instantaneous signal.
    ///
    /// `instant` is clamped to [0.0, 1.0]. An unseen context has coherence 0,
    /// so its effective coherence is 0 whatever the instant signal says.
    pub fn effective_coherence(&self, hash: u32, instant: f32) -> f32 {
        gate(self.raw_coherence(hash), unit(instant))
    }

    // ── Interaction API ────────────────────────────────────────────────────

    /// Record a positive interaction, scaled by `curiosity_drive`.
    pub fn positive_interaction(&mut self, hash: u32) {
        let curiosity = unit(self.personality.curiosity_drive);
        self.get_or_create(hash).accumulator.positive_interaction(curiosity);
    }

    /// Record a negative interaction, softened by `recovery_rate`.
    pub fn negative_interaction(&mut self, hash: u32) {
        let recovery = unit(self.personality.recovery_rate);
        self.get_or_create(hash).accumulator.negative_interaction(recovery);
    }

    /// Remember the phase most recently classified for `hash`.
    pub fn set_last_phase(&mut self, hash: u32, phase: SocialPhase) {
        self.get_or_create(hash).last_phase = phase;
    }

    // ── Read accessors ─────────────────────────────────────────────────────

    /// Learned coherence for `hash` (0.0 if unseen).
    pub fn raw_coherence(&self, hash: u32) -> f32 {
        self.entries.get(&hash).map_or(0.0, |e| e.accumulator.coherence)
    }

    /// Earned floor for `hash` (0.0 if unseen).
    pub fn earned_floor(&self, hash: u32) -> f32 {
        self.entries.get(&hash).map_or(0.0, |e| e.accumulator.earned_floor)
    }

    /// Recorded events for `hash` (0 if unseen).
    pub fn interaction_count(&self, hash: u32) -> u32 {
        self.entries.get(&hash).map_or(0, |e| e.accumulator.interaction_count)
    }

    /// Last classified phase for `hash` (`ShyObserver` if unseen).
    pub fn last_phase(&self, hash: u32) -> SocialPhase {
        self.entries.get(&hash).map_or(SocialPhase::ShyObserver, |e| e.last_phase)
    }

    /// The entry for `hash`, if one exists.
    pub fn get(&self, hash: u32) -> Option<&ContextEntry> {
        self.entries.get(&hash)
    }

    // ── Collection helpers ─────────────────────────────────────────────────

    /// Number of tracked contexts.
    pub fn context_count(&self) -> usize {
        self.entries.len()
    }

    /// True when no context has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all (hash, entry) pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ContextEntry)> {
        self.entries.iter().map(|(h, e)| (*h, e))
    }

    /// Insert a previously persisted entry, replacing any existing one.
    ///
    /// Values are forced back into the accumulator invariants: coherence
    /// into [0, 1], earned floor into [0, coherence]. Non-finite values
    /// become 0.
    pub fn restore(&mut self, hash: u32, accumulator: CoherenceAccumulator, last_phase: SocialPhase) {
        let coherence = unit(accumulator.coherence);
        let earned_floor = unit(accumulator.earned_floor).min(coherence);
        self.entries.insert(
            hash,
            ContextEntry {
                accumulator: CoherenceAccumulator {
                    coherence,
                    earned_floor,
                    interaction_count: accumulator.interaction_count,
                },
                last_phase,
            },
        );
    }

    // ── Internal helpers ───────────────────────────────────────────────────

    /// Get or create the entry for `hash`, starting from zero.
    pub fn get_or_create(&mut self, hash: u32) -> &mut ContextEntry {
        self.entries.entry(hash).or_default()
    }
}

impl Default for CoherenceField {
    fn default() -> Self {
        Self::new(Personality::default())
    }
}

impl core::fmt::Debug for CoherenceField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CoherenceField")
            .field("context_count", &self.entries.len())
            .field("personality", &self.personality)
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const A: u32 = 1_705_053_169;
    const B: u32 = 3_700_239_428;

    fn personality(curiosity: f32, recovery: f32) -> Personality {
        Personality { curiosity_drive: curiosity, recovery_rate: recovery }
    }

    // ── CoherenceAccumulator tests ────────────────────────────────────────

    #[test]
    fn test_concrete_positive_then_negative() {
        let mut acc = CoherenceAccumulator::new();
        acc.positive_interaction(0.5);
        assert!((acc.coherence - 0.06).abs() < 1e-6, "coherence={}", acc.coherence);
        assert!((acc.earned_floor - 0.018).abs() < 1e-6, "floor={}", acc.earned_floor);
        assert_eq!(acc.interaction_count, 1);

        acc.negative_interaction(0.5);
        assert!((acc.coherence - 0.018).abs() < 1e-6, "coherence={}", acc.coherence);
        assert!((acc.earned_floor - 0.018).abs() < 1e-6);
        assert_eq!(acc.interaction_count, 2);
    }

    #[test]
    fn test_coherence_caps_at_one() {
        let mut acc = CoherenceAccumulator::new();
        for _ in 0..50 {
            acc.positive_interaction(1.0);
        }
        assert_eq!(acc.coherence, 1.0);
        assert!(acc.earned_floor <= acc.coherence);
    }

    #[test]
    fn test_floor_never_overtakes_coherence_with_tiny_gains() {
        let mut acc = CoherenceAccumulator::new();
        for _ in 0..1000 {
            acc.positive_interaction(0.001);
            assert!(acc.earned_floor <= acc.coherence, "{:?}", acc);
        }
    }

    #[test]
    fn test_negative_never_below_floor() {
        let mut acc = CoherenceAccumulator::new();
        for _ in 0..10 {
            acc.positive_interaction(0.8);
        }
        let floor = acc.earned_floor;
        for _ in 0..100 {
            acc.negative_interaction(0.0);
        }
        assert_eq!(acc.coherence, floor);
        assert_eq!(acc.earned_floor, floor);
    }

    #[test]
    fn test_full_recovery_means_no_drop() {
        let mut acc = CoherenceAccumulator::new();
        acc.positive_interaction(1.0);
        let before = acc.coherence;
        acc.negative_interaction(1.0);
        assert_eq!(acc.coherence, before);
        assert_eq!(acc.interaction_count, 2);
    }

    #[test]
    fn test_zero_curiosity_counts_but_does_not_grow() {
        let mut acc = CoherenceAccumulator::new();
        acc.positive_interaction(0.0);
        assert_eq!(acc.coherence, 0.0);
        assert_eq!(acc.interaction_count, 1);
    }

    #[test]
    fn test_effective_gate_unfamiliar_takes_minimum() {
        let acc = CoherenceAccumulator { coherence: 0.2, earned_floor: 0.0, interaction_count: 3 };
        assert!((acc.effective_coherence(0.8) - 0.2).abs() < 1e-6);
        assert!((acc.effective_coherence(0.05) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_effective_gate_familiar_blends() {
        let acc = CoherenceAccumulator { coherence: 0.6, earned_floor: 0.1, interaction_count: 9 };
        let eff = acc.effective_coherence(0.8);
        assert!((eff - (0.3 * 0.8 + 0.7 * 0.6)).abs() < 1e-6, "eff={}", eff);
        // History buffers a low instant signal.
        assert!(acc.effective_coherence(0.1) > 0.1);
    }

    #[test]
    fn test_effective_gate_boundary_is_familiar() {
        let acc = CoherenceAccumulator { coherence: 0.3, earned_floor: 0.0, interaction_count: 1 };
        let eff = acc.effective_coherence(1.0);
        assert!((eff - (0.3 + 0.21)).abs() < 1e-6, "eff={}", eff);
    }

    // ── CoherenceField tests ──────────────────────────────────────────────

    #[test]
    fn test_unseen_reads_do_not_insert() {
        let field = CoherenceField::default();
        assert_eq!(field.effective_coherence(A, 0.9), 0.0);
        assert_eq!(field.raw_coherence(A), 0.0);
        assert_eq!(field.interaction_count(A), 0);
        assert_eq!(field.last_phase(A), SocialPhase::ShyObserver);
        assert!(field.get(A).is_none());
        assert_eq!(field.context_count(), 0);
    }

    #[test]
    fn test_independent_contexts() {
        let mut field = CoherenceField::new(personality(0.5, 0.5));
        for _ in 0..5 {
            field.positive_interaction(A);
        }
        assert!(field.raw_coherence(A) > 0.25);
        assert_eq!(field.raw_coherence(B), 0.0);
        assert_eq!(field.context_count(), 1);
    }

    #[test]
    fn test_personality_scales_gain_and_decay() {
        let mut eager = CoherenceField::new(personality(0.9, 0.5));
        let mut wary = CoherenceField::new(personality(0.1, 0.5));
        for _ in 0..3 {
            eager.positive_interaction(A);
            wary.positive_interaction(A);
        }
        assert!(eager.raw_coherence(A) > wary.raw_coherence(A));

        let mut resilient = CoherenceField::new(personality(1.0, 0.9));
        let mut fragile = CoherenceField::new(personality(1.0, 0.1));
        for f in [&mut resilient, &mut fragile] {
            for _ in 0..5 {
                f.positive_interaction(A);
            }
            f.negative_interaction(A);
        }
        assert!(resilient.raw_coherence(A) > fragile.raw_coherence(A));
    }

    #[test]
    fn test_instant_is_clamped() {
        let mut field = CoherenceField::new(personality(1.0, 0.5));
        for _ in 0..5 {
            field.positive_interaction(A);
        }
        let c = field.raw_coherence(A);
        assert!(c >= 0.3);
        let high = field.effective_coherence(A, 7.0);
        assert!((high - (0.3 + 0.7 * c)).abs() < 1e-6, "high={}", high);
        let low = field.effective_coherence(A, -3.0);
        assert!((low - 0.7 * c).abs() < 1e-6, "low={}", low);
        assert_eq!(field.effective_coherence(A, f32::NAN), field.effective_coherence(A, 0.0));
    }

    #[test]
    fn test_last_phase_tracked_per_context() {
        let mut field = CoherenceField::default();
        field.set_last_phase(A, SocialPhase::BuildingTrust);
        assert_eq!(field.last_phase(A), SocialPhase::BuildingTrust);
        assert_eq!(field.last_phase(B), SocialPhase::ShyObserver);
        // Setting a phase creates the context with a zero accumulator.
        assert_eq!(field.interaction_count(A), 0);
        assert_eq!(field.context_count(), 1);
    }

    #[test]
    fn test_restore_clamps_into_invariants() {
        let mut field = CoherenceField::default();
        field.restore(
            A,
            CoherenceAccumulator { coherence: 1.7, earned_floor: 2.0, interaction_count: 4 },
            SocialPhase::QuietlyBeloved,
        );
        let e = field.get(A).unwrap();
        assert_eq!(e.accumulator.coherence, 1.0);
        assert_eq!(e.accumulator.earned_floor, 1.0);
        assert_eq!(e.last_phase, SocialPhase::QuietlyBeloved);

        field.restore(
            B,
            CoherenceAccumulator { coherence: 0.4, earned_floor: 0.9, interaction_count: 1 },
            SocialPhase::ShyObserver,
        );
        assert_eq!(field.earned_floor(B), 0.4);

        field.restore(
            B,
            CoherenceAccumulator { coherence: f32::NAN, earned_floor: -1.0, interaction_count: 1 },
            SocialPhase::ShyObserver,
        );
        assert_eq!(field.raw_coherence(B), 0.0);
        assert_eq!(field.earned_floor(B), 0.0);
    }

    #[test]
    fn test_iter_and_context_count() {
        let mut field = CoherenceField::default();
        field.positive_interaction(A);
        field.negative_interaction(B);
        assert_eq!(field.context_count(), 2);
        let mut hashes: Vec<u32> = field.iter().map(|(h, _)| h).collect();
        hashes.sort_unstable();
        assert_eq!(hashes, vec![A, B]);
    }

    #[test]
    fn test_set_personality_replaces_wholesale() {
        let mut field = CoherenceField::default();
        field.set_personality(personality(0.2, 0.9));
        assert_eq!(field.personality(), &personality(0.2, 0.9));
        field.positive_interaction(A);
        assert!((field.raw_coherence(A) - 0.024).abs() < 1e-6);
    }
}
