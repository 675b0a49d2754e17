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

//! Social phase classification and personality modulators.
//!
//! # Patent Claims 3, 14–18
//!
//! - [`Personality`]: dynamic modulators (curiosity drive, recovery rate) (Claim 3).
//! - [`SocialPhase`]: five-phase classifier with two-sided hysteresis and acute overrides (Claims 14–18).
//! - [`PhaseThresholds`]: the six named thresholds (Claim 14).
//! - [`PhaseTemplates`]: per-phase behavioural instructions for a language model.
//!
//! # Invariants
//!
//! - Personality modulates deltas, not structure.
//! - Hysteresis: advancing needs more coherence than staying, so values
//!   hovering inside 0.28–0.35 or 0.45–0.55 never flip the phase.
//! - Acute overrides (Guardian, Retreat) are checked before hysteresis.
//! - Zero unsafe code.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CcfError, Result};

// ─── Personality ────────────────────────────────────────────────────────────

/// Dynamic personality modulators.
///
/// Both parameters are bounded in [0.0, 1.0] and modulate the *rate* of
/// coherence change, never the structural invariants.
///
/// Patent Claim 3 (modulators).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    /// Scales the gain of every positive interaction.
    ///
    /// Range [0.0, 1.0]. Default 0.5.
    pub curiosity_drive: f32,
    /// Softens the drop of every negative interaction (1.0 = no drop).
    ///
    /// Range [0.0, 1.0]. Default 0.5.
    pub recovery_rate: f32,
}

impl Personality {
    /// Validated constructor.
    pub fn new(curiosity_drive: f32, recovery_rate: f32) -> Result<Self> {
        Ok(Self {
            curiosity_drive: CcfError::check_unit("curiosity_drive", curiosity_drive)?,
            recovery_rate: CcfError::check_unit("recovery_rate", recovery_rate)?,
        })
    }

    /// Lenient constructor: values are clamped into [0.0, 1.0]; non-finite
    /// values fall back to the 0.5 default.
    pub fn clamped(curiosity_drive: f32, recovery_rate: f32) -> Self {
        let fix = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
        Self { curiosity_drive: fix(curiosity_drive), recovery_rate: fix(recovery_rate) }
    }
}

impl Default for Personality {
    fn default() -> Self {
        Self { curiosity_drive: 0.5, recovery_rate: 0.5 }
    }
}

// ─── PhaseThresholds ────────────────────────────────────────────────────────

/// The six thresholds driving [`SocialPhase::classify`].
///
/// Each advance threshold sits above the matching regress threshold; the
/// gap is the hysteresis band.
///
/// Patent Claim 14.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    /// From ShyObserver, coherence must reach this to advance.
    pub shy_to_building_upper: f32,
    /// From BuildingTrust, coherence below this regresses to ShyObserver.
    pub building_to_shy_lower: f32,
    /// From BuildingTrust, coherence must reach this to advance.
    pub building_to_beloved_upper: f32,
    /// From QuietlyBeloved, coherence below this regresses to BuildingTrust.
    pub beloved_to_building_lower: f32,
    /// Instant below this, in a familiar context, forces ProtectiveGuardian.
    pub guardian_instant_threshold: f32,
    /// Instant below this, in an unfamiliar context, forces StartledRetreat.
    pub startle_instant_threshold: f32,
}

impl PhaseThresholds {
    /// The thresholds as `(name, value)` pairs, in table order.
    pub fn named(&self) -> [(&'static str, f32); 6] {
        [
            ("shy_to_building_upper", self.shy_to_building_upper),
            ("building_to_shy_lower", self.building_to_shy_lower),
            ("building_to_beloved_upper", self.building_to_beloved_upper),
            ("beloved_to_building_lower", self.beloved_to_building_lower),
            ("guardian_instant_threshold", self.guardian_instant_threshold),
            ("startle_instant_threshold", self.startle_instant_threshold),
        ]
    }

    fn fresh(&self, coherence: f32) -> SocialPhase {
        if coherence >= self.building_to_beloved_upper {
            SocialPhase::QuietlyBeloved
        } else if coherence >= self.shy_to_building_upper {
            SocialPhase::BuildingTrust
        } else {
            SocialPhase::ShyObserver
        }
    }
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            shy_to_building_upper: 0.35,
            building_to_shy_lower: 0.28,
            building_to_beloved_upper: 0.55,
            beloved_to_building_lower: 0.45,
            guardian_instant_threshold: 0.30,
            startle_instant_threshold: 0.20,
        }
    }
}

// ─── SocialPhase ────────────────────────────────────────────────────────────

/// Behavioural phase of the relationship in one context.
///
/// ```text
///                 coherence →
///   ShyObserver ──0.35──▶ BuildingTrust ──0.55──▶ QuietlyBeloved
///               ◀─0.28───               ◀─0.45───
///
///   acute overrides (low instant signal):
///     eff ≥ 0.55 ∧ instant < 0.30 → ProtectiveGuardian
///     eff < 0.35 ∧ instant < 0.20 → StartledRetreat
/// ```
///
/// Patent Claims 14–18.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocialPhase {
    /// Unfamiliar territory: measured, asks before assuming.
    ShyObserver,
    /// Some history: references prior turns, more specific.
    BuildingTrust,
    /// Deep trust: direct, opinionated, personal.
    QuietlyBeloved,
    /// Familiar context under acute stress: grounding, protective.
    ProtectiveGuardian,
    /// Sensitive territory without trust: careful, non-probing.
    StartledRetreat,
}

impl SocialPhase {
    /// Every phase, in declaration order.
    pub const ALL: [SocialPhase; 5] = [
        SocialPhase::ShyObserver,
        SocialPhase::BuildingTrust,
        SocialPhase::QuietlyBeloved,
        SocialPhase::ProtectiveGuardian,
        SocialPhase::StartledRetreat,
    ];

    /// Next phase from effective coherence, the instant signal and the
    /// previous phase. Stateless.
    pub fn classify(
        effective_coherence: f32,
        instant: f32,
        prev: SocialPhase,
        t: &PhaseThresholds,
    ) -> SocialPhase {
        if effective_coherence >= t.building_to_beloved_upper
            && instant < t.guardian_instant_threshold
        {
            return SocialPhase::ProtectiveGuardian;
        }
        if effective_coherence < t.shy_to_building_upper && instant < t.startle_instant_threshold {
            return SocialPhase::StartledRetreat;
        }

        match prev {
            SocialPhase::ShyObserver => {
                if effective_coherence >= t.shy_to_building_upper {
                    SocialPhase::BuildingTrust
                } else {
                    SocialPhase::ShyObserver
                }
            }
            SocialPhase::BuildingTrust => {
                if effective_coherence < t.building_to_shy_lower {
                    SocialPhase::ShyObserver
                } else if effective_coherence >= t.building_to_beloved_upper {
                    SocialPhase::QuietlyBeloved
                } else {
                    SocialPhase::BuildingTrust
                }
            }
            SocialPhase::QuietlyBeloved => {
                if effective_coherence < t.beloved_to_building_lower {
                    SocialPhase::BuildingTrust
                } else {
                    SocialPhase::QuietlyBeloved
                }
            }
            // Transient states have no band of their own.
            SocialPhase::ProtectiveGuardian | SocialPhase::StartledRetreat => {
                t.fresh(effective_coherence)
            }
        }
    }

    /// Variant name, as persisted in `last_phase`.
    pub fn label(self) -> &'static str {
        match self {
            SocialPhase::ShyObserver => "ShyObserver",
            SocialPhase::BuildingTrust => "BuildingTrust",
            SocialPhase::QuietlyBeloved => "QuietlyBeloved",
            SocialPhase::ProtectiveGuardian => "ProtectiveGuardian",
            SocialPhase::StartledRetreat => "StartledRetreat",
        }
    }

    /// Built-in behavioural instruction for this phase.
    pub fn default_template(self) -> &'static str {
        match self {
            SocialPhase::ShyObserver => {
                "You are early in exploring this topic with the user. Be helpful but measured. \
                 Ask clarifying questions. Don't assume familiarity. Provide balanced \
                 perspectives without strong opinions."
            }
            SocialPhase::BuildingTrust => {
                "You have some history with the user on this topic. You can reference prior \
                 conversations. Offer more specific suggestions. Begin to show personality."
            }
            SocialPhase::QuietlyBeloved => {
                "You have deep trust with the user in this domain. Be direct, opinionated, and \
                 personal. Push back when you disagree. Reference shared history. Offer \
                 unsolicited insights. This is a mature relationship."
            }
            SocialPhase::ProtectiveGuardian => {
                "The user is discussing this familiar topic under stress or in an unusual way. \
                 Be supportive but alert. Don't match their energy; ground them. Use your deep \
                 knowledge of their patterns to help."
            }
            SocialPhase::StartledRetreat => {
                "Sensitive territory with insufficient trust. Be extremely careful. Offer \
                 support without probing. Suggest professional resources if appropriate. Do not \
                 explore further without explicit invitation."
            }
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Default for SocialPhase {
    fn default() -> Self {
        SocialPhase::ShyObserver
    }
}

impl fmt::Display for SocialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SocialPhase {
    type Err = CcfError;
    fn from_str(s: &str) -> Result<Self> {
        SocialPhase::ALL
            .into_iter()
            .find(|p| p.label() == s)
            .ok_or_else(|| CcfError::UnknownLabel { kind: "phase", label: s.to_string() })
    }
}

// ─── Templates ──────────────────────────────────────────────────────────────

/// Per-phase template overrides. Unset phases use
/// [`SocialPhase::default_template`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseTemplates {
    overrides: [Option<String>; 5],
}

impl PhaseTemplates {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build overrides from a phase-name-keyed map.
    ///
    /// Keys must be variant names (`"QuietlyBeloved"`); anything else is
    /// rejected with [`CcfError::UnknownLabel`].
    pub fn from_named<I, K, V>(named: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut out = Self::new();
        for (name, text) in named {
            let phase: SocialPhase = name.as_ref().parse()?;
            out.set(phase, text);
        }
        Ok(out)
    }

    /// Override the template for `phase`.
    pub fn set(&mut self, phase: SocialPhase, template: impl Into<String>) {
        self.overrides[phase.index()] = Some(template.into());
    }

    /// Drop the override for `phase`.
    pub fn clear(&mut self, phase: SocialPhase) {
        self.overrides[phase.index()] = None;
    }

    /// The override for `phase`, or the built-in template.
    pub fn get(&self, phase: SocialPhase) -> &str {
        self.overrides[phase.index()]
            .as_deref()
            .unwrap_or_else(|| phase.default_template())
    }
}

/// Prefix a base system prompt with the phase's behavioural instruction.
///
/// Returns `"<template>\n\n<base>"`, or just the template when `base` is
/// blank.
pub fn build_system_prompt(base: &str, phase: SocialPhase, templates: &PhaseTemplates) -> String {
    let injection = templates.get(phase);
    if base.trim().is_empty() {
        injection.to_string()
    } else {
        format!("{injection}\n\n{base}")
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
