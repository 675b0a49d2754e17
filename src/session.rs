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

//! Per-turn orchestration for one conversational agent.
//!
//! ```text
//! begin_turn(text, instant)
//!   → derive fingerprint  → effective coherence → classify (prev phase)
//!   → system prompt       → TurnReading
//! record_outcome(positive)
//!   → update active context → autosave every N outcomes (fail-open)
//! ```
//!
//! The hot path does no I/O; only [`TrustSession::open`], [`TrustSession::save`]
//! and autosave touch the filesystem.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::accumulator::CoherenceField;
use crate::error::Result;
use crate::fingerprint::{ContextDeriver, ContextFingerprint, DeriveOptions};
use crate::phase::{build_system_prompt, Personality, PhaseTemplates, PhaseThresholds, SocialPhase};
use crate::seg::DEFAULT_VERSION_TAG;
use crate::store::{self, LoadOutcome};

/// Session configuration. Every field has a default, so `{}` is valid JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where state is loaded from and saved to. `None` keeps the session in memory.
    pub state_path: Option<PathBuf>,
    /// Personality for a fresh field; a restored file's personality wins.
    pub personality: Personality,
    /// Classifier thresholds.
    pub thresholds: PhaseThresholds,
    /// Template overrides keyed by phase name (`"QuietlyBeloved"` …).
    pub templates: BTreeMap<String, String>,
    /// Base system prompt the phase instruction is prepended to.
    pub base_prompt: String,
    /// Save after every N recorded outcomes. 0 disables autosave.
    pub autosave_every: u32,
    /// Instant signal used when a turn does not supply one.
    pub default_instant: f32,
    /// `ccf_version` tag written into state files.
    pub ccf_version_tag: String,
    /// Consult the topic embedder, if one is installed.
    pub use_embeddings: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_path: None,
            personality: Personality::default(),
            thresholds: PhaseThresholds::default(),
            templates: BTreeMap::new(),
            base_prompt: String::new(),
            autosave_every: 1,
            default_instant: 0.7,
            ccf_version_tag: DEFAULT_VERSION_TAG.to_string(),
            use_embeddings: false,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// What one turn looked like to the trust layer.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnReading {
    /// Fingerprint of the turn.
    pub fingerprint: ContextFingerprint,
    /// Its hash.
    pub context_hash: u32,
    /// Its human-readable label.
    pub label: String,
    /// Gated blend of learned trust and the instant signal.
    pub effective_coherence: f32,
    /// Learned trust for the context.
    pub raw_coherence: f32,
    /// Phase after this turn.
    pub phase: SocialPhase,
    /// Phase before this turn.
    pub previous_phase: SocialPhase,
    /// Phase instruction prepended to the base prompt.
    pub system_prompt: String,
    /// 1-based turn number within the session.
    pub turn: u32,
}

/// One agent's trust state plus the machinery to drive it turn by turn.
///
/// One session per conversation. Callers sharing a session across threads
/// wrap it in their own lock.
#[derive(Debug)]
pub struct TrustSession {
    field: CoherenceField,
    deriver: ContextDeriver,
    thresholds: PhaseThresholds,
    templates: PhaseTemplates,
    config: SessionConfig,
    phase: SocialPhase,
    active: Option<ContextFingerprint>,
    turn_count: u32,
    outcomes_since_save: u32,
}

impl TrustSession {
    /// Open a session, restoring state from `config.state_path` if present.
    ///
    /// A missing or corrupt file yields a fresh field with the configured
    /// personality. A file from a newer schema is an error.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let templates = PhaseTemplates::from_named(&config.templates)?;
        let personality = Personality::new(
            config.personality.curiosity_drive,
            config.personality.recovery_rate,
        )?;

        let field = match &config.state_path {
            None => CoherenceField::new(personality),
            Some(path) => match store::load(path)? {
                LoadOutcome::Restored(state) => {
                    tracing::debug!(
                        path = %path.display(),
                        contexts = state.field.context_count(),
                        "resumed session state"
                    );
                    state.field
                }
                LoadOutcome::Missing | LoadOutcome::Corrupt { .. } => CoherenceField::new(personality),
            },
        };

        Ok(Self {
            field,
            deriver: ContextDeriver::new(),
            thresholds: config.thresholds,
            templates,
            config,
            phase: SocialPhase::ShyObserver,
            active: None,
            turn_count: 0,
            outcomes_since_save: 0,
        })
    }

    /// In-memory session with default configuration.
    pub fn in_memory() -> Self {
        Self {
            field: CoherenceField::default(),
            deriver: ContextDeriver::new(),
            thresholds: PhaseThresholds::default(),
            templates: PhaseTemplates::default(),
            config: SessionConfig::default(),
            phase: SocialPhase::ShyObserver,
            active: None,
            turn_count: 0,
            outcomes_since_save: 0,
        }
    }

    /// Replace the context deriver (custom topic table, embedder).
    pub fn with_deriver(mut self, deriver: ContextDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    /// Derive a fingerprint for `text` and read trust for it.
    ///
    /// `instant` defaults to `config.default_instant`.
    pub fn begin_turn(&mut self, text: &str, instant: Option<f32>) -> TurnReading {
        let opts = DeriveOptions {
            turn_count: self.turn_count,
            use_embeddings: self.config.use_embeddings,
            ..DeriveOptions::default()
        };
        let fingerprint = self.deriver.derive_now(text, &opts);
        self.begin_turn_with(fingerprint, instant)
    }

    /// [`begin_turn`](Self::begin_turn) with a caller-built fingerprint.
    pub fn begin_turn_with(&mut self, fingerprint: ContextFingerprint, instant: Option<f32>) -> TurnReading {
        let instant = instant
            .filter(|v| v.is_finite())
            .unwrap_or(self.config.default_instant)
            .clamp(0.0, 1.0);
        let hash = fingerprint.context_hash();

        // A restored context resumes from the phase it was saved in.
        let previous_phase = if self.turn_count == 0 && self.field.get(hash).is_some() {
            self.field.last_phase(hash)
        } else {
            self.phase
        };

        let effective_coherence = self.field.effective_coherence(hash, instant);
        let phase =
            SocialPhase::classify(effective_coherence, instant, previous_phase, &self.thresholds);
        if phase != previous_phase {
            tracing::debug!(
                context = %fingerprint,
                from = previous_phase.label(),
                to = phase.label(),
                effective_coherence,
                "phase transition"
            );
        }

        self.phase = phase;
        self.field.set_last_phase(hash, phase);
        self.active = Some(fingerprint);
        self.turn_count = self.turn_count.saturating_add(1);

        TurnReading {
            fingerprint,
            context_hash: hash,
            label: fingerprint.label(),
            effective_coherence,
            raw_coherence: self.field.raw_coherence(hash),
            phase,
            previous_phase,
            system_prompt: build_system_prompt(&self.config.base_prompt, phase, &self.templates),
            turn: self.turn_count,
        }
    }

    /// Record how the active turn went. No-op before the first turn.
    pub fn record_outcome(&mut self, positive: bool) {
        let Some(active) = self.active else {
            return;
        };
        let hash = active.context_hash();
        if positive {
            self.field.positive_interaction(hash);
        } else {
            self.field.negative_interaction(hash);
        }

        if self.config.autosave_every == 0 || self.config.state_path.is_none() {
            return;
        }
        self.outcomes_since_save += 1;
        if self.outcomes_since_save >= self.config.autosave_every {
            self.outcomes_since_save = 0;
            if let Err(e) = self.save() {
                tracing::warn!(error = %e, "autosave failed; continuing with in-memory state");
            }
        }
    }

    /// Write the field to `config.state_path`. No-op for in-memory sessions.
    pub fn save(&self) -> Result<()> {
        match &self.config.state_path {
            Some(path) => store::save(&self.field, path, &self.config.ccf_version_tag),
            None => Ok(()),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SocialPhase {
        self.phase
    }

    /// Fingerprint of the most recent turn.
    pub fn active_context(&self) -> Option<&ContextFingerprint> {
        self.active.as_ref()
    }

    /// Turns begun so far.
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// Effective coherence of the active context at the default instant.
    pub fn effective_coherence(&self) -> f32 {
        self.active.map_or(0.0, |fp| {
            self.field.effective_coherence(fp.context_hash(), self.config.default_instant)
        })
    }

    /// The underlying field.
    pub fn field(&self) -> &CoherenceField {
        &self.field
    }

    /// Mutable access to the underlying field.
    pub fn field_mut(&mut self) -> &mut CoherenceField {
        &mut self.field
    }

    /// The active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_empty_json_is_default() {
        assert_eq!(SessionConfig::from_json_str("{}").unwrap(), SessionConfig::default());
    }

    #[test]
    fn test_config_partial_json() {
        let cfg = SessionConfig::from_json_str(
            r#"{"autosave_every": 5, "personality": {"curiosity_drive": 0.9},
                "templates": {"ShyObserver": "Hello stranger."}}"#,
        )
        .unwrap();
        assert_eq!(cfg.autosave_every, 5);
        assert!((cfg.personality.curiosity_drive - 0.9).abs() < f32::EPSILON);
        assert!((cfg.personality.recovery_rate - 0.5).abs() < f32::EPSILON);
        assert_eq!(cfg.templates.get("ShyObserver").map(String::as_str), Some("Hello stranger."));
    }

    #[test]
    fn test_open_rejects_bad_template_name_and_personality() {
        let mut cfg = SessionConfig::default();
        cfg.templates.insert("Besties".into(), "x".into());
        assert!(TrustSession::open(cfg).is_err());

        let cfg = SessionConfig {
            personality: Personality { curiosity_drive: 2.0, recovery_rate: 0.5 },
            ..SessionConfig::default()
        };
        assert!(TrustSession::open(cfg).is_err());
    }

    #[test]
    fn test_record_outcome_before_any_turn_is_noop() {
        let mut s = TrustSession::in_memory();
        s.record_outcome(true);
        assert_eq!(s.field().context_count(), 0);
    }

    #[test]
    fn test_turn_counts_and_prompt() {
        let mut s = TrustSession::in_memory();
        let r = s.begin_turn("What is compound interest?", Some(0.8));
        assert_eq!(r.turn, 1);
        assert_eq!(r.fingerprint.topic_domain(), 0);
        assert_eq!(r.phase, SocialPhase::ShyObserver);
        assert_eq!(r.previous_phase, SocialPhase::ShyObserver);
        assert_eq!(r.system_prompt, SocialPhase::ShyObserver.default_template());
        assert_eq!(s.turn_count(), 1);
        assert_eq!(s.active_context(), Some(&r.fingerprint));
    }

    #[test]
    fn test_low_instant_on_fresh_context_retreats() {
        let mut s = TrustSession::in_memory();
        let r = s.begin_turn("Something unexpected", Some(0.05));
        assert_eq!(r.phase, SocialPhase::StartledRetreat);
    }

    #[test]
    fn test_default_instant_applies() {
        let mut s = TrustSession::in_memory();
        let fp = ContextFingerprint::new(0, 1, 0, 1, 1).unwrap();
        for _ in 0..6 {
            s.begin_turn_with(fp, None);
            s.record_outcome(true);
        }
        let c = s.field().raw_coherence(fp.context_hash());
        let expected = 0.3 * 0.7 + 0.7 * c;
        assert!((s.effective_coherence() - expected).abs() < 1e-6);
    }
}
