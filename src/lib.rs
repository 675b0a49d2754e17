//! # ccf-text
//!
//! Contextual Coherence Fields for conversational agents: earned, context-keyed
//! trust that decides *how* an assistant should speak, per topic and situation.
//!
//! Patent pending: US Provisional Application 63/988,438 (priority date 23 Feb 2026).
//!
//! ---
//!
//! ## Trust is not a single global value.
//!
//! A user who has talked finance with the assistant for weeks is not a stranger
//! when finance comes up again. The same user raising a grief topic for the
//! first time *is*. Three primitives carry that distinction:
//!
//! **Context fingerprints**: each turn is quantised into five small integer
//! dimensions (topic cluster, depth, emotional register, time of day, session
//! phase). Every fingerprint has its own trust history, keyed by a stable hash.
//!
//! **The minimum gate**: effective coherence requires agreement between what the
//! agent has *learned* in this context and what it is *reading right now*.
//! > "Both must be true, or I stay reserved."
//!
//! Familiar contexts buffer noise; a single bad turn cannot erase earned trust.
//! Unfamiliar contexts demand proof before any familiarity is shown.
//!
//! **Phases with hysteresis**: effective coherence maps to one of five phases,
//! each with a behavioural instruction for the language model. Advancing takes
//! more than staying, so the voice does not flicker at a boundary.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! text, turn, clock → ContextFingerprint → CoherenceField → SocialPhase → system prompt
//!                            ↑                   ↑               ↑
//!                     TopicClusters         Personality     PhaseThresholds
//!                                                ↓
//!                                       store (atomic JSON snapshot)
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`vocabulary`] | [`SensorVocabulary`] | Closed integer dimensions; FNV-1a hash + cosine similarity |
//! | [`topic`] | [`TopicClusters`], [`TopicEmbedder`] | Keyword-cluster topic detection |
//! | [`fingerprint`] | [`ContextFingerprint`], [`ContextDeriver`] | The five-dimensional conversation vocabulary |
//! | [`accumulator`] | [`CoherenceAccumulator`], [`CoherenceField`] | Per-context trust with earned floor and minimum gate |
//! | [`phase`] | [`SocialPhase`], [`Personality`], [`PhaseThresholds`] | Five-phase classifier and prompt templates |
//! | [`seg`] | [`seg::CcfSnapshot`] | Snapshot document model and tolerant decoding |
//! | [`store`] | [`store::save`], [`store::load`] | Crash-safe state file |
//! | [`session`] | [`TrustSession`], [`SessionConfig`] | Per-turn orchestration |
//! | [`error`] | [`CcfError`] | Error taxonomy |
//!
//! ## Patent claim map
//!
//! | Type | Patent Claims | Description |
//! |------|--------------|-------------|
//! | [`SensorVocabulary`] | 1, 8 | Composite context key trait |
//! | [`ContextFingerprint`] | 1, 8 | Discrete context identifier from quantised conversation signals |
//! | [`CoherenceAccumulator`] | 2–5 | Per-context trust state with earned floor and asymmetric decay |
//! | [`CoherenceField`] | 6–7, 13 | Trust field: context-keyed accumulator map with min-gate |
//! | [`SocialPhase`] | 14–18 | Phase classifier with two-sided hysteresis |
//! | [`Personality`] | 3 (modulators) | Dynamic modulators: curiosity, recovery |
//!
//! ## Features
//!
//! - `python-ffi`: PyO3 extension module `ccf_text`.
//!
//! ## License
//!
//! Business Source License 1.1. Free for evaluation and non-production use.
//! Change date: 23 February 2032, then Apache License 2.0.
//! Commercial production use requires a license from Flout Labs (cbyrne@floutlabs.com).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod vocabulary;
pub mod topic;
pub mod fingerprint;
pub mod accumulator;
pub mod phase;
pub mod seg;
pub mod store;
pub mod session;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use accumulator::{CoherenceAccumulator, CoherenceField};
pub use error::{CcfError, Result};
pub use fingerprint::{ContextDeriver, ContextFingerprint, DeriveOptions};
pub use phase::{build_system_prompt, Personality, PhaseTemplates, PhaseThresholds, SocialPhase};
pub use session::{SessionConfig, TrustSession, TurnReading};
pub use topic::{TopicClusters, TopicEmbedder};
pub use vocabulary::SensorVocabulary;
