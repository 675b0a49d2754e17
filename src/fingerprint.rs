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

//! Conversation context fingerprint: the five-dimensional text vocabulary.
//!
//! Where a robot quantises light, noise and presence, a conversational agent
//! quantises the *relational situation* of a turn:
//!
//! | Dimension | Range | Source |
//! |---|---|---|
//! | `topic_domain` | 0–63 | keyword clusters ([`crate::topic`]) or an embedder |
//! | `conversation_depth` | 0–2 | explicit, or turn count (≤3 / ≤15 / deeper) |
//! | `emotional_register` | 0–3 | explicit, or keyword priority intense > vulnerable > warm |
//! | `time_of_day` | 0–3 | wall-clock hour |
//! | `session_phase` | 0–2 | turn count (≤3 / ≤20 / later) |
//!
//! The space is finite (64 × 3 × 4 × 4 × 3 = 9,216 contexts), so per-context
//! trust populations stay small. Hashing and similarity come from
//! [`SensorVocabulary`]; the hash is a persistence contract.
//!
//! ```rust
//! use ccf_text::fingerprint::ContextFingerprint;
//!
//! let fp = ContextFingerprint::new(5, 1, 0, 1, 1).unwrap();
//! assert_eq!(fp.context_hash(), 1_705_053_169);
//! assert!(ContextFingerprint::new(64, 0, 0, 0, 0).is_err());
//! ```

use core::fmt;
use core::str::FromStr;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::error::{CcfError, Result};
use crate::topic::{tokenize, TopicClusters, TopicEmbedder, MAX_TOPIC_DOMAIN};
use crate::vocabulary::{nearest_k, SensorVocabulary};

fn out_of_range(field: &'static str, value: u32, max: u32) -> CcfError {
    CcfError::OutOfRange { field, value, max }
}

fn unknown_label(kind: &'static str, label: &str) -> CcfError {
    CcfError::UnknownLabel { kind, label: label.to_string() }
}

// ─── Dimensions ─────────────────────────────────────────────────────────────

/// How far into a conversation we are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationDepth {
    /// Opening small talk.
    Shallow = 0,
    /// Established exchange.
    Moderate = 1,
    /// Long, involved conversation.
    Deep = 2,
}

impl ConversationDepth {
    /// Inclusive maximum of the integer encoding.
    pub const MAX: u32 = 2;

    /// Depth implied by a turn count: ≤3 shallow, ≤15 moderate, else deep.
    pub fn from_turn_count(turn_count: u32) -> Self {
        if turn_count <= 3 {
            Self::Shallow
        } else if turn_count <= 15 {
            Self::Moderate
        } else {
            Self::Deep
        }
    }

    /// Lower-case label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Shallow => "shallow",
            Self::Moderate => "moderate",
            Self::Deep => "deep",
        }
    }
}

impl TryFrom<u32> for ConversationDepth {
    type Error = CcfError;
    fn try_from(v: u32) -> Result<Self> {
        match v {
            0 => Ok(Self::Shallow),
            1 => Ok(Self::Moderate),
            2 => Ok(Self::Deep),
            _ => Err(out_of_range("conversation_depth", v, Self::MAX)),
        }
    }
}

impl FromStr for ConversationDepth {
    type Err = CcfError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "shallow" => Ok(Self::Shallow),
            "moderate" => Ok(Self::Moderate),
            "deep" => Ok(Self::Deep),
            _ => Err(unknown_label("depth", s)),
        }
    }
}

/// Emotional tone of the user's message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalRegister {
    /// No emotional markers.
    Neutral = 0,
    /// Affectionate, appreciative.
    Warm = 1,
    /// Anxious, sad, struggling.
    Vulnerable = 2,
    /// Urgent, angry, panicked.
    Intense = 3,
}

const WARM_WORDS: &[&str] = &[
    "love", "thank", "grateful", "appreciate", "wonderful", "happy", "joy", "friend",
    "family", "care", "kind", "warm", "nice",
];

const VULNERABLE_WORDS: &[&str] = &[
    "anxiety", "afraid", "scared", "nervous", "worry", "struggle", "difficult", "hard",
    "overwhelm", "sad", "loss", "grief", "depressed", "lonely", "alone", "cry", "hurt",
];

const INTENSE_WORDS: &[&str] = &[
    "urgent", "emergency", "crisis", "panic", "furious", "rage", "hate", "desperate",
    "critical", "immediately", "now", "must",
];

impl EmotionalRegister {
    /// Inclusive maximum of the integer encoding.
    pub const MAX: u32 = 3;

    /// Register detected from `text` by keyword priority.
    pub fn from_text(text: &str) -> Self {
        Self::from_tokens(&tokenize(text))
    }

    /// Register detected from a token set: intense > vulnerable > warm > neutral.
    pub fn from_tokens(tokens: &hashbrown::HashSet<String>) -> Self {
        let hit = |words: &[&str]| words.iter().any(|w| tokens.contains(*w));
        if hit(INTENSE_WORDS) {
            Self::Intense
        } else if hit(VULNERABLE_WORDS) {
            Self::Vulnerable
        } else if hit(WARM_WORDS) {
            Self::Warm
        } else {
            Self::Neutral
        }
    }

    /// Lower-case label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Warm => "warm",
            Self::Vulnerable => "vulnerable",
            Self::Intense => "intense",
        }
    }
}

impl TryFrom<u32> for EmotionalRegister {
    type Error = CcfError;
    fn try_from(v: u32) -> Result<Self> {
        match v {
            0 => Ok(Self::Neutral),
            1 => Ok(Self::Warm),
            2 => Ok(Self::Vulnerable),
            3 => Ok(Self::Intense),
            _ => Err(out_of_range("emotional_register", v, Self::MAX)),
        }
    }
}

impl FromStr for EmotionalRegister {
    type Err = CcfError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "warm" => Ok(Self::Warm),
            "vulnerable" => Ok(Self::Vulnerable),
            "intense" => Ok(Self::Intense),
            _ => Err(unknown_label("register", s)),
        }
    }
}

/// Wall-clock period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 05:00–11:59.
    Morning = 0,
    /// 12:00–16:59.
    Afternoon = 1,
    /// 17:00–20:59.
    Evening = 2,
    /// 21:00–04:59.
    Night = 3,
}

impl TimeOfDay {
    /// Inclusive maximum of the integer encoding.
    pub const MAX: u32 = 3;

    /// Period containing `hour` (0–23). Anything else falls in `Night`.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Period for the current local time.
    pub fn now() -> Self {
        Self::from_hour(chrono::Local::now().hour())
    }

    /// Lower-case label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

impl TryFrom<u32> for TimeOfDay {
    type Error = CcfError;
    fn try_from(v: u32) -> Result<Self> {
        match v {
            0 => Ok(Self::Morning),
            1 => Ok(Self::Afternoon),
            2 => Ok(Self::Evening),
            3 => Ok(Self::Night),
            _ => Err(out_of_range("time_of_day", v, Self::MAX)),
        }
    }
}

/// Where in the session the turn falls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Turns 0–3.
    Opening = 0,
    /// Turns 4–20.
    Middle = 1,
    /// Turn 21 onwards.
    Closing = 2,
}

impl SessionPhase {
    /// Inclusive maximum of the integer encoding.
    pub const MAX: u32 = 2;

    /// Session phase implied by a turn count: ≤3 opening, ≤20 middle, else closing.
    pub fn from_turn_count(turn_count: u32) -> Self {
        if turn_count <= 3 {
            Self::Opening
        } else if turn_count <= 20 {
            Self::Middle
        } else {
            Self::Closing
        }
    }

    /// Lower-case label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Middle => "middle",
            Self::Closing => "closing",
        }
    }
}

impl TryFrom<u32> for SessionPhase {
    type Error = CcfError;
    fn try_from(v: u32) -> Result<Self> {
        match v {
            0 => Ok(Self::Opening),
            1 => Ok(Self::Middle),
            2 => Ok(Self::Closing),
            _ => Err(out_of_range("session_phase", v, Self::MAX)),
        }
    }
}

// ─── ContextFingerprint ─────────────────────────────────────────────────────

/// Quantised description of one conversational situation.
///
/// Value type: two fingerprints with equal dimensions are the same context
/// and hash identically. Fields are private so that every instance has
/// passed range validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFingerprint", into = "RawFingerprint")]
pub struct ContextFingerprint {
    topic_domain: u8,
    conversation_depth: ConversationDepth,
    emotional_register: EmotionalRegister,
    time_of_day: TimeOfDay,
    session_phase: SessionPhase,
}

/// Integer wire form used by serde; validated on the way in.
#[derive(Serialize, Deserialize)]
struct RawFingerprint {
    topic_domain: u32,
    conversation_depth: u32,
    emotional_register: u32,
    time_of_day: u32,
    session_phase: u32,
}

impl TryFrom<RawFingerprint> for ContextFingerprint {
    type Error = CcfError;
    fn try_from(r: RawFingerprint) -> Result<Self> {
        Self::new(
            r.topic_domain,
            r.conversation_depth,
            r.emotional_register,
            r.time_of_day,
            r.session_phase,
        )
    }
}

impl From<ContextFingerprint> for RawFingerprint {
    fn from(f: ContextFingerprint) -> Self {
        let [topic_domain, conversation_depth, emotional_register, time_of_day, session_phase] =
            f.dimensions();
        Self { topic_domain, conversation_depth, emotional_register, time_of_day, session_phase }
    }
}

impl ContextFingerprint {
    /// Construct from raw integers, validating every dimension.
    ///
    /// Fails with [`CcfError::OutOfRange`] naming the first offending field.
    pub fn new(
        topic_domain: u32,
        conversation_depth: u32,
        emotional_register: u32,
        time_of_day: u32,
        session_phase: u32,
    ) -> Result<Self> {
        if topic_domain > MAX_TOPIC_DOMAIN as u32 {
            return Err(out_of_range("topic_domain", topic_domain, MAX_TOPIC_DOMAIN as u32));
        }
        Ok(Self {
            topic_domain: topic_domain as u8,
            conversation_depth: ConversationDepth::try_from(conversation_depth)?,
            emotional_register: EmotionalRegister::try_from(emotional_register)?,
            time_of_day: TimeOfDay::try_from(time_of_day)?,
            session_phase: SessionPhase::try_from(session_phase)?,
        })
    }

    /// Construct from typed dimensions. Only `topic_domain` can be out of range.
    pub fn from_parts(
        topic_domain: u8,
        conversation_depth: ConversationDepth,
        emotional_register: EmotionalRegister,
        time_of_day: TimeOfDay,
        session_phase: SessionPhase,
    ) -> Result<Self> {
        if topic_domain > MAX_TOPIC_DOMAIN {
            return Err(out_of_range(
                "topic_domain",
                topic_domain as u32,
                MAX_TOPIC_DOMAIN as u32,
            ));
        }
        Ok(Self {
            topic_domain,
            conversation_depth,
            emotional_register,
            time_of_day,
            session_phase,
        })
    }

    /// Topic cluster id, 0–63.
    pub fn topic_domain(&self) -> u8 {
        self.topic_domain
    }

    /// Conversation depth.
    pub fn conversation_depth(&self) -> ConversationDepth {
        self.conversation_depth
    }

    /// Emotional register.
    pub fn emotional_register(&self) -> EmotionalRegister {
        self.emotional_register
    }

    /// Time of day.
    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day
    }

    /// Session phase.
    pub fn session_phase(&self) -> SessionPhase {
        self.session_phase
    }

    /// Stable 32-bit FNV-1a hash; the key under which trust is stored.
    pub fn context_hash(&self) -> u32 {
        self.context_hash_u32()
    }

    /// `[topic/63, depth/2, register/3, time/3, phase/2]`.
    pub fn feature_vector(&self) -> [f32; 5] {
        self.to_feature_vec()
    }

    /// Up to `k` of `known` ranked by cosine similarity to `self`, best first.
    pub fn nearest<'a>(&self, known: &'a [ContextFingerprint], k: usize) -> Vec<(&'a ContextFingerprint, f32)> {
        nearest_k::<_, 5>(self, known, k)
    }

    /// `topic:<id>:<depth>:<register>:<time>:<session>`, for logs and dashboards.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContextFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "topic:{}:{}:{}:{}:{}",
            self.topic_domain,
            self.conversation_depth.label(),
            self.emotional_register.label(),
            self.time_of_day.label(),
            self.session_phase.label(),
        )
    }
}

impl SensorVocabulary<5> for ContextFingerprint {
    const MAXIMA: [u32; 5] = [
        MAX_TOPIC_DOMAIN as u32,
        ConversationDepth::MAX,
        EmotionalRegister::MAX,
        TimeOfDay::MAX,
        SessionPhase::MAX,
    ];

    fn dimensions(&self) -> [u32; 5] {
        [
            self.topic_domain as u32,
            self.conversation_depth as u32,
            self.emotional_register as u32,
            self.time_of_day as u32,
            self.session_phase as u32,
        ]
    }
}

// ─── Derivation ─────────────────────────────────────────────────────────────

/// Caller-supplied inputs for [`ContextDeriver::derive`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeriveOptions {
    /// Explicit depth; inferred from `turn_count` when `None`.
    pub depth: Option<ConversationDepth>,
    /// Explicit register; detected from the text when `None`.
    pub register: Option<EmotionalRegister>,
    /// Turns completed so far in this session.
    pub turn_count: u32,
    /// Ask the installed [`TopicEmbedder`] (if any) for the topic.
    pub use_embeddings: bool,
}

impl DeriveOptions {
    /// Options with only the turn count set.
    pub fn at_turn(turn_count: u32) -> Self {
        Self { turn_count, ..Self::default() }
    }
}

/// Turns raw conversation signals into a [`ContextFingerprint`].
///
/// Holds the topic table and the optional embedding collaborator. Derivation
/// never fails: every derived dimension is in range by construction.
pub struct ContextDeriver {
    topics: TopicClusters,
    embedder: Option<Box<dyn TopicEmbedder>>,
}

impl ContextDeriver {
    /// Deriver with the built-in keyword table and no embedder.
    pub fn new() -> Self {
        Self { topics: TopicClusters::default(), embedder: None }
    }

    /// Replace the keyword table.
    pub fn with_topics(mut self, topics: TopicClusters) -> Self {
        self.topics = topics;
        self
    }

    /// Install an embedding collaborator, consulted when
    /// [`DeriveOptions::use_embeddings`] is set.
    pub fn with_embedder(mut self, embedder: Box<dyn TopicEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// The active keyword table.
    pub fn topics(&self) -> &TopicClusters {
        &self.topics
    }

    /// Derive a fingerprint for `text` at wall-clock `hour` (0–23).
    pub fn derive(&self, text: &str, opts: &DeriveOptions, hour: u32) -> ContextFingerprint {
        let tokens = tokenize(text);

        let embedded = if opts.use_embeddings {
            self.embedder
                .as_ref()
                .and_then(|e| e.cluster(text))
                .filter(|id| *id <= MAX_TOPIC_DOMAIN)
        } else {
            None
        };
        let topic_domain = embedded.unwrap_or_else(|| self.topics.classify_tokens(&tokens));

        ContextFingerprint {
            topic_domain,
            conversation_depth: opts
                .depth
                .unwrap_or_else(|| ConversationDepth::from_turn_count(opts.turn_count)),
            emotional_register: opts
                .register
                .unwrap_or_else(|| EmotionalRegister::from_tokens(&tokens)),
            time_of_day: TimeOfDay::from_hour(hour),
            session_phase: SessionPhase::from_turn_count(opts.turn_count),
        }
    }

    /// [`derive`](Self::derive) using the current local hour.
    pub fn derive_now(&self, text: &str, opts: &DeriveOptions) -> ContextFingerprint {
        self.derive(text, opts, chrono::Local::now().hour())
    }
}

impl Default for ContextDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextDeriver")
            .field("topic_clusters", &self.topics.len())
            .field("embedder", &self.embedder.is_some())
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
