//! CCF_SEG: portable snapshot of a CoherenceField for persistence and transport.
//!
//! # Document layout (JSON)
//!
//! ```text
//! {
//!   "version":     1,                      // schema version (whole number)
//!   "ccf_version": "ccf-text/0.1.0",       // free-form tag
//!   "saved_at":    "2026-02-23T10:00:00+00:00",
//!   "personality": { "curiosity": 0.5, "recovery": 0.5 },
//!   "contexts": [
//!     { "ctx_hash": 1705053169, "coherence": 0.42, "earned_floor": 0.13,
//!       "interaction_count": 7, "last_phase": "BuildingTrust" }
//!   ]
//! }
//! ```
//!
//! The snapshot operates at the hash level: fingerprints are not stored, only
//! their FNV-1a hash. The runtime re-derives fingerprints from live turns.
//!
//! # Tolerant decoding
//!
//! Writing goes through serde derive. Reading does not: [`decode`] parses into
//! a generic [`serde_json::Value`] first and pulls out only the fields it
//! recognises, so a file written by a later minor revision (extra fields
//! anywhere) still loads, and one bad record costs only that record.
//!
//! [`CoherenceField`]: crate::accumulator::CoherenceField

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::accumulator::{CoherenceAccumulator, CoherenceField};
use crate::phase::{Personality, SocialPhase};

/// Current schema version. Files declaring a higher version are refused.
pub const SCHEMA_VERSION: u64 = 1;

/// Default `ccf_version` tag written by this build.
pub const DEFAULT_VERSION_TAG: &str = concat!("ccf-text/", env!("CARGO_PKG_VERSION"));

/// A serializable snapshot of a [`CoherenceField`] and its [`Personality`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CcfSnapshot {
    /// Schema version, always [`SCHEMA_VERSION`] for new snapshots.
    pub version: u64,
    /// Free-form semantic version tag of the writer.
    pub ccf_version: String,
    /// RFC 3339 timestamp of the save. Informational only.
    pub saved_at: String,
    /// Personality modulators at snapshot time.
    pub personality: PersonalityRecord,
    /// All tracked contexts, ordered by hash.
    pub contexts: Vec<ContextRecord>,
}

/// Serializable representation of [`Personality`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PersonalityRecord {
    /// Curiosity drive [0.0, 1.0].
    pub curiosity: f32,
    /// Recovery rate [0.0, 1.0].
    pub recovery: f32,
}

impl From<&Personality> for PersonalityRecord {
    fn from(p: &Personality) -> Self {
        Self { curiosity: p.curiosity_drive, recovery: p.recovery_rate }
    }
}

impl From<&PersonalityRecord> for Personality {
    fn from(r: &PersonalityRecord) -> Self {
        Personality::clamped(r.curiosity, r.recovery)
    }
}

/// Serializable representation of one context entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContextRecord {
    /// FNV-1a hash of the context fingerprint.
    pub ctx_hash: u32,
    /// Learned coherence [0.0, 1.0].
    pub coherence: f32,
    /// Earned floor [0.0, coherence].
    pub earned_floor: f32,
    /// Recorded events.
    pub interaction_count: u32,
    /// Variant name of the last classified phase.
    pub last_phase: String,
}

impl CcfSnapshot {
    /// Build a snapshot from a live field.
    ///
    /// `ccf_version` is stored verbatim; `saved_at` should be RFC 3339.
    pub fn from_field(field: &CoherenceField, ccf_version: &str, saved_at: String) -> Self {
        let mut contexts: Vec<ContextRecord> = field
            .iter()
            .map(|(hash, entry)| ContextRecord {
                ctx_hash: hash,
                coherence: entry.accumulator.coherence,
                earned_floor: entry.accumulator.earned_floor,
                interaction_count: entry.accumulator.interaction_count,
                last_phase: entry.last_phase.label().to_string(),
            })
            .collect();
        contexts.sort_by_key(|r| r.ctx_hash);

        Self {
            version: SCHEMA_VERSION,
            ccf_version: ccf_version.to_string(),
            saved_at,
            personality: PersonalityRecord::from(field.personality()),
            contexts,
        }
    }

    /// Number of context entries in this snapshot.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Look up a context record by hash.
    pub fn find_context(&self, hash: u32) -> Option<&ContextRecord> {
        self.contexts.iter().find(|r| r.ctx_hash == hash)
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// One context pulled out of a snapshot document.
#[derive(Clone, Debug, PartialEq)]
pub struct RestoredContext {
    /// Context hash.
    pub hash: u32,
    /// Accumulator as stored (clamping happens in [`CoherenceField::restore`]).
    pub accumulator: CoherenceAccumulator,
    /// Last phase; unknown labels read as `ShyObserver`.
    pub last_phase: SocialPhase,
}

/// Everything recognised in a snapshot document.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedSnapshot {
    /// Declared schema version (1 when absent).
    pub version: u64,
    /// Writer tag, if present and a string.
    pub ccf_version: Option<String>,
    /// Parsed save timestamp, if present and valid RFC 3339.
    pub saved_at: Option<DateTime<FixedOffset>>,
    /// Personality, missing parts defaulted and values clamped.
    pub personality: Personality,
    /// Well-formed records in document order.
    pub contexts: Vec<RestoredContext>,
    /// Records dropped as malformed.
    pub skipped: usize,
}

impl DecodedSnapshot {
    /// Rebuild a live field. Duplicate hashes resolve to the last record.
    pub fn to_field(&self) -> CoherenceField {
        let mut field = CoherenceField::new(self.personality);
        for ctx in &self.contexts {
            field.restore(ctx.hash, ctx.accumulator.clone(), ctx.last_phase);
        }
        field
    }
}

/// Why a document could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Not a snapshot document at all.
    Corrupt(String),
    /// Declares a schema version newer than [`SCHEMA_VERSION`].
    Newer(u64),
}

/// Decode a snapshot document, tolerating unknown fields and bad records.
pub fn decode(text: &str) -> Result<DecodedSnapshot, DecodeError> {
    let doc: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Corrupt(format!("invalid JSON: {e}")))?;
    let obj = doc
        .as_object()
        .ok_or_else(|| DecodeError::Corrupt("top level is not an object".into()))?;

    // JSON has no integer type: 2.0 is version 2, and 1.5 is already newer than 1.
    let version = match obj.get("version") {
        None => SCHEMA_VERSION,
        Some(v) => match as_whole_u64(v) {
            Some(n) => n,
            None => match v.as_f64() {
                Some(x) if x.is_finite() && x > SCHEMA_VERSION as f64 => {
                    return Err(DecodeError::Newer(x.ceil() as u64));
                }
                _ => {
                    return Err(DecodeError::Corrupt(format!(
                        "version is not a whole number: {v}"
                    )))
                }
            },
        },
    };
    if version > SCHEMA_VERSION {
        return Err(DecodeError::Newer(version));
    }

    let personality = decode_personality(obj.get("personality"));

    let (contexts, skipped) = match obj.get("contexts") {
        None => (Vec::new(), 0),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            let mut skipped = 0;
            for (i, item) in items.iter().enumerate() {
                match decode_record(item) {
                    Some(ctx) => out.push(ctx),
                    None => {
                        tracing::debug!(index = i, "skipping malformed context record");
                        skipped += 1;
                    }
                }
            }
            (out, skipped)
        }
        Some(_) => return Err(DecodeError::Corrupt("contexts is not a list".into())),
    };

    Ok(DecodedSnapshot {
        version,
        ccf_version: obj.get("ccf_version").and_then(Value::as_str).map(str::to_string),
        saved_at: obj
            .get("saved_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok()),
        personality,
        contexts,
        skipped,
    })
}

fn decode_personality(v: Option<&Value>) -> Personality {
    let defaults = Personality::default();
    let Some(p) = v.and_then(Value::as_object) else {
        return defaults;
    };
    let read = |key: &str, fallback: f32| {
        p.get(key).and_then(Value::as_f64).map_or(fallback, |x| x as f32)
    };
    Personality::clamped(read("curiosity", defaults.curiosity_drive), read("recovery", defaults.recovery_rate))
}

// Non-negative whole number, whether written as `5` or `5.0`.
fn as_whole_u64(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    let x = v.as_f64()?;
    if x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x < u64::MAX as f64 {
        Some(x as u64)
    } else {
        None
    }
}

// Optional field: absent → default, present with the wrong type → malformed.
fn optional<T>(
    rec: &Map<String, Value>,
    key: &str,
    default: T,
    get: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    match rec.get(key) {
        None => Some(default),
        Some(v) => get(v),
    }
}

fn decode_record(item: &Value) -> Option<RestoredContext> {
    let rec = item.as_object()?;
    let hash = u32::try_from(as_whole_u64(rec.get("ctx_hash")?)?).ok()?;
    let coherence = optional(rec, "coherence", 0.0, |v| v.as_f64().map(|x| x as f32))?;
    let earned_floor = optional(rec, "earned_floor", 0.0, |v| v.as_f64().map(|x| x as f32))?;
    let interaction_count = optional(rec, "interaction_count", 0, |v| {
        as_whole_u64(v).map(|n| u32::try_from(n).unwrap_or(u32::MAX))
    })?;
    let last_phase = optional(rec, "last_phase", SocialPhase::ShyObserver, |v| {
        v.as_str().map(|s| s.parse().unwrap_or(SocialPhase::ShyObserver))
    })?;

    Some(RestoredContext {
        hash,
        accumulator: CoherenceAccumulator { coherence, earned_floor, interaction_count },
        last_phase,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_field() -> CoherenceField {
        let mut field = CoherenceField::new(Personality { curiosity_drive: 0.8, recovery_rate: 0.3 });
        for _ in 0..4 {
            field.positive_interaction(10);
        }
        field.negative_interaction(10);
        field.set_last_phase(10, SocialPhase::BuildingTrust);
        field.positive_interaction(3);
        field
    }

    #[test]
    fn test_from_field_sorted_and_labelled() {
        let snap = CcfSnapshot::from_field(&sample_field(), "t", "2026-01-01T00:00:00+00:00".into());
        assert_eq!(snap.version, SCHEMA_VERSION);
        assert_eq!(snap.context_count(), 2);
        assert_eq!(snap.contexts[0].ctx_hash, 3);
        assert_eq!(snap.contexts[1].ctx_hash, 10);
        assert_eq!(snap.find_context(10).unwrap().last_phase, "BuildingTrust");
        assert_eq!(snap.find_context(10).unwrap().interaction_count, 5);
        assert!(snap.find_context(99).is_none());
        assert!((snap.personality.curiosity - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_written_document_decodes_exactly() {
        let field = sample_field();
        let snap = CcfSnapshot::from_field(&field, DEFAULT_VERSION_TAG, "2026-01-01T00:00:00+00:00".into());
        let json = serde_json::to_string(&snap).unwrap();
        let decoded = decode(&json).unwrap();
        assert_eq!(decoded.skipped, 0);
        assert_eq!(decoded.ccf_version.as_deref(), Some(DEFAULT_VERSION_TAG));
        assert!(decoded.saved_at.is_some());
        let restored = decoded.to_field();
        for (hash, entry) in field.iter() {
            assert_eq!(restored.get(hash), Some(entry), "hash={}", hash);
        }
    }

    #[test]
    fn test_decode_rejects_garbage_as_corrupt() {
        assert!(matches!(decode("{not json"), Err(DecodeError::Corrupt(_))));
        assert!(matches!(decode("[1,2,3]"), Err(DecodeError::Corrupt(_))));
        assert!(matches!(decode(r#"{"version":"one"}"#), Err(DecodeError::Corrupt(_))));
        assert!(matches!(decode(r#"{"contexts":{}}"#), Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn test_decode_newer_version() {
        assert_eq!(decode(r#"{"version":2,"contexts":[]}"#), Err(DecodeError::Newer(2)));
        assert_eq!(decode(r#"{"version":2.0,"contexts":[]}"#), Err(DecodeError::Newer(2)));
        assert_eq!(decode(r#"{"version":1.5}"#), Err(DecodeError::Newer(2)));
        assert_eq!(decode(r#"{"version":3e2}"#), Err(DecodeError::Newer(300)));
    }

    #[test]
    fn test_decode_version_as_float() {
        assert_eq!(decode(r#"{"version":1.0}"#).unwrap().version, 1);
        assert!(matches!(decode(r#"{"version":0.5}"#), Err(DecodeError::Corrupt(_))));
        assert!(matches!(decode(r#"{"version":-1}"#), Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn test_decode_minimal_document_uses_defaults() {
        let d = decode("{}").unwrap();
        assert_eq!(d.version, 1);
        assert_eq!(d.personality, Personality::default());
        assert!(d.contexts.is_empty());
        assert!(d.saved_at.is_none());
    }

    #[test]
    fn test_decode_personality_defaults_and_clamps() {
        let d = decode(r#"{"personality":{"curiosity":7.5,"recovery":"high"}}"#).unwrap();
        assert_eq!(d.personality.curiosity_drive, 1.0);
        assert_eq!(d.personality.recovery_rate, 0.5);
    }

    #[test]
    fn test_record_rules() {
        let doc = r#"{"contexts":[
            {"ctx_hash": 1},
            {"ctx_hash": 2, "coherence": "high"},
            {"coherence": 0.5},
            {"ctx_hash": -4, "coherence": 0.5},
            {"ctx_hash": 4294967296},
            {"ctx_hash": 3, "coherence": 0.4, "last_phase": "Infatuated"},
            {"ctx_hash": 4, "last_phase": 7},
            "not a record",
            {"ctx_hash": 5, "interaction_count": 9, "earned_floor": 0.1, "coherence": 0.2},
            {"ctx_hash": 6.0, "coherence": 0.4, "interaction_count": 5.0},
            {"ctx_hash": 7.5},
            {"ctx_hash": 8, "interaction_count": 2.5},
            {"ctx_hash": 9, "interaction_count": -1.0}
        ]}"#;
        let d = decode(doc).unwrap();
        let hashes: Vec<u32> = d.contexts.iter().map(|c| c.hash).collect();
        assert_eq!(hashes, vec![1, 3, 5, 6]);
        assert_eq!(d.skipped, 9);
        assert_eq!(d.contexts[0].accumulator, CoherenceAccumulator::default());
        assert_eq!(d.contexts[1].last_phase, SocialPhase::ShyObserver);
        assert_eq!(d.contexts[2].accumulator.interaction_count, 9);
        assert_eq!(d.contexts[3].accumulator.interaction_count, 5);
    }

    #[test]
    fn test_duplicate_hash_last_wins() {
        let doc = r#"{"contexts":[
            {"ctx_hash": 8, "coherence": 0.2},
            {"ctx_hash": 8, "coherence": 0.7}
        ]}"#;
        let field = decode(doc).unwrap().to_field();
        assert_eq!(field.context_count(), 1);
        assert!((field.raw_coherence(8) - 0.7).abs() < 1e-6);
    }
}
