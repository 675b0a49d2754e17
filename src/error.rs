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

//! Error taxonomy for the CCF text stack.
//!
//! Only two conditions are ever surfaced from the trust pipeline itself:
//! an out-of-range fingerprint dimension at construction, and a state file
//! written by a newer schema. Absent or unreadable state files are *not*
//! errors; see [`crate::store::LoadOutcome`].

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CcfError>;

/// Errors raised by fingerprint construction, configuration and persistence.
#[derive(Debug, Error)]
pub enum CcfError {
    /// A fingerprint dimension is outside its closed range `0..=max`.
    #[error("{field} must be in 0..={max}, got {value}")]
    OutOfRange {
        /// Dimension name, e.g. `"topic_domain"`.
        field: &'static str,
        /// The rejected value.
        value: u32,
        /// Inclusive upper bound for the dimension.
        max: u32,
    },

    /// A unit-interval parameter (personality modulator, instant signal)
    /// is outside [0.0, 1.0] or not finite.
    #[error("{name} must be in [0.0, 1.0], got {value}")]
    ParameterOutOfRange {
        /// Parameter name, e.g. `"curiosity_drive"`.
        name: &'static str,
        /// The rejected value.
        value: f32,
    },

    /// A textual label did not name any known variant.
    #[error("unknown {kind} label: {label:?}")]
    UnknownLabel {
        /// What was being parsed (`"depth"`, `"register"`, `"phase"`).
        kind: &'static str,
        /// The rejected label.
        label: String,
    },

    /// The state file declares a schema version newer than this build reads.
    #[error("state file schema version {found} is newer than supported version {supported}")]
    IncompatibleSchema {
        /// Version found in the file.
        found: u64,
        /// Highest version this build understands.
        supported: u64,
    },

    /// Filesystem failure while writing state.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding failure while writing state or reading configuration.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CcfError {
    fn from(e: serde_json::Error) -> Self {
        CcfError::Serialization(e.to_string())
    }
}

impl CcfError {
    /// Validate that `value` lies in [0.0, 1.0].
    pub(crate) fn check_unit(name: &'static str, value: f32) -> Result<f32> {
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(CcfError::ParameterOutOfRange { name, value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message_names_field() {
        let e = CcfError::OutOfRange { field: "topic_domain", value: 64, max: 63 };
        assert_eq!(e.to_string(), "topic_domain must be in 0..=63, got 64");
    }

    #[test]
    fn test_check_unit_rejects_nan_and_outside() {
        assert!(CcfError::check_unit("x", 0.0).is_ok());
        assert!(CcfError::check_unit("x", 1.0).is_ok());
        assert!(CcfError::check_unit("x", 1.01).is_err());
        assert!(CcfError::check_unit("x", -0.01).is_err());
        assert!(CcfError::check_unit("x", f32::NAN).is_err());
    }
}
