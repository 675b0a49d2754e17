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

//! Crash-safe persistence of a [`CoherenceField`].
//!
//! # Save
//!
//! The snapshot is written to `.<name>.XXXX.tmp` in the destination's
//! directory, flushed, `fsync`ed and then renamed over the destination. The
//! file on disk is always either the previous complete snapshot or the new
//! one. If anything fails before the rename lands, the destination is
//! untouched and the temporary file is removed.
//!
//! Atomicity is a crash guarantee, not a multi-writer one: two processes
//! saving to the same path must be serialised by the caller.
//!
//! # Load
//!
//! | File | Result |
//! |---|---|
//! | absent | `Ok(LoadOutcome::Missing)` |
//! | unreadable / not a snapshot | `Ok(LoadOutcome::Corrupt { .. })` |
//! | newer schema | `Err(CcfError::IncompatibleSchema { .. })` |
//! | otherwise | `Ok(LoadOutcome::Restored(..))`, malformed records skipped |

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};

use crate::accumulator::CoherenceField;
use crate::error::{CcfError, Result};
use crate::phase::Personality;
use crate::seg::{decode, CcfSnapshot, DecodeError, SCHEMA_VERSION};

/// The filesystem step that moves a finished temporary file over the
/// destination. Must be atomic with respect to readers of `to`.
pub trait AtomicReplace {
    /// Replace `to` with `from`.
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`AtomicReplace`] via `std::fs::rename` (POSIX `rename(2)`, `MoveFileEx`
/// with replace on Windows).
#[derive(Clone, Copy, Debug, Default)]
pub struct StdReplace;

impl AtomicReplace for StdReplace {
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// Atomically write `field` (and its personality) to `path`.
pub fn save(field: &CoherenceField, path: impl AsRef<Path>, ccf_version: &str) -> Result<()> {
    save_with(field, path, ccf_version, &StdReplace)
}

/// [`save`] with an explicit replace strategy.
pub fn save_with<R>(
    field: &CoherenceField,
    path: impl AsRef<Path>,
    ccf_version: &str,
    replacer: &R,
) -> Result<()>
where
    R: AtomicReplace + ?Sized,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ccf_state".to_string());
    let snapshot = CcfSnapshot::from_field(field, ccf_version, Utc::now().to_rfc3339());

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    // Dropping a TempPath deletes the file, which is exactly the cleanup
    // wanted on the error path below.
    let tmp_path = tmp.into_temp_path();
    if let Err(e) = replacer.replace(&tmp_path, path) {
        tracing::warn!(path = %path.display(), error = %e, "state replace failed; destination left untouched");
        if let Err(close_err) = tmp_path.close() {
            tracing::warn!(error = %close_err, "could not remove temporary state file");
        }
        return Err(e.into());
    }
    tmp_path.keep().map_err(|e| CcfError::Io(e.error))?;

    tracing::debug!(path = %path.display(), contexts = snapshot.context_count(), "saved coherence field");
    Ok(())
}

/// A successfully restored state file.
#[derive(Debug)]
pub struct LoadedState {
    /// Rebuilt field, personality included.
    pub field: CoherenceField,
    /// Personality as stored (clamped).
    pub personality: Personality,
    /// When the file was written, if the timestamp parsed.
    pub saved_at: Option<DateTime<FixedOffset>>,
    /// Writer tag, if present.
    pub ccf_version: Option<String>,
    /// Malformed records that were dropped.
    pub skipped: usize,
}

/// Result of [`load`] when nothing needs to surface as an error.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The file held a usable snapshot.
    Restored(LoadedState),
    /// No file at the path.
    Missing,
    /// The file exists but is not a readable snapshot.
    Corrupt {
        /// Human-readable cause, for logs.
        reason: String,
    },
}

impl LoadOutcome {
    /// `(field, personality)`, both `None` unless restored.
    pub fn into_parts(self) -> (Option<CoherenceField>, Option<Personality>) {
        match self {
            LoadOutcome::Restored(s) => (Some(s.field), Some(s.personality)),
            LoadOutcome::Missing | LoadOutcome::Corrupt { .. } => (None, None),
        }
    }

    /// True for [`LoadOutcome::Restored`].
    pub fn is_restored(&self) -> bool {
        matches!(self, LoadOutcome::Restored(_))
    }
}

/// Read a state file written by [`save`].
///
/// Only a newer schema version is an error; every other failure degrades to
/// `Missing` or `Corrupt` so the caller can start fresh.
pub fn load(path: impl AsRef<Path>) -> Result<LoadOutcome> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no state file; starting fresh");
            return Ok(LoadOutcome::Missing);
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "state file unreadable; starting fresh");
            return Ok(LoadOutcome::Corrupt { reason: e.to_string() });
        }
    };

    match decode(&text) {
        Ok(decoded) => {
            if decoded.skipped > 0 {
                tracing::debug!(path = %path.display(), skipped = decoded.skipped, "dropped malformed records");
            }
            tracing::debug!(path = %path.display(), contexts = decoded.contexts.len(), "restored coherence field");
            Ok(LoadOutcome::Restored(LoadedState {
                field: decoded.to_field(),
                personality: decoded.personality,
                saved_at: decoded.saved_at,
                ccf_version: decoded.ccf_version,
                skipped: decoded.skipped,
            }))
        }
        Err(DecodeError::Corrupt(reason)) => {
            tracing::warn!(path = %path.display(), %reason, "state file corrupt; starting fresh");
            Ok(LoadOutcome::Corrupt { reason })
        }
        Err(DecodeError::Newer(found)) => {
            Err(CcfError::IncompatibleSchema { found, supported: SCHEMA_VERSION })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = load(dir.path().join("absent.json")).unwrap();
        assert!(matches!(outcome, LoadOutcome::Missing));
        assert_eq!(outcome.into_parts().0.map(|f| f.context_count()), None);
    }

    #[test]
    fn test_directory_path_is_corrupt_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = load(dir.path()).unwrap();
        assert!(matches!(outcome, LoadOutcome::Corrupt { .. }), "{:?}", outcome);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("state.json");
        let mut field = CoherenceField::default();
        field.positive_interaction(42);
        save(&field, &path, "test").unwrap();
        assert!(path.exists());
        assert!(load(&path).unwrap().is_restored());
    }
}
