//! Python FFI bindings via PyO3.
//!
//! Exposes the conversational trust pipeline to Python: fingerprints,
//! the coherence field keyed by fingerprint hash, the phase classifier and
//! the state file.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from ccf_text import ContextFingerprint, CoherenceField, Personality, SocialPhase, PhaseThresholds
//!
//! field = CoherenceField(Personality(curiosity_drive=0.5, recovery_rate=0.5))
//! key = ContextFingerprint.derive("What is compound interest?", turn_count=4, hour=14)
//! h = key.context_hash()
//!
//! phase = SocialPhase.ShyObserver
//! for _ in range(10):
//!     eff = field.effective_coherence(h, 0.8)
//!     phase = SocialPhase.classify(eff, 0.8, phase, PhaseThresholds())
//!     field.positive_interaction(h)
//! print(phase, phase.template())
//! ```

#![allow(non_snake_case)]

use pyo3::exceptions::{PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::accumulator::CoherenceField;
use crate::error::CcfError;
use crate::fingerprint::{
    ContextDeriver, ContextFingerprint, ConversationDepth, DeriveOptions, EmotionalRegister,
};
use crate::phase::{
    build_system_prompt as rust_build_system_prompt, Personality as RustPersonality, PhaseTemplates,
    PhaseThresholds as RustPhaseThresholds, SocialPhase as RustSocialPhase,
};
use crate::seg::DEFAULT_VERSION_TAG;
use crate::store::{self, LoadOutcome};
use crate::vocabulary::SensorVocabulary;

fn to_py_err(e: CcfError) -> PyErr {
    match e {
        CcfError::OutOfRange { .. }
        | CcfError::ParameterOutOfRange { .. }
        | CcfError::UnknownLabel { .. } => PyValueError::new_err(e.to_string()),
        CcfError::Io(_) => PyOSError::new_err(e.to_string()),
        CcfError::IncompatibleSchema { .. } | CcfError::Serialization(_) => {
            PyRuntimeError::new_err(e.to_string())
        }
    }
}

// ── Personality ───────────────────────────────────────────────────────────────

/// Personality modulators. Tune how trust builds and erodes.
///
/// Both parameters must lie in [0.0, 1.0]; anything else raises ValueError.
#[pyclass(name = "Personality")]
#[derive(Clone)]
pub struct PyPersonality {
    inner: RustPersonality,
}

#[pymethods]
impl PyPersonality {
    /// Create a new Personality.
    ///
    /// Args:
    ///     curiosity_drive: Higher = trust builds faster per good turn (default 0.5)
    ///     recovery_rate:   Higher = bad turns cost less trust (default 0.5)
    #[new]
    #[pyo3(signature = (curiosity_drive=0.5, recovery_rate=0.5))]
    pub fn new(curiosity_drive: f32, recovery_rate: f32) -> PyResult<Self> {
        RustPersonality::new(curiosity_drive, recovery_rate)
            .map(|inner| Self { inner })
            .map_err(to_py_err)
    }

    /// Curiosity drive in [0.0, 1.0].
    #[getter]
    pub fn curiosity_drive(&self) -> f32 {
        self.inner.curiosity_drive
    }

    /// Recovery rate in [0.0, 1.0].
    #[getter]
    pub fn recovery_rate(&self) -> f32 {
        self.inner.recovery_rate
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "Personality(curiosity_drive={:.2}, recovery_rate={:.2})",
            self.inner.curiosity_drive, self.inner.recovery_rate,
        )
    }
}

// ── ContextFingerprint ────────────────────────────────────────────────────────

/// Five-dimensional conversation context.
#[pyclass(name = "ContextFingerprint")]
#[derive(Clone)]
pub struct PyContextFingerprint {
    inner: ContextFingerprint,
}

#[pymethods]
impl PyContextFingerprint {
    /// Construct from integers; raises ValueError naming the first field out of range.
    #[new]
    pub fn new(
        topic_domain: u32,
        conversation_depth: u32,
        emotional_register: u32,
        time_of_day: u32,
        session_phase: u32,
    ) -> PyResult<Self> {
        ContextFingerprint::new(
            topic_domain,
            conversation_depth,
            emotional_register,
            time_of_day,
            session_phase,
        )
        .map(|inner| Self { inner })
        .map_err(to_py_err)
    }

    /// Derive from message text. `hour` defaults to the local clock.
    ///
    /// Args:
    ///     text:       the user's message
    ///     turn_count: turns completed so far in this session
    ///     depth:      explicit depth label ("shallow" | "moderate" | "deep")
    ///     register:   explicit register label ("neutral" | "warm" | "vulnerable" | "intense")
    ///     hour:       wall-clock hour 0–23
    #[staticmethod]
    #[pyo3(signature = (text, turn_count=0, depth=None, register=None, hour=None))]
    pub fn derive(
        text: &str,
        turn_count: u32,
        depth: Option<&str>,
        register: Option<&str>,
        hour: Option<u32>,
    ) -> PyResult<Self> {
        let opts = DeriveOptions {
            depth: depth.map(str::parse::<ConversationDepth>).transpose().map_err(to_py_err)?,
            register: register.map(str::parse::<EmotionalRegister>).transpose().map_err(to_py_err)?,
            turn_count,
            use_embeddings: false,
        };
        let deriver = ContextDeriver::new();
        let inner = match hour {
            Some(h) => deriver.derive(text, &opts, h),
            None => deriver.derive_now(text, &opts),
        };
        Ok(Self { inner })
    }

    /// Stable 32-bit FNV-1a hash.
    pub fn context_hash(&self) -> u32 {
        self.inner.context_hash()
    }

    /// Five floats in [0.0, 1.0].
    pub fn feature_vector(&self) -> Vec<f32> {
        self.inner.feature_vector().to_vec()
    }

    /// Cosine similarity in [0.0, 1.0].
    pub fn cosine_similarity(&self, other: &PyContextFingerprint) -> f32 {
        self.inner.cosine_similarity(&other.inner)
    }

    /// `topic:<id>:<depth>:<register>:<time>:<session>`.
    pub fn label(&self) -> String {
        self.inner.label()
    }

    /// Topic cluster id.
    #[getter]
    pub fn topic_domain(&self) -> u8 {
        self.inner.topic_domain()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!("ContextFingerprint({})", self.inner)
    }

    /// Python equality comparison.
    pub fn __eq__(&self, other: &PyContextFingerprint) -> bool {
        self.inner == other.inner
    }

    /// Python hash: the context hash.
    pub fn __hash__(&self) -> u64 {
        self.inner.context_hash() as u64
    }
}

// ── PhaseThresholds ───────────────────────────────────────────────────────────

/// The six classifier thresholds. `PhaseThresholds()` gives the defaults.
#[pyclass(name = "PhaseThresholds")]
#[derive(Clone)]
pub struct PyPhaseThresholds {
    inner: RustPhaseThresholds,
}

#[pymethods]
impl PyPhaseThresholds {
    /// Construct with default thresholds.
    #[new]
    pub fn new() -> Self {
        Self { inner: RustPhaseThresholds::default() }
    }

    /// Thresholds as a list of (name, value) pairs.
    pub fn named(&self) -> Vec<(&'static str, f32)> {
        self.inner.named().to_vec()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> &'static str {
        "PhaseThresholds()"
    }
}

// ── SocialPhase ───────────────────────────────────────────────────────────────

fn rust_to_py(p: RustSocialPhase) -> PySocialPhase {
    PySocialPhase { inner: p }
}

/// Five-phase relationship classifier.
///
/// Phases:
///     ShyObserver        unfamiliar, measured
///     BuildingTrust      some history, more specific
///     QuietlyBeloved     deep trust, direct and personal
///     ProtectiveGuardian familiar topic under acute stress
///     StartledRetreat    sensitive territory without trust
#[pyclass(name = "SocialPhase")]
#[derive(Clone)]
pub struct PySocialPhase {
    inner: RustSocialPhase,
}

#[pymethods]
impl PySocialPhase {
    /// Classify the next phase.
    ///
    /// Args:
    ///     coherence:  effective coherence in [0.0, 1.0] from CoherenceField
    ///     instant:    the instantaneous signal in [0.0, 1.0]
    ///     current:    the previous phase (for hysteresis)
    ///     thresholds: PhaseThresholds
    #[staticmethod]
    pub fn classify(
        coherence: f32,
        instant: f32,
        current: &PySocialPhase,
        thresholds: &PyPhaseThresholds,
    ) -> Self {
        rust_to_py(RustSocialPhase::classify(coherence, instant, current.inner, &thresholds.inner))
    }

    /// Parse a variant name.
    #[staticmethod]
    pub fn from_label(label: &str) -> PyResult<Self> {
        label.parse().map(rust_to_py).map_err(to_py_err)
    }

    /// ShyObserver class attribute.
    #[classattr]
    pub fn ShyObserver() -> Self {
        rust_to_py(RustSocialPhase::ShyObserver)
    }

    /// BuildingTrust class attribute.
    #[classattr]
    pub fn BuildingTrust() -> Self {
        rust_to_py(RustSocialPhase::BuildingTrust)
    }

    /// QuietlyBeloved class attribute.
    #[classattr]
    pub fn QuietlyBeloved() -> Self {
        rust_to_py(RustSocialPhase::QuietlyBeloved)
    }

    /// ProtectiveGuardian class attribute.
    #[classattr]
    pub fn ProtectiveGuardian() -> Self {
        rust_to_py(RustSocialPhase::ProtectiveGuardian)
    }

    /// StartledRetreat class attribute.
    #[classattr]
    pub fn StartledRetreat() -> Self {
        rust_to_py(RustSocialPhase::StartledRetreat)
    }

    /// Variant name.
    pub fn label(&self) -> &'static str {
        self.inner.label()
    }

    /// Built-in behavioural template for this phase.
    pub fn template(&self) -> &'static str {
        self.inner.default_template()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!("SocialPhase.{}", self.inner.label())
    }

    /// Python equality comparison.
    pub fn __eq__(&self, other: &PySocialPhase) -> bool {
        self.inner == other.inner
    }
}

/// Prefix `base` with the built-in template for `phase`.
#[pyfunction]
pub fn build_system_prompt(base: &str, phase: &PySocialPhase) -> String {
    rust_build_system_prompt(base, phase.inner, &PhaseTemplates::default())
}

// ── CoherenceField ────────────────────────────────────────────────────────────

/// Hash-keyed trust accumulator.
///
/// Every method takes a context hash from `ContextFingerprint.context_hash()`.
#[pyclass(name = "CoherenceField")]
pub struct PyCoherenceField {
    inner: CoherenceField,
}

#[pymethods]
impl PyCoherenceField {
    /// Create an empty field.
    #[new]
    #[pyo3(signature = (personality=None))]
    pub fn new(personality: Option<&PyPersonality>) -> Self {
        let p = personality.map(|p| p.inner).unwrap_or_default();
        Self { inner: CoherenceField::new(p) }
    }

    /// Record a good turn in context `ctx_hash`.
    pub fn positive_interaction(&mut self, ctx_hash: u32) {
        self.inner.positive_interaction(ctx_hash);
    }

    /// Record a bad turn in context `ctx_hash`.
    pub fn negative_interaction(&mut self, ctx_hash: u32) {
        self.inner.negative_interaction(ctx_hash);
    }

    /// Effective coherence in [0.0, 1.0]; 0.0 for unseen contexts.
    pub fn effective_coherence(&self, ctx_hash: u32, instant: f32) -> f32 {
        self.inner.effective_coherence(ctx_hash, instant)
    }

    /// Learned coherence; 0.0 for unseen contexts.
    pub fn raw_coherence(&self, ctx_hash: u32) -> f32 {
        self.inner.raw_coherence(ctx_hash)
    }

    /// Recorded events; 0 for unseen contexts.
    pub fn interaction_count(&self, ctx_hash: u32) -> u32 {
        self.inner.interaction_count(ctx_hash)
    }

    /// Number of tracked contexts.
    pub fn context_count(&self) -> usize {
        self.inner.context_count()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!("CoherenceField(contexts={})", self.inner.context_count())
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Atomically save `field` to `path`.
#[pyfunction]
#[pyo3(signature = (field, path, ccf_version=None))]
pub fn save_state(field: &PyCoherenceField, path: &str, ccf_version: Option<&str>) -> PyResult<()> {
    store::save(&field.inner, path, ccf_version.unwrap_or(DEFAULT_VERSION_TAG)).map_err(to_py_err)
}

/// Load a state file. Returns `None` if it is missing or corrupt; raises
/// RuntimeError if it was written by a newer schema.
#[pyfunction]
pub fn load_state(path: &str) -> PyResult<Option<(PyCoherenceField, PyPersonality)>> {
    match store::load(path).map_err(to_py_err)? {
        LoadOutcome::Restored(state) => Ok(Some((
            PyCoherenceField { inner: state.field },
            PyPersonality { inner: state.personality },
        ))),
        LoadOutcome::Missing | LoadOutcome::Corrupt { .. } => Ok(None),
    }
}

// ── Module entry point ────────────────────────────────────────────────────────

/// CCF text: earned, context-keyed trust for conversational agents.
#[pymodule]
pub fn ccf_text(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPersonality>()?;
    m.add_class::<PyContextFingerprint>()?;
    m.add_class::<PyPhaseThresholds>()?;
    m.add_class::<PySocialPhase>()?;
    m.add_class::<PyCoherenceField>()?;
    m.add_function(wrap_pyfunction!(build_system_prompt, m)?)?;
    m.add_function(wrap_pyfunction!(save_state, m)?)?;
    m.add_function(wrap_pyfunction!(load_state, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("FEATURE_DIM", <ContextFingerprint as SensorVocabulary<5>>::FEATURE_DIM)?;
    Ok(())
}
