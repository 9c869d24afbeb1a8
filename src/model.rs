//! Core data model.
//!
//! Plain data shared by every control: identity, validation status,
//! validation trigger, error payloads and descendant paths.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

static NEXT_CONTROL_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique, monotonically assigned control identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlId(pub u64);

impl ControlId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONTROL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ControlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Validation status of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidateStatus {
    /// Passed every validation check.
    #[default]
    Valid,
    /// Failed at least one check, locally or in a descendant.
    Invalid,
    /// An async validator is in flight.
    Validating,
    /// Validation is suppressed for this control.
    Disabled,
}

impl ValidateStatus {
    /// Fold a child's status into an aggregate. `Invalid` dominates
    /// `Validating`, which dominates `Valid`. Disabled children count as valid.
    pub(crate) fn merge(self, child: ValidateStatus) -> ValidateStatus {
        use ValidateStatus::*;
        match (self, child) {
            (Invalid, _) | (_, Invalid) => Invalid,
            (Validating, _) | (_, Validating) => Validating,
            _ => Valid,
        }
    }
}

impl std::fmt::Display for ValidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidateStatus::Valid => "valid",
            ValidateStatus::Invalid => "invalid",
            ValidateStatus::Validating => "validating",
            ValidateStatus::Disabled => "disabled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// The interaction that re-runs validation automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    #[default]
    Change,
    Blur,
    Submit,
}

impl std::str::FromStr for Trigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "change" => Ok(Trigger::Change),
            "blur" => Ok(Trigger::Blur),
            "submit" => Ok(Trigger::Submit),
            other => Err(Error::Config(format!(
                "unknown trigger {other:?}, expected change, blur or submit"
            ))),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trigger::Change => "change",
            Trigger::Blur => "blur",
            Trigger::Submit => "submit",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Detail payload for one error code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateError {
    /// Human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The offending value (or the measured property of it, e.g. a length).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,

    /// Validator specific parameters, e.g. `{"min": 3}`.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ValidateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<Value>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Error code → detail. An absent mapping (`None`) means "no errors".
pub type ValidateErrors = BTreeMap<String, ValidateError>;

/// Build a single-entry error mapping.
pub fn validate_errors(code: impl Into<String>, error: ValidateError) -> ValidateErrors {
    let mut errors = ValidateErrors::new();
    errors.insert(code.into(), error);
    errors
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// One step of a [`ControlPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// Index form of this segment, parsing numeric keys (`"0"` → `0`).
    /// Only canonical decimals qualify: no sign, no leading zeros.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(k) => {
                let canonical = !k.is_empty()
                    && k.bytes().all(|b| b.is_ascii_digit())
                    && (k == "0" || !k.starts_with('0'));
                if canonical { k.parse().ok() } else { None }
            }
        }
    }

    /// Key form of this segment; indices are rendered as decimal strings.
    pub fn as_key(&self) -> std::borrow::Cow<'_, str> {
        match self {
            PathSegment::Key(k) => std::borrow::Cow::Borrowed(k.as_str()),
            PathSegment::Index(i) => std::borrow::Cow::Owned(i.to_string()),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Key(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Key(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

/// Address of a descendant control: a dot-delimited string (`"a.b.0"`), a
/// single index, or an explicit segment list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ControlPath(pub Vec<PathSegment>);

impl ControlPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ControlPath {
    fn from(path: &str) -> Self {
        if path.is_empty() {
            return ControlPath::default();
        }
        ControlPath(path.split('.').map(PathSegment::from).collect())
    }
}

impl From<String> for ControlPath {
    fn from(path: String) -> Self {
        ControlPath::from(path.as_str())
    }
}

impl From<&String> for ControlPath {
    fn from(path: &String) -> Self {
        ControlPath::from(path.as_str())
    }
}

impl From<usize> for ControlPath {
    fn from(index: usize) -> Self {
        ControlPath(vec![PathSegment::Index(index)])
    }
}

impl From<Vec<PathSegment>> for ControlPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        ControlPath(segments)
    }
}

impl<const N: usize> From<[PathSegment; N]> for ControlPath {
    fn from(segments: [PathSegment; N]) -> Self {
        ControlPath(segments.into())
    }
}

impl std::fmt::Display for ControlPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for `set_value`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetValueOptions {
    /// Mark the control dirty after writing.
    pub dirty: bool,
    /// Mark the control blurred after writing.
    pub blur: bool,
}

impl SetValueOptions {
    pub fn dirty() -> Self {
        Self {
            dirty: true,
            blur: false,
        }
    }
}

/// Options for `get_value`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueOptions {
    /// Omit disabled descendants from composite values.
    pub skip_disabled: bool,
}
