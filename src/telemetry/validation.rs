//! Validation span helpers.

use tracing::Span;

use crate::model::{ControlId, ValidateStatus};

/// Start a span covering one validation run of a control.
///
/// The `validation.status` field is declared empty and filled by
/// [`record_validation_outcome`].
pub fn start_validation_span(uid: ControlId, kind: &str) -> Span {
    tracing::debug_span!(
        "control.validate",
        "control.uid" = uid.0,
        "control.kind" = kind,
        "validation.status" = tracing::field::Empty,
    )
}

/// Record the own status a validation run settled on.
pub fn record_validation_outcome(span: &Span, status: ValidateStatus) {
    span.record("validation.status", tracing::field::display(status));
}
