//! Metric instrument factories for formtree.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"formtree"` meter.

use opentelemetry::metrics::{Counter, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("formtree")
}

/// Counter: validation runs started.
/// Labels: `kind` ("single" | "group" | "array"), `mode` ("sync" | "async").
pub fn validations_run() -> Counter<u64> {
    meter()
        .u64_counter("formtree.validation.runs")
        .with_description("Number of control validation runs")
        .build()
}

/// Counter: async validation results dropped because a newer run started.
/// Labels: `kind`.
pub fn validations_discarded() -> Counter<u64> {
    meter()
        .u64_counter("formtree.validation.discarded")
        .with_description("Stale async validation results discarded")
        .build()
}

/// Counter: async validators that faulted instead of producing a result.
/// Labels: `kind`.
pub fn validator_faults() -> Counter<u64> {
    meter()
        .u64_counter("formtree.validation.faults")
        .with_description("Async validator faults")
        .build()
}
