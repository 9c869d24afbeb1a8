//! Integration tests for telemetry initialization and span helpers.

use formtree::config::Config;
use formtree::telemetry::{TelemetryConfig, init_telemetry, metrics, validation};
use formtree::{FormControl, ValidateStatus, Validators};

#[test]
fn telemetry_initializes_from_config() {
    // Note: a tracing subscriber can only be set once per process. This
    // may return Err if another test already installed one; that is
    // acceptable.
    let config = TelemetryConfig::from(&Config::default());
    let _ = init_telemetry(config);
}

#[test]
fn telemetry_rejects_malformed_filters_or_reports_existing_subscriber() {
    let config = TelemetryConfig {
        log_level: "formtree=notalevel".to_string(),
        compact: true,
    };
    if std::env::var("RUST_LOG").is_err() {
        assert!(init_telemetry(config).is_err());
    }
}

#[test]
fn validation_span_creates_and_records_outcome() {
    let control = FormControl::new("x");
    let span = validation::start_validation_span(control.uid(), control.kind().as_str());
    validation::record_validation_outcome(&span, ValidateStatus::Invalid);
}

#[test]
fn metric_instruments_are_usable_without_a_provider() {
    metrics::validations_run().add(1, &[]);
    metrics::validations_discarded().add(1, &[]);
    metrics::validator_faults().add(1, &[]);
}

#[test]
fn validation_runs_inside_an_installed_subscriber() {
    let _ = init_telemetry(TelemetryConfig::default());
    let control = FormControl::with_options("", Validators::required());
    assert!(control.invalid());
}
