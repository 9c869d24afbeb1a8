//! Built-in validators.
//!
//! Every validator except `required`/`required_true` treats an empty value
//! (null, `""`, `[]`) as valid, so optional fields only fail when filled in
//! wrongly. Combine with `required` to demand a value.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::ValidatorFn;
use crate::error::{Error, Result};
use crate::model::{ValidateError, validate_errors};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Namespace for the stock validators.
pub struct Validators;

impl Validators {
    /// Fails on null, `""` and `[]`. Numbers, including `0`, and `false` pass.
    pub fn required() -> ValidatorFn {
        ValidatorFn::new(|value, _| {
            is_empty(value).then(|| {
                validate_errors(
                    "required",
                    ValidateError::new().message("This field is required"),
                )
            })
        })
    }

    /// Passes only on the boolean `true`.
    pub fn required_true() -> ValidatorFn {
        ValidatorFn::new(|value, _| {
            (value != &Value::Bool(true)).then(|| {
                validate_errors(
                    "requiredTrue",
                    ValidateError::new()
                        .message("This field must be checked")
                        .actual(value.clone()),
                )
            })
        })
    }

    pub fn email() -> ValidatorFn {
        ValidatorFn::new(|value, _| {
            if is_empty(value) {
                return None;
            }
            let ok = value.as_str().is_some_and(|s| EMAIL.is_match(s));
            (!ok).then(|| {
                validate_errors(
                    "email",
                    ValidateError::new()
                        .message("Please enter a valid email address")
                        .actual(value.clone()),
                )
            })
        })
    }

    /// Numeric lower bound, inclusive. Non-numbers pass.
    pub fn min(min: f64) -> ValidatorFn {
        ValidatorFn::new(move |value, _| {
            let actual = value.as_f64()?;
            (actual < min).then(|| {
                validate_errors(
                    "min",
                    ValidateError::new()
                        .message(format!("Please enter a value no less than {min}"))
                        .detail("min", min)
                        .actual(value.clone()),
                )
            })
        })
    }

    /// Numeric upper bound, inclusive. Non-numbers pass.
    pub fn max(max: f64) -> ValidatorFn {
        ValidatorFn::new(move |value, _| {
            let actual = value.as_f64()?;
            (actual > max).then(|| {
                validate_errors(
                    "max",
                    ValidateError::new()
                        .message(format!("Please enter a value no greater than {max}"))
                        .detail("max", max)
                        .actual(value.clone()),
                )
            })
        })
    }

    pub fn min_length(min_length: usize) -> ValidatorFn {
        ValidatorFn::new(move |value, _| {
            if is_empty(value) {
                return None;
            }
            let actual = length_of(value)?;
            (actual < min_length).then(|| {
                validate_errors(
                    "minLength",
                    ValidateError::new()
                        .message(format!("Please enter at least {min_length} characters"))
                        .detail("minLength", min_length)
                        .actual(actual),
                )
            })
        })
    }

    pub fn max_length(max_length: usize) -> ValidatorFn {
        ValidatorFn::new(move |value, _| {
            if is_empty(value) {
                return None;
            }
            let actual = length_of(value)?;
            (actual > max_length).then(|| {
                validate_errors(
                    "maxLength",
                    ValidateError::new()
                        .message(format!("Please enter at most {max_length} characters"))
                        .detail("maxLength", max_length)
                        .actual(actual),
                )
            })
        })
    }

    pub fn range_length(min_length: usize, max_length: usize) -> ValidatorFn {
        ValidatorFn::new(move |value, _| {
            if is_empty(value) {
                return None;
            }
            let actual = length_of(value)?;
            (actual < min_length || actual > max_length).then(|| {
                validate_errors(
                    "rangeLength",
                    ValidateError::new()
                        .message(format!(
                            "Please enter between {min_length} and {max_length} characters"
                        ))
                        .detail("minLength", min_length)
                        .detail("maxLength", max_length)
                        .actual(actual),
                )
            })
        })
    }

    /// Full-match a regular expression against the value's string form.
    /// Numbers are matched on their decimal rendering.
    pub fn pattern(pattern: &str) -> Result<ValidatorFn> {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored)
            .map_err(|e| Error::Config(format!("bad validator pattern {pattern:?}: {e}")))?;
        Ok(Self::pattern_regex(regex))
    }

    /// Like [`Validators::pattern`] but with a caller-compiled regex, used as is.
    pub fn pattern_regex(regex: Regex) -> ValidatorFn {
        ValidatorFn::new(move |value, _| {
            if is_empty(value) {
                return None;
            }
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            (!regex.is_match(&text)).then(|| {
                validate_errors(
                    "pattern",
                    ValidateError::new()
                        .message("Please enter a value in the expected format")
                        .detail("pattern", regex.as_str())
                        .actual(value.clone()),
                )
            })
        })
    }
}
