//! Validator functions, composition and identity-based set operations.
//!
//! A validator is a shared function value. Identity is the allocation, not
//! the code: two `ValidatorFn::new` calls with the same closure body are
//! distinct validators, and only a clone of the first handle is "the
//! same" validator for [`has_validator`] and [`remove_validators`].

mod builtin;

pub use builtin::Validators;

use futures::future::{BoxFuture, FutureExt, join_all};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::control::AbstractControl;
use crate::error::{Error, Result};
use crate::model::ValidateErrors;

// ---------------------------------------------------------------------------
// Function types
// ---------------------------------------------------------------------------

type SyncValidate = dyn Fn(&Value, &AbstractControl) -> Option<ValidateErrors> + Send + Sync;

/// Future returned by an async validator. `Err` is a validator fault, not a
/// validation failure.
pub type ValidationFuture = BoxFuture<'static, Result<Option<ValidateErrors>>>;

type AsyncValidate = dyn Fn(Value, AbstractControl) -> ValidationFuture + Send + Sync;

/// A synchronous validator.
#[derive(Clone)]
pub struct ValidatorFn(Arc<SyncValidate>);

impl ValidatorFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &AbstractControl) -> Option<ValidateErrors> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn validate(&self, value: &Value, control: &AbstractControl) -> Option<ValidateErrors> {
        (self.0)(value, control)
    }
}

impl std::fmt::Debug for ValidatorFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValidatorFn({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// An asynchronous validator.
#[derive(Clone)]
pub struct AsyncValidatorFn(Arc<AsyncValidate>);

impl AsyncValidatorFn {
    /// Wrap a fallible async validator. An `Err` result is reported as a
    /// validator fault.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, AbstractControl) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ValidateErrors>>> + Send + 'static,
    {
        Self(Arc::new(
            move |value: Value, control: AbstractControl| -> ValidationFuture {
                f(value, control).boxed()
            },
        ))
    }

    /// Wrap an async validator that cannot fault.
    pub fn infallible<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, AbstractControl) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<ValidateErrors>> + Send + 'static,
    {
        Self::new(move |value, control| f(value, control).map(Ok))
    }

    pub fn validate(&self, value: Value, control: AbstractControl) -> ValidationFuture {
        (self.0)(value, control)
    }
}

impl std::fmt::Debug for AsyncValidatorFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AsyncValidatorFn({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// Reference identity between validator handles.
pub trait ValidatorIdentity: Clone {
    fn same(&self, other: &Self) -> bool;
}

impl ValidatorIdentity for ValidatorFn {
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl ValidatorIdentity for AsyncValidatorFn {
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ---------------------------------------------------------------------------
// One validator or a list
// ---------------------------------------------------------------------------

/// A single validator or an ordered list, as accepted at API boundaries.
#[derive(Debug, Clone)]
pub enum ValidatorInput<V> {
    One(V),
    Many(Vec<V>),
}

impl<V> ValidatorInput<V> {
    pub fn into_vec(self) -> Vec<V> {
        match self {
            ValidatorInput::One(v) => vec![v],
            ValidatorInput::Many(list) => list,
        }
    }
}

impl From<ValidatorFn> for ValidatorInput<ValidatorFn> {
    fn from(v: ValidatorFn) -> Self {
        ValidatorInput::One(v)
    }
}

impl From<AsyncValidatorFn> for ValidatorInput<AsyncValidatorFn> {
    fn from(v: AsyncValidatorFn) -> Self {
        ValidatorInput::One(v)
    }
}

impl<V> From<Vec<V>> for ValidatorInput<V> {
    fn from(list: Vec<V>) -> Self {
        ValidatorInput::Many(list)
    }
}

impl<V: Clone> From<&[V]> for ValidatorInput<V> {
    fn from(list: &[V]) -> Self {
        ValidatorInput::Many(list.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Merge the errors of every validator into one mapping. Later validators
/// overwrite earlier ones for the same code. `None` input, an empty list, or
/// a run where nothing reports errors all yield `None`.
pub fn compose(validators: Option<&[ValidatorFn]>) -> Option<ValidatorFn> {
    let validators = validators?;
    match validators {
        [] => None,
        [single] => Some(single.clone()),
        _ => {
            let list = validators.to_vec();
            Some(ValidatorFn::new(move |value, control| {
                merge_errors(list.iter().map(|v| v.validate(value, control)))
            }))
        }
    }
}

/// Run every async validator concurrently and merge their results once all
/// have settled. Faulting validators turn the whole run into
/// [`Error::ValidatorRejected`].
pub fn compose_async(validators: Option<&[AsyncValidatorFn]>) -> Option<AsyncValidatorFn> {
    let validators = validators?;
    match validators {
        [] => None,
        [single] => Some(single.clone()),
        _ => {
            let list = validators.to_vec();
            Some(AsyncValidatorFn::new(move |value, control| {
                let pending: Vec<_> = list
                    .iter()
                    .map(|v| v.validate(value.clone(), control.clone()))
                    .collect();
                async move {
                    let settled = join_all(pending).await;
                    let mut faults = Vec::new();
                    let mut results = Vec::with_capacity(settled.len());
                    for outcome in settled {
                        match outcome {
                            Ok(errors) => results.push(errors),
                            Err(e) => faults.push(e.to_string()),
                        }
                    }
                    if !faults.is_empty() {
                        return Err(Error::ValidatorRejected {
                            failed: faults.len(),
                            message: faults.join("; "),
                        });
                    }
                    Ok(merge_errors(results))
                }
            }))
        }
    }
}

fn merge_errors(results: impl IntoIterator<Item = Option<ValidateErrors>>) -> Option<ValidateErrors> {
    let merged = results
        .into_iter()
        .flatten()
        .fold(ValidateErrors::new(), |mut acc, errors| {
            acc.extend(errors);
            acc
        });
    (!merged.is_empty()).then_some(merged)
}

// ---------------------------------------------------------------------------
// Identity set operations
// ---------------------------------------------------------------------------

/// Append validators not already present (by identity).
pub fn add_validators<V: ValidatorIdentity>(
    new_validators: impl Into<ValidatorInput<V>>,
    existing: &[V],
) -> Vec<V> {
    let mut current = existing.to_vec();
    for v in new_validators.into().into_vec() {
        if !has_validator(&current, &v) {
            current.push(v);
        }
    }
    current
}

/// Drop every validator identical to one of `to_remove`. Unknown validators
/// are ignored.
pub fn remove_validators<V: ValidatorIdentity>(
    to_remove: impl Into<ValidatorInput<V>>,
    existing: &[V],
) -> Vec<V> {
    let to_remove = to_remove.into().into_vec();
    existing
        .iter()
        .filter(|v| !has_validator(&to_remove, v))
        .cloned()
        .collect()
}

/// Is exactly this validator (not an equivalent one) present?
pub fn has_validator<V: ValidatorIdentity>(existing: &[V], target: &V) -> bool {
    existing.iter().any(|v| v.same(target))
}

// ---------------------------------------------------------------------------
// Canonical stored form
// ---------------------------------------------------------------------------

/// Ordered validator list plus its pre-composed function.
#[derive(Debug, Clone, Default)]
pub(crate) struct ValidatorSet<V> {
    list: Vec<V>,
    composed: Option<V>,
}

impl ValidatorSet<ValidatorFn> {
    pub(crate) fn sync(list: Vec<ValidatorFn>) -> Self {
        let composed = compose(Some(list.as_slice()));
        Self { list, composed }
    }
}

impl ValidatorSet<AsyncValidatorFn> {
    pub(crate) fn asynchronous(list: Vec<AsyncValidatorFn>) -> Self {
        let composed = compose_async(Some(list.as_slice()));
        Self { list, composed }
    }
}

impl<V: Clone> ValidatorSet<V> {
    pub(crate) fn list(&self) -> &[V] {
        &self.list
    }

    pub(crate) fn composed(&self) -> Option<V> {
        self.composed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::FormControl;
    use crate::model::{ValidateError, validate_errors};

    fn code(name: &'static str, detail: i64) -> ValidatorFn {
        ValidatorFn::new(move |_, _| {
            Some(validate_errors(name, ValidateError::new().detail("n", detail)))
        })
    }

    #[test]
    fn compose_none_and_empty_yield_none() {
        assert!(compose(None).is_none());
        assert!(compose(Some(&[][..])).is_none());
    }

    #[test]
    fn compose_merges_later_over_earlier() {
        let control = FormControl::new("x");
        let composed = compose(Some(&[code("a", 1), code("b", 2), code("a", 3)][..])).unwrap();
        let errors = composed.validate(&control.value(), &control).unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["a"].details["n"], 3);
        assert_eq!(errors["b"].details["n"], 2);
    }

    #[test]
    fn compose_reports_none_when_all_pass() {
        let control = FormControl::new("x");
        let pass = ValidatorFn::new(|_, _| None);
        let composed = compose(Some(&[pass.clone(), pass][..])).unwrap();
        assert!(composed.validate(&control.value(), &control).is_none());
    }

    #[test]
    fn identity_not_structure_decides_membership() {
        let a = ValidatorFn::new(|_, _| None);
        let twin = ValidatorFn::new(|_, _| None);
        let list = add_validators(a.clone(), &[]);
        assert!(has_validator(&list, &a));
        assert!(!has_validator(&list, &twin));

        let list = add_validators(a.clone(), &list);
        assert_eq!(list.len(), 1);

        let list = remove_validators(twin, &list);
        assert!(has_validator(&list, &a));
        let list = remove_validators(a.clone(), &list);
        assert!(!has_validator(&list, &a));
    }

    #[tokio::test]
    async fn compose_async_surfaces_faults() {
        let control = FormControl::new("x");
        let ok = AsyncValidatorFn::infallible(|_, _| async { None });
        let bad = AsyncValidatorFn::new(|_, _| async { Err(Error::rejected("backend down")) });
        let composed = compose_async(Some(&[ok, bad][..])).unwrap();
        let err = composed
            .validate(control.value(), (*control).clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidatorRejected { failed: 1, .. }));
    }
}
