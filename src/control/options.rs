//! Construction options for controls.

use std::sync::Arc;

use super::AbstractControl;
use crate::config::Config;
use crate::model::Trigger;
use crate::validators::{AsyncValidatorFn, ValidatorFn, ValidatorInput};

/// Predicate deciding whether a control is disabled. The flag is `true` for
/// the single evaluation made while the control is being constructed.
pub type DisabledFn = Arc<dyn Fn(&AbstractControl, bool) -> bool + Send + Sync>;

/// Initial disabled state of a control.
#[derive(Clone, Default)]
pub enum Disabled {
    #[default]
    No,
    Yes,
    /// Evaluated once at construction, then again whenever the value of the
    /// control's tree changes or the control joins another tree.
    When(DisabledFn),
}

impl std::fmt::Debug for Disabled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disabled::No => write!(f, "No"),
            Disabled::Yes => write!(f, "Yes"),
            Disabled::When(_) => write!(f, "When(..)"),
        }
    }
}

/// Everything a control can be configured with besides its value or
/// children. A bare validator or validator list converts into options that
/// carry only those validators.
#[derive(Debug, Clone, Default)]
pub struct ControlOptions {
    pub(crate) name: Option<String>,
    pub(crate) example: Option<String>,
    pub(crate) trigger: Option<Trigger>,
    pub(crate) validators: Vec<ValidatorFn>,
    pub(crate) async_validators: Vec<AsyncValidatorFn>,
    pub(crate) disabled: Disabled,
}

impl ControlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options declaring the configured default trigger, for root controls.
    pub fn from_config(config: &Config) -> Self {
        Self::new().trigger(config.default_trigger)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn validators(mut self, validators: impl Into<ValidatorInput<ValidatorFn>>) -> Self {
        self.validators = validators.into().into_vec();
        self
    }

    pub fn async_validators(
        mut self,
        validators: impl Into<ValidatorInput<AsyncValidatorFn>>,
    ) -> Self {
        self.async_validators = validators.into().into_vec();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = if disabled { Disabled::Yes } else { Disabled::No };
        self
    }

    pub fn disabled_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AbstractControl, bool) -> bool + Send + Sync + 'static,
    {
        self.disabled = Disabled::When(Arc::new(predicate));
        self
    }
}

impl From<ValidatorFn> for ControlOptions {
    fn from(validator: ValidatorFn) -> Self {
        Self::new().validators(validator)
    }
}

impl From<Vec<ValidatorFn>> for ControlOptions {
    fn from(validators: Vec<ValidatorFn>) -> Self {
        Self::new().validators(validators)
    }
}

impl From<ValidatorInput<ValidatorFn>> for ControlOptions {
    fn from(validators: ValidatorInput<ValidatorFn>) -> Self {
        Self::new().validators(validators)
    }
}

impl From<AsyncValidatorFn> for ControlOptions {
    fn from(validator: AsyncValidatorFn) -> Self {
        Self::new().async_validators(validator)
    }
}
