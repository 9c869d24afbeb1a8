//! Leaf control holding a single value.

use serde_json::Value;
use std::ops::Deref;

use super::{AbstractControl, ControlOptions, Controls};

/// A leaf control. `reset()` returns it to the value it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormControl(pub(crate) AbstractControl);

impl FormControl {
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with_options(value, ControlOptions::default())
    }

    pub fn with_options(value: impl Into<Value>, options: impl Into<ControlOptions>) -> Self {
        Self(AbstractControl::build(
            Controls::Single,
            options.into(),
            Some(value.into()),
        ))
    }

    pub fn control(&self) -> AbstractControl {
        self.0.clone()
    }
}

impl Deref for FormControl {
    type Target = AbstractControl;

    fn deref(&self) -> &AbstractControl {
        &self.0
    }
}

impl From<FormControl> for AbstractControl {
    fn from(control: FormControl) -> Self {
        control.0
    }
}
