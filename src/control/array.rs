//! Composite control with an ordered, resizable list of children.

use std::ops::Deref;
use tracing::debug;

use super::{AbstractControl, ControlOptions, Controls};
use crate::model::PathSegment;

/// A composite whose value is an array in child order. Indices are
/// positional, so removing or inserting renumbers every later child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormArray(pub(crate) AbstractControl);

impl FormArray {
    pub fn new(controls: impl IntoIterator<Item = AbstractControl>) -> Self {
        Self::with_options(controls, ControlOptions::default())
    }

    pub fn with_options(
        controls: impl IntoIterator<Item = AbstractControl>,
        options: impl Into<ControlOptions>,
    ) -> Self {
        Self(AbstractControl::build(
            Controls::Array(controls.into_iter().collect()),
            options.into(),
            None,
        ))
    }

    pub fn control(&self) -> AbstractControl {
        self.0.clone()
    }

    pub fn at(&self, index: usize) -> Option<AbstractControl> {
        self.0.find(&PathSegment::Index(index))
    }

    pub fn len(&self) -> usize {
        self.0.controls().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, control: impl Into<AbstractControl>) {
        let control = control.into();
        let len = self.len();
        self.insert(len, control);
    }

    /// Insert at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, control: impl Into<AbstractControl>) {
        let control = control.into();
        let at = self.0.mutate_controls(|controls| {
            let Controls::Array(items) = controls else {
                return None;
            };
            let at = index.min(items.len());
            control.set_parent(&self.0);
            items.insert(at, control.clone());
            Some(at)
        });
        if let Some(at) = at {
            debug!(array = %self.uid(), child = %control.uid(), index = at, "control inserted");
        }
    }

    /// Detach and return the child at `index`.
    pub fn remove_at(&self, index: usize) -> Option<AbstractControl> {
        let removed = self.0.mutate_controls(|controls| {
            let Controls::Array(items) = controls else {
                return None;
            };
            (index < items.len()).then(|| items.remove(index))
        });
        if let Some(control) = &removed {
            control.detach_from(&self.0);
            debug!(array = %self.uid(), child = %control.uid(), index, "control removed");
        }
        removed
    }

    /// Replace the child at `index` (appending if `index` is past the end).
    /// Returns the replaced child.
    pub fn set_control(
        &self,
        index: usize,
        control: impl Into<AbstractControl>,
    ) -> Option<AbstractControl> {
        let control = control.into();
        let replaced = self.0.mutate_controls(|controls| {
            let Controls::Array(items) = controls else {
                return None;
            };
            control.set_parent(&self.0);
            match items.get_mut(index) {
                Some(slot) => Some(std::mem::replace(slot, control.clone())),
                None => {
                    items.push(control.clone());
                    None
                }
            }
        });
        if let Some(previous) = replaced.as_ref().filter(|p| **p != control) {
            previous.detach_from(&self.0);
        }
        replaced
    }

    /// Detach every child.
    pub fn clear(&self) {
        let removed = self
            .0
            .mutate_controls(|controls| match controls {
                Controls::Array(items) => std::mem::take(items),
                _ => Vec::new(),
            });
        for control in &removed {
            control.detach_from(&self.0);
        }
        debug!(array = %self.uid(), removed = removed.len(), "array cleared");
    }
}

impl Deref for FormArray {
    type Target = AbstractControl;

    fn deref(&self) -> &AbstractControl {
        &self.0
    }
}

impl From<FormArray> for AbstractControl {
    fn from(array: FormArray) -> Self {
        array.0
    }
}
