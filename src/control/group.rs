//! Composite control with named children.

use std::ops::Deref;
use tracing::debug;

use super::{AbstractControl, ControlOptions, Controls};
use crate::model::PathSegment;

/// A composite whose value is an object keyed by child name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormGroup(pub(crate) AbstractControl);

impl FormGroup {
    /// Build a group. A repeated name replaces the earlier child.
    pub fn new<K: Into<String>>(controls: impl IntoIterator<Item = (K, AbstractControl)>) -> Self {
        Self::with_options(controls, ControlOptions::default())
    }

    pub fn with_options<K: Into<String>>(
        controls: impl IntoIterator<Item = (K, AbstractControl)>,
        options: impl Into<ControlOptions>,
    ) -> Self {
        let mut entries: Vec<(String, AbstractControl)> = Vec::new();
        for (name, control) in controls {
            let name = name.into();
            match entries.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = control,
                None => entries.push((name, control)),
            }
        }
        Self(AbstractControl::build(
            Controls::Group(entries),
            options.into(),
            None,
        ))
    }

    pub fn control(&self) -> AbstractControl {
        self.0.clone()
    }

    /// The direct child called `name`.
    pub fn child(&self, name: &str) -> Option<AbstractControl> {
        self.0.find(&PathSegment::Key(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        match self.0.controls() {
            Controls::Group(entries) => entries.into_iter().map(|(name, _)| name).collect(),
            _ => Vec::new(),
        }
    }

    /// Adopt `control` under `name` unless that name is taken. Returns
    /// whether it was added.
    pub fn add_control(&self, name: impl Into<String>, control: impl Into<AbstractControl>) -> bool {
        let name = name.into();
        let control = control.into();
        let added = self.0.mutate_controls(|controls| {
            let Controls::Group(entries) = controls else {
                return false;
            };
            if entries.iter().any(|(existing, _)| *existing == name) {
                return false;
            }
            control.set_parent(&self.0);
            entries.push((name.clone(), control.clone()));
            true
        });
        if added {
            debug!(group = %self.uid(), child = %control.uid(), name = %name, "control added");
        }
        added
    }

    /// Adopt `control` under `name`, replacing and detaching any previous
    /// child of that name. Returns the replaced child.
    pub fn set_control(
        &self,
        name: impl Into<String>,
        control: impl Into<AbstractControl>,
    ) -> Option<AbstractControl> {
        let name = name.into();
        let control = control.into();
        let replaced = self.0.mutate_controls(|controls| {
            let Controls::Group(entries) = controls else {
                return None;
            };
            control.set_parent(&self.0);
            match entries.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => Some(std::mem::replace(&mut slot.1, control.clone())),
                None => {
                    entries.push((name.clone(), control.clone()));
                    None
                }
            }
        });
        if let Some(previous) = replaced.as_ref().filter(|p| **p != control) {
            previous.detach_from(&self.0);
        }
        debug!(group = %self.uid(), child = %control.uid(), name = %name, "control set");
        replaced
    }

    /// Detach and return the child called `name`.
    pub fn remove_control(&self, name: &str) -> Option<AbstractControl> {
        let removed = self.0.mutate_controls(|controls| {
            let Controls::Group(entries) = controls else {
                return None;
            };
            let index = entries.iter().position(|(existing, _)| existing == name)?;
            Some(entries.remove(index).1)
        });
        if let Some(control) = &removed {
            control.detach_from(&self.0);
            debug!(group = %self.uid(), child = %control.uid(), name = %name, "control removed");
        }
        removed
    }
}

impl Deref for FormGroup {
    type Target = AbstractControl;

    fn deref(&self) -> &AbstractControl {
        &self.0
    }
}

impl From<FormGroup> for AbstractControl {
    fn from(group: FormGroup) -> Self {
        group.0
    }
}
