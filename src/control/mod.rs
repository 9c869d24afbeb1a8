//! The control tree.
//!
//! An [`AbstractControl`] is a cheap, clonable handle to one node of a form:
//! a single value ([`FormControl`]), a fixed set of named children
//! ([`FormGroup`]) or an ordered list of children ([`FormArray`]).
//!
//! Ownership flows top-down: a composite holds strong handles to its
//! children, children hold a weak back-reference to the composite that
//! adopted them. State flows bottom-up: whenever a child's value or
//! effective status changes, its parent recomputes its own value and status
//! and, if anything changed, tells its parent in turn.
//!
//! # Locking
//!
//! Each control guards its state with short-lived mutexes. No lock is held
//! while validators, predicates or watch callbacks run, so those may freely
//! read (and mutate) any control in the tree.
//!
//! # Initial async validation
//!
//! A control whose sync validators (and children) pass at construction fires
//! its async validators once, in the background. Until that settles its
//! status is [`ValidateStatus::Validating`]; reading status or calling
//! `validate()` in between observes that state. This is expected behavior.

mod array;
mod group;
mod options;
mod single;

pub use array::FormArray;
pub use group::FormGroup;
pub use options::{ControlOptions, Disabled, DisabledFn};
pub use single::FormControl;

use futures::future::{BoxFuture, FutureExt, join_all, select_all};
use opentelemetry::KeyValue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, trace, warn};

use crate::error::Result;
use crate::model::{
    ControlId, ControlPath, PathSegment, SetValueOptions, Trigger, ValidateError,
    ValidateErrors, ValidateStatus, ValueOptions,
};
use crate::reactive::{Observable, WatchHandle, WatchOptions};
use crate::telemetry::metrics;
use crate::telemetry::validation::{record_validation_outcome, start_validation_span};
use crate::validators::{
    AsyncValidatorFn, ValidationFuture, ValidatorFn, ValidatorSet, ValidatorInput,
    add_validators, has_validator, remove_validators,
};

// ---------------------------------------------------------------------------
// Kinds and children
// ---------------------------------------------------------------------------

/// Which variant a control is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Single,
    Group,
    Array,
}

impl ControlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlKind::Single => "single",
            ControlKind::Group => "group",
            ControlKind::Array => "array",
        }
    }
}

/// The children of a control.
#[derive(Debug, Clone)]
pub enum Controls {
    Single,
    /// Named children in declaration order.
    Group(Vec<(String, AbstractControl)>),
    Array(Vec<AbstractControl>),
}

impl Controls {
    pub fn kind(&self) -> ControlKind {
        match self {
            Controls::Single => ControlKind::Single,
            Controls::Group(_) => ControlKind::Group,
            Controls::Array(_) => ControlKind::Array,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Controls::Single => 0,
            Controls::Group(entries) => entries.len(),
            Controls::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &AbstractControl> + '_> {
        match self {
            Controls::Single => Box::new(std::iter::empty()),
            Controls::Group(entries) => Box::new(entries.iter().map(|(_, c)| c)),
            Controls::Array(items) => Box::new(items.iter()),
        }
    }

    fn find(&self, segment: &PathSegment) -> Option<AbstractControl> {
        match self {
            Controls::Single => None,
            Controls::Group(entries) => {
                let key = segment.as_key();
                entries
                    .iter()
                    .find(|(name, _)| name.as_str() == key)
                    .map(|(_, c)| c.clone())
            }
            Controls::Array(items) => segment.as_index().and_then(|i| items.get(i).cloned()),
        }
    }

    fn aggregate(&self, options: ValueOptions) -> Option<Value> {
        let include = |c: &AbstractControl| !(options.skip_disabled && c.disabled());
        match self {
            Controls::Single => None,
            Controls::Group(entries) => {
                let map: Map<String, Value> = entries
                    .iter()
                    .filter(|(_, c)| include(c))
                    .map(|(name, c)| (name.clone(), c.get_value(options)))
                    .collect();
                Some(Value::Object(map))
            }
            Controls::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .filter(|c| include(c))
                    .map(|c| c.get_value(options))
                    .collect(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct ControlState {
    parent: Option<Weak<ControlInner>>,
    /// Status from this control's own validators only.
    own_status: ValidateStatus,
    /// Interaction flags of a leaf. Composites derive theirs from children.
    blurred: bool,
    dirty: bool,
    /// While positive, child notifications are deferred to the end of a
    /// bulk operation.
    batch_depth: usize,
    validators: ValidatorSet<ValidatorFn>,
    async_validators: ValidatorSet<AsyncValidatorFn>,
    disabled_fn: Option<DisabledFn>,
}

struct ControlInner {
    uid: ControlId,
    kind: ControlKind,
    name: Option<String>,
    example: Option<String>,
    trigger: Option<Trigger>,
    /// Value a single control returns to on `reset()`.
    init_value: Value,
    controls: Mutex<Controls>,
    state: Mutex<ControlState>,
    /// Held across each read-compute-write of the derived value, status and
    /// flags, so concurrent child notifications cannot publish a stale
    /// snapshot last. Never held while validators or callbacks run.
    recompute: Mutex<()>,
    /// Bumped by every validation run, `disable()` and `set_errors()`. Async
    /// results carrying an older generation are discarded.
    generation: AtomicU64,
    value: Observable<Value>,
    status: Observable<ValidateStatus>,
    errors: Observable<Option<ValidateErrors>>,
    blurred: Observable<bool>,
    dirty: Observable<bool>,
    disabled: Observable<bool>,
    /// Bumped whenever the parent link changes.
    parent_epoch: Observable<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of the synchronous half of a validation run.
enum Pass {
    Settled(u64, Option<ValidateErrors>),
    Pending(u64, ValidationFuture),
}

// ---------------------------------------------------------------------------
// AbstractControl
// ---------------------------------------------------------------------------

/// Handle to a node of the control tree. Cloning is cheap and yields a handle
/// to the same control.
#[derive(Clone)]
pub struct AbstractControl {
    inner: Arc<ControlInner>,
}

impl std::fmt::Debug for AbstractControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbstractControl")
            .field("uid", &self.inner.uid)
            .field("kind", &self.inner.kind)
            .field("status", &self.status())
            .field("value", &self.value())
            .finish()
    }
}

impl PartialEq for AbstractControl {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for AbstractControl {}

impl AbstractControl {
    pub(crate) fn build(
        controls: Controls,
        options: ControlOptions,
        init_value: Option<Value>,
    ) -> Self {
        let kind = controls.kind();
        let ControlOptions {
            name,
            example,
            trigger,
            validators,
            async_validators,
            disabled,
        } = options;

        let value = init_value
            .or_else(|| controls.aggregate(ValueOptions::default()))
            .unwrap_or(Value::Null);

        let control = Self {
            inner: Arc::new(ControlInner {
                uid: ControlId::next(),
                kind,
                name,
                example,
                trigger,
                init_value: value.clone(),
                controls: Mutex::new(controls),
                state: Mutex::new(ControlState {
                    parent: None,
                    own_status: ValidateStatus::Valid,
                    blurred: false,
                    dirty: false,
                    batch_depth: 0,
                    validators: ValidatorSet::sync(validators),
                    async_validators: ValidatorSet::asynchronous(async_validators),
                    disabled_fn: None,
                }),
                recompute: Mutex::new(()),
                generation: AtomicU64::new(0),
                value: Observable::new(value),
                status: Observable::new(ValidateStatus::Valid),
                errors: Observable::new(None),
                blurred: Observable::new(false),
                dirty: Observable::new(false),
                disabled: Observable::new(false),
                parent_epoch: Observable::new(0),
            }),
        };

        let children = control.child_list();
        for child in &children {
            child.set_parent(&control);
        }
        debug!(
            uid = %control.uid(),
            kind = kind.as_str(),
            children = children.len(),
            "control created"
        );

        let initially_disabled = match &disabled {
            Disabled::No => false,
            Disabled::Yes => true,
            Disabled::When(predicate) => predicate(&control, true),
        };
        let watches_predicate = matches!(disabled, Disabled::When(_));
        if let Disabled::When(predicate) = disabled {
            control.state().disabled_fn = Some(predicate);
        }
        if initially_disabled {
            control.inner.disabled.set(true);
            for child in &children {
                child.disable();
            }
        }

        control.init_errors_and_status();
        if watches_predicate {
            control.watch_disabled_predicate();
        }
        control
    }

    fn state(&self) -> MutexGuard<'_, ControlState> {
        lock(&self.inner.state)
    }

    fn child_list(&self) -> Vec<AbstractControl> {
        lock(&self.inner.controls).iter().cloned().collect()
    }

    // -- identity and structure ---------------------------------------------

    pub fn uid(&self) -> ControlId {
        self.inner.uid
    }

    pub fn kind(&self) -> ControlKind {
        self.inner.kind
    }

    pub fn is_composite(&self) -> bool {
        self.inner.kind != ControlKind::Single
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn example(&self) -> Option<&str> {
        self.inner.example.as_deref()
    }

    /// Snapshot of the children.
    pub fn controls(&self) -> Controls {
        lock(&self.inner.controls).clone()
    }

    pub fn parent(&self) -> Option<AbstractControl> {
        let parent = self.state().parent.clone();
        parent
            .and_then(|weak| weak.upgrade())
            .map(|inner| AbstractControl { inner })
    }

    /// The top-level ancestor, or this control if it has no parent.
    pub fn root(&self) -> AbstractControl {
        let mut root = self.clone();
        while let Some(parent) = root.parent() {
            root = parent;
        }
        root
    }

    /// The trigger declared on this control or its nearest declaring
    /// ancestor; `change` if none declares one.
    pub fn trigger(&self) -> Trigger {
        self.inner
            .trigger
            .or_else(|| self.parent().map(|p| p.trigger()))
            .unwrap_or_default()
    }

    /// Structural operation: only the composite adopting this control calls
    /// it.
    pub(crate) fn set_parent(&self, parent: &AbstractControl) {
        let link = Arc::downgrade(&parent.inner);
        let previous = self.state().parent.replace(link.clone());
        match previous {
            Some(p) if Weak::ptr_eq(&p, &link) => return,
            Some(_) => debug!(uid = %self.uid(), parent = %parent.uid(), "control re-parented"),
            None => {}
        }
        self.inner.parent_epoch.modify(|epoch| *epoch += 1);
    }

    /// Structural operation: drop the back-reference if it points at
    /// `parent`.
    pub(crate) fn detach_from(&self, parent: &AbstractControl) {
        let mut state = self.state();
        let owned_by_parent = state
            .parent
            .as_ref()
            .is_some_and(|p| p.as_ptr() == Arc::as_ptr(&parent.inner));
        if owned_by_parent {
            state.parent = None;
            drop(state);
            self.inner.parent_epoch.modify(|epoch| *epoch += 1);
        }
    }

    /// Mutate the children of this composite, then recompute and propagate.
    pub(crate) fn mutate_controls<R>(&self, f: impl FnOnce(&mut Controls) -> R) -> R {
        let result = f(&mut lock(&self.inner.controls));
        self.on_children_changed();
        result
    }

    /// Look up a descendant by path. Empty paths and unresolvable segments
    /// yield `None`.
    pub fn get(&self, path: impl Into<ControlPath>) -> Option<AbstractControl> {
        let path = path.into();
        if path.is_empty() {
            return None;
        }
        path.segments()
            .iter()
            .try_fold(self.clone(), |control, segment| control.find(segment))
    }

    fn find(&self, segment: &PathSegment) -> Option<AbstractControl> {
        lock(&self.inner.controls).find(segment)
    }

    pub fn as_group(&self) -> Option<FormGroup> {
        (self.kind() == ControlKind::Group).then(|| FormGroup(self.clone()))
    }

    pub fn as_array(&self) -> Option<FormArray> {
        (self.kind() == ControlKind::Array).then(|| FormArray(self.clone()))
    }

    // -- values -------------------------------------------------------------

    /// The current aggregate value, disabled descendants included.
    pub fn value(&self) -> Value {
        self.inner.value.get()
    }

    pub fn get_value(&self, options: ValueOptions) -> Value {
        if options.skip_disabled && self.is_composite() {
            let aggregated = lock(&self.inner.controls).aggregate(options);
            if let Some(value) = aggregated {
                return value;
            }
        }
        self.value()
    }

    /// Deserialize the current value.
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.value())?)
    }

    /// Write a value. A single control stores it; a group hands each object
    /// key to the matching child; an array hands each element to the child at
    /// the same index. Keys and indices without a child are ignored.
    pub fn set_value(&self, value: impl Into<Value>, options: SetValueOptions) {
        let value = value.into();
        match self.kind() {
            ControlKind::Single => {
                self.write_leaf_value(value);
                if options.dirty {
                    self.mark_as_dirty();
                }
                if options.blur {
                    self.mark_as_blurred();
                }
            }
            ControlKind::Group => {
                let Value::Object(entries) = value else {
                    warn!(uid = %self.uid(), "group value must be an object, ignoring");
                    return;
                };
                self.batch(|| {
                    for (key, item) in entries {
                        if let Some(child) = self.find(&PathSegment::Key(key)) {
                            child.set_value(item, options);
                        }
                    }
                });
            }
            ControlKind::Array => {
                let Value::Array(items) = value else {
                    warn!(uid = %self.uid(), "array value must be an array, ignoring");
                    return;
                };
                self.batch(|| {
                    for (index, item) in items.into_iter().enumerate() {
                        if let Some(child) = self.find(&PathSegment::Index(index)) {
                            child.set_value(item, options);
                        }
                    }
                });
            }
        }
    }

    /// Serialize `value` and write it with [`AbstractControl::set_value`].
    pub fn set_value_from<T: Serialize>(&self, value: &T, options: SetValueOptions) -> Result<()> {
        self.set_value(serde_json::to_value(value)?, options);
        Ok(())
    }

    fn write_leaf_value(&self, value: Value) {
        if !self.inner.value.set(value) {
            return;
        }
        trace!(uid = %self.uid(), "value changed");
        if self.trigger() == Trigger::Change {
            self.trigger_validation();
        }
        self.bubble();
    }

    // -- status and flags ---------------------------------------------------

    pub fn status(&self) -> ValidateStatus {
        self.inner.status.get()
    }

    pub fn errors(&self) -> Option<ValidateErrors> {
        self.inner.errors.get()
    }

    pub fn valid(&self) -> bool {
        self.status() == ValidateStatus::Valid
    }

    pub fn invalid(&self) -> bool {
        self.status() == ValidateStatus::Invalid
    }

    pub fn validating(&self) -> bool {
        self.status() == ValidateStatus::Validating
    }

    pub fn disabled(&self) -> bool {
        self.inner.disabled.get()
    }

    pub fn enabled(&self) -> bool {
        !self.disabled()
    }

    pub fn blurred(&self) -> bool {
        self.inner.blurred.get()
    }

    pub fn unblurred(&self) -> bool {
        !self.blurred()
    }

    pub fn dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn pristine(&self) -> bool {
        !self.dirty()
    }

    // -- commands -----------------------------------------------------------

    /// Restore initial values and clear interaction flags, recursively.
    pub fn reset(&self) {
        if self.is_composite() {
            let children = self.child_list();
            self.batch(|| children.iter().for_each(AbstractControl::reset));
            return;
        }

        let init_value = self.inner.init_value.clone();
        let unchanged = self.inner.value.with(|current| *current == init_value);
        if unchanged {
            // The validators may have changed since the last run.
            self.trigger_validation();
        } else {
            self.write_leaf_value(init_value);
        }
        self.mark_as_unblurred();
        self.mark_as_pristine();
    }

    /// Disable this control and every descendant. Clears own errors and
    /// discards any in-flight async result.
    pub fn disable(&self) {
        self.next_generation();
        self.inner.disabled.set(true);
        self.inner.errors.set(None);
        for child in self.child_list() {
            child.disable();
        }
        debug!(uid = %self.uid(), "control disabled");
        if self.refresh_state() {
            self.bubble();
        }
    }

    /// Enable this control and every descendant, then re-validate this
    /// control. Descendants re-validate through their own `enable()`.
    pub fn enable(&self) {
        self.inner.disabled.set(false);
        for child in self.child_list() {
            child.enable();
        }
        debug!(uid = %self.uid(), "control enabled");
        self.trigger_validation();
    }

    pub fn mark_as_blurred(&self) {
        if self.is_composite() {
            for child in self.child_list() {
                child.mark_as_blurred();
            }
        } else {
            self.set_leaf_flags(|state| state.blurred = true);
        }
        if self.trigger() == Trigger::Blur {
            self.trigger_validation();
        }
    }

    pub fn mark_as_unblurred(&self) {
        if self.is_composite() {
            for child in self.child_list() {
                child.mark_as_unblurred();
            }
        } else {
            self.set_leaf_flags(|state| state.blurred = false);
        }
    }

    pub fn mark_as_dirty(&self) {
        if self.is_composite() {
            for child in self.child_list() {
                child.mark_as_dirty();
            }
        } else {
            self.set_leaf_flags(|state| state.dirty = true);
        }
    }

    pub fn mark_as_pristine(&self) {
        if self.is_composite() {
            for child in self.child_list() {
                child.mark_as_pristine();
            }
        } else {
            self.set_leaf_flags(|state| state.dirty = false);
        }
    }

    fn set_leaf_flags(&self, f: impl FnOnce(&mut ControlState)) {
        f(&mut self.state());
        if self.refresh_state() {
            self.bubble();
        }
    }

    // -- validators ---------------------------------------------------------
    //
    // Mutating validators never re-validates; call `validate()` afterwards
    // for the change to take effect.

    /// Replace the sync validators. An empty list removes them all.
    pub fn set_validators(&self, validators: impl Into<ValidatorInput<ValidatorFn>>) {
        self.state().validators = ValidatorSet::sync(validators.into().into_vec());
    }

    /// Replace the async validators. An empty list removes them all.
    pub fn set_async_validators(&self, validators: impl Into<ValidatorInput<AsyncValidatorFn>>) {
        self.state().async_validators = ValidatorSet::asynchronous(validators.into().into_vec());
    }

    pub fn add_validators(&self, validators: impl Into<ValidatorInput<ValidatorFn>>) {
        let mut state = self.state();
        let list = add_validators(validators, state.validators.list());
        state.validators = ValidatorSet::sync(list);
    }

    pub fn add_async_validators(&self, validators: impl Into<ValidatorInput<AsyncValidatorFn>>) {
        let mut state = self.state();
        let list = add_validators(validators, state.async_validators.list());
        state.async_validators = ValidatorSet::asynchronous(list);
    }

    /// Remove validators by identity. Validators not present are ignored.
    pub fn remove_validators(&self, validators: impl Into<ValidatorInput<ValidatorFn>>) {
        let mut state = self.state();
        let list = remove_validators(validators, state.validators.list());
        state.validators = ValidatorSet::sync(list);
    }

    pub fn remove_async_validators(&self, validators: impl Into<ValidatorInput<AsyncValidatorFn>>) {
        let mut state = self.state();
        let list = remove_validators(validators, state.async_validators.list());
        state.async_validators = ValidatorSet::asynchronous(list);
    }

    pub fn clear_validators(&self) {
        self.set_validators(Vec::new());
    }

    pub fn clear_async_validators(&self) {
        self.set_async_validators(Vec::new());
    }

    /// Is this exact validator (same handle, not an equivalent closure)
    /// registered?
    pub fn has_validator(&self, validator: &ValidatorFn) -> bool {
        has_validator(self.state().validators.list(), validator)
    }

    pub fn has_async_validator(&self, validator: &AsyncValidatorFn) -> bool {
        has_validator(self.state().async_validators.list(), validator)
    }

    fn composed_validators(&self) -> (Option<ValidatorFn>, Option<AsyncValidatorFn>) {
        let state = self.state();
        (
            state.validators.composed(),
            state.async_validators.composed(),
        )
    }

    // -- errors -------------------------------------------------------------

    /// Overwrite this control's errors; `None` (or an empty mapping) clears
    /// them. Own status follows the errors, and any in-flight async result
    /// is discarded.
    pub fn set_errors(&self, errors: Option<ValidateErrors>) {
        self.next_generation();
        let errors = errors.filter(|e| !e.is_empty());
        let status = if errors.is_some() {
            ValidateStatus::Invalid
        } else {
            ValidateStatus::Valid
        };
        self.inner.errors.set(errors);
        self.set_own_status(status);
    }

    /// [`AbstractControl::set_errors`] on the descendant at `path`, if any.
    pub fn set_errors_at(&self, path: impl Into<ControlPath>, errors: Option<ValidateErrors>) {
        if let Some(control) = self.get(path) {
            control.set_errors(errors);
        }
    }

    pub fn clear_errors(&self) {
        self.set_errors(None);
    }

    pub fn clear_errors_at(&self, path: impl Into<ControlPath>) {
        self.set_errors_at(path, None);
    }

    pub fn get_error(&self, code: &str) -> Option<ValidateError> {
        self.inner
            .errors
            .with(|errors| errors.as_ref().and_then(|e| e.get(code).cloned()))
    }

    pub fn get_error_at(&self, code: &str, path: impl Into<ControlPath>) -> Option<ValidateError> {
        self.get(path)?.get_error(code)
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.get_error(code).is_some()
    }

    pub fn has_error_at(&self, code: &str, path: impl Into<ControlPath>) -> bool {
        self.get_error_at(code, path).is_some()
    }

    // -- observation --------------------------------------------------------

    pub fn subscribe_value(&self) -> watch::Receiver<Value> {
        self.inner.value.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ValidateStatus> {
        self.inner.status.subscribe()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<Option<ValidateErrors>> {
        self.inner.errors.subscribe()
    }

    /// Call `callback(new, old)` whenever the value changes.
    pub fn watch_value<F>(&self, callback: F, options: WatchOptions) -> Result<WatchHandle>
    where
        F: FnMut(&Value, Option<&Value>) + Send + 'static,
    {
        self.inner.value.watch(callback, options)
    }

    /// Call `callback(new, old)` whenever the status changes.
    pub fn watch_status<F>(&self, callback: F, options: WatchOptions) -> Result<WatchHandle>
    where
        F: FnMut(&ValidateStatus, Option<&ValidateStatus>) + Send + 'static,
    {
        self.inner.status.watch(callback, options)
    }

    pub fn watch_errors<F>(&self, callback: F, options: WatchOptions) -> Result<WatchHandle>
    where
        F: FnMut(&Option<ValidateErrors>, Option<&Option<ValidateErrors>>) + Send + 'static,
    {
        self.inner.errors.watch(callback, options)
    }

    // -- validation ---------------------------------------------------------

    /// Validate the whole subtree: children first, concurrently, then this
    /// control. Resolves to this control's own errors.
    ///
    /// # Errors
    ///
    /// A faulting async validator anywhere in the subtree surfaces as
    /// [`crate::Error::ValidatorRejected`]; this control's own validators do
    /// not run if a child faulted.
    pub fn validate(&self) -> BoxFuture<'static, Result<Option<ValidateErrors>>> {
        let control = self.clone();
        async move {
            if !control.disabled() && control.is_composite() {
                let children = control.child_list();
                if !children.is_empty() {
                    let results = join_all(children.iter().map(AbstractControl::validate)).await;
                    if let Some(fault) = results.into_iter().find_map(|r| r.err()) {
                        return Err(fault);
                    }
                }
            }
            control.run_validation().await
        }
        .boxed()
    }

    async fn run_validation(&self) -> Result<Option<ValidateErrors>> {
        let span = start_validation_span(self.uid(), self.kind().as_str());
        let outcome = match span.in_scope(|| self.begin_validation(true)) {
            Pass::Settled(generation, errors) => self.settle(generation, Ok(errors)),
            Pass::Pending(generation, pending) => {
                let result = pending.instrument(span.clone()).await;
                span.in_scope(|| self.settle(generation, result))
            }
        };
        record_validation_outcome(&span, self.own_status());
        outcome
    }

    /// Fire-and-forget validation: the sync half runs now, the async half
    /// (if any) on a spawned task.
    pub(crate) fn trigger_validation(&self) {
        let runtime = Handle::try_current().ok();
        let span = start_validation_span(self.uid(), self.kind().as_str());
        match span.in_scope(|| self.begin_validation(runtime.is_some())) {
            Pass::Settled(generation, errors) => {
                let _ = self.settle(generation, Ok(errors));
                record_validation_outcome(&span, self.own_status());
            }
            Pass::Pending(generation, pending) => {
                let control = self.clone();
                let task = async move {
                    let result = pending.await;
                    let _ = control.settle(generation, result);
                    record_validation_outcome(&tracing::Span::current(), control.own_status());
                };
                if let Some(handle) = runtime {
                    handle.spawn(task.instrument(span));
                }
            }
        }
    }

    fn begin_validation(&self, allow_async: bool) -> Pass {
        let generation = self.next_generation();
        if self.disabled() {
            return Pass::Settled(generation, None);
        }

        let kind = KeyValue::new("kind", self.kind().as_str());
        let (validator, async_validator) = self.composed_validators();
        let mut value = None;
        let mut errors = None;
        if let Some(validator) = validator {
            let current = self.value();
            errors = validator.validate(&current, self);
            value = Some(current);
        }

        if errors.is_none() {
            if let Some(async_validator) = async_validator {
                if allow_async {
                    let value = value.unwrap_or_else(|| self.value());
                    metrics::validations_run().add(1, &[kind, KeyValue::new("mode", "async")]);
                    self.set_own_status(ValidateStatus::Validating);
                    return Pass::Pending(generation, async_validator.validate(value, self.clone()));
                }
                warn!(uid = %self.uid(), "no tokio runtime, skipping async validators");
            }
        }

        metrics::validations_run().add(1, &[kind, KeyValue::new("mode", "sync")]);
        Pass::Settled(generation, errors)
    }

    fn settle(
        &self,
        generation: u64,
        outcome: Result<Option<ValidateErrors>>,
    ) -> Result<Option<ValidateErrors>> {
        let kind = KeyValue::new("kind", self.kind().as_str());
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!(uid = %self.uid(), generation, "discarding stale validation result");
            metrics::validations_discarded().add(1, &[kind]);
            return outcome;
        }

        let status = match &outcome {
            Ok(errors) => {
                self.inner.errors.set(errors.clone());
                if errors.is_some() {
                    ValidateStatus::Invalid
                } else {
                    ValidateStatus::Valid
                }
            }
            Err(e) => {
                error!(uid = %self.uid(), error = %e, "async validator faulted");
                metrics::validator_faults().add(1, &[kind]);
                ValidateStatus::Invalid
            }
        };
        self.set_own_status(status);
        outcome
    }

    fn next_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn own_status(&self) -> ValidateStatus {
        self.state().own_status
    }

    fn set_own_status(&self, status: ValidateStatus) {
        self.state().own_status = status;
        if self.refresh_state() {
            self.bubble();
        }
    }

    /// Construction-time counterpart of `begin_validation`: children are
    /// already initialized, so their status is read rather than recomputed.
    /// Only an invalid child suppresses the initial async run.
    fn init_errors_and_status(&self) {
        let disabled = self.disabled();
        let (validator, async_validator) = self.composed_validators();
        let mut value = None;
        let mut errors = None;
        let mut children_invalid = false;

        if !disabled {
            if let Some(validator) = validator {
                let current = self.value();
                errors = validator.validate(&current, self);
                value = Some(current);
            }
            children_invalid = self.has_invalid_child();
        }

        let own_status = if errors.is_some() {
            ValidateStatus::Invalid
        } else {
            ValidateStatus::Valid
        };
        self.inner.errors.set(errors);
        self.state().own_status = own_status;

        let fire_async = !disabled && own_status == ValidateStatus::Valid && !children_invalid;
        if let (true, Some(async_validator)) = (fire_async, async_validator) {
            match Handle::try_current() {
                Ok(handle) => {
                    let generation = self.next_generation();
                    let value = value.unwrap_or_else(|| self.value());
                    self.state().own_status = ValidateStatus::Validating;
                    let pending = async_validator.validate(value, self.clone());
                    let control = self.clone();
                    let span = start_validation_span(self.uid(), self.kind().as_str());
                    handle.spawn(
                        async move {
                            let result = pending.await;
                            let _ = control.settle(generation, result);
                        }
                        .instrument(span),
                    );
                }
                Err(_) => {
                    warn!(uid = %self.uid(), "no tokio runtime, skipping initial async validation");
                }
            }
        }

        self.refresh_state();
    }

    // -- propagation --------------------------------------------------------

    fn has_invalid_child(&self) -> bool {
        self.child_list()
            .iter()
            .any(|child| child.status() == ValidateStatus::Invalid)
    }

    /// Recompute effective status, blurred and dirty; returns whether any of
    /// them changed.
    fn refresh_state(&self) -> bool {
        let _recompute = lock(&self.inner.recompute);
        let (own_status, leaf_blurred, leaf_dirty) = {
            let state = self.state();
            (state.own_status, state.blurred, state.dirty)
        };

        let (children_status, blurred, dirty) = if self.is_composite() {
            self.child_list().iter().fold(
                (ValidateStatus::Valid, false, false),
                |(status, blurred, dirty), child| {
                    (
                        status.merge(child.status()),
                        blurred || child.blurred(),
                        dirty || child.dirty(),
                    )
                },
            )
        } else {
            (ValidateStatus::Valid, leaf_blurred, leaf_dirty)
        };

        let status = if self.disabled() {
            ValidateStatus::Disabled
        } else if own_status != ValidateStatus::Valid {
            own_status
        } else {
            children_status
        };

        let mut changed = self.inner.status.set(status);
        changed |= self.inner.blurred.set(blurred);
        changed |= self.inner.dirty.set(dirty);
        changed
    }

    /// A child's value or state changed: recompute ours and pass it up.
    fn on_children_changed(&self) {
        let batching = self.state().batch_depth > 0;
        if batching || !self.is_composite() {
            return;
        }

        let mut changed = {
            let _recompute = lock(&self.inner.recompute);
            let aggregated = lock(&self.inner.controls).aggregate(ValueOptions::default());
            aggregated.is_some_and(|value| self.inner.value.set(value))
        };
        if changed {
            trace!(uid = %self.uid(), "aggregate value changed");
            if self.trigger() == Trigger::Change {
                self.trigger_validation();
            }
        }
        changed |= self.refresh_state();
        if changed {
            self.bubble();
        }
    }

    fn bubble(&self) {
        if let Some(parent) = self.parent() {
            parent.on_children_changed();
        }
    }

    /// Run a bulk child operation with notifications deferred, then
    /// recompute once.
    fn batch(&self, f: impl FnOnce()) {
        self.state().batch_depth += 1;
        f();
        self.state().batch_depth -= 1;
        self.on_children_changed();
    }

    // -- disabled predicate -------------------------------------------------

    /// Re-evaluate the disabled predicate whenever the tree's value changes
    /// or this control (or an ancestor) moves to another parent. Starts after
    /// the current synchronous work and lives as long as the control does.
    fn watch_disabled_predicate(&self) {
        let Ok(handle) = Handle::try_current() else {
            warn!(uid = %self.uid(), "no tokio runtime, disabled predicate will not be re-evaluated");
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            tokio::task::yield_now().await;
            loop {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let control = AbstractControl { inner };
                let (mut links, mut root_value) = control.predicate_dependencies();
                control.apply_disabled_predicate();
                drop(control);

                let mut pending: Vec<BoxFuture<'_, ()>> = links
                    .iter_mut()
                    .map(|rx| rx.changed().map(drop).boxed())
                    .collect();
                pending.push(root_value.changed().map(drop).boxed());
                select_all(pending).await;
            }
            trace!("disabled predicate watcher exiting");
        });
    }

    /// Receivers for the parent links from this control up to the root, and
    /// for the root's value.
    fn predicate_dependencies(&self) -> (Vec<watch::Receiver<u64>>, watch::Receiver<Value>) {
        let mut links = vec![self.inner.parent_epoch.subscribe()];
        let mut root = self.clone();
        while let Some(parent) = root.parent() {
            links.push(parent.inner.parent_epoch.subscribe());
            root = parent;
        }
        (links, root.subscribe_value())
    }

    fn apply_disabled_predicate(&self) {
        let predicate = self.state().disabled_fn.clone();
        let Some(predicate) = predicate else {
            return;
        };
        let disable = predicate(self, false);
        if disable == self.disabled() {
            return;
        }
        if disable {
            self.disable();
        } else {
            self.enable();
        }
    }
}
