//! # formtree
//!
//! Reactive form-control trees.
//!
//! Build a tree of [`FormControl`], [`FormGroup`] and [`FormArray`] nodes;
//! each node aggregates its value from its children, runs sync and async
//! validators, tracks blurred/dirty/disabled state, and publishes every
//! change through observable cells that a UI layer can watch.

pub mod config;
pub mod control;
pub mod error;
pub mod model;
pub mod reactive;
pub mod telemetry;
pub mod validators;

pub use control::{AbstractControl, ControlOptions, FormArray, FormControl, FormGroup};
pub use error::{Error, Result};
pub use model::{SetValueOptions, Trigger, ValidateError, ValidateErrors, ValidateStatus, ValueOptions};
pub use validators::{AsyncValidatorFn, ValidatorFn, Validators};
