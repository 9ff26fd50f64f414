//! Type definitions module
//!
//! Outcome types shared between the operation layer and the controller.

pub mod outcome;

pub use outcome::{CycleOutcome, CycleReport};
