//! Bulk configuration sync
//!
//! Records are projected onto the field set of their resource kind, applied
//! (or previewed) by the engine, and collected into a [`outcome::RunSummary`].

pub mod engine;
pub mod fields;
pub mod outcome;
pub mod projector;
pub mod record;
pub mod report;
pub mod target;
pub mod value;
