//! evalgrade-core — Scoring engine for university course evaluations.
//!
//! This crate turns raw per-question and per-session marks into component
//! scores, course totals and pass/fail verdicts. Scales and part weights are
//! explicit values passed into each calculator; nothing is read from global
//! state.

pub mod assignment;
pub mod ca;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod flush;
pub mod lab;
pub mod model;
pub mod record;
pub mod report;
pub mod scale;
pub mod session;
pub mod weights;

pub use config::CourseConfig;
pub use error::{ScoringError, StoreError};
pub use evaluator::{Evaluator, PassStatus, TotalResult};
pub use model::{Component, CourseType, PartKey};
pub use scale::ScaleRegistry;
