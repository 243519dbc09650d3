//! Type definitions for the fraud scoring service

pub mod prediction;
pub mod table;

pub use prediction::{PredictionResponse, PredictionSummary};
pub use table::{RawTable, RawValue};
