//! Photo-sheet processing pipeline: stage interfaces, structured stage
//! failures, and the orchestrator that threads one upload through them.

pub mod error;
pub mod runner;
pub mod stages;

pub use error::{ProcessingResult, Stage, StageFailure};
pub use runner::{Pipeline, SheetOutput};
