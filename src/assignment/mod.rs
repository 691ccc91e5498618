pub mod engine;
pub mod scoring;

pub use engine::{AssignmentEngine, AssignmentProposal};
