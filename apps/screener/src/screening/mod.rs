//! Résumé screening: extraction, candidate processing and batch fan-out.

pub mod batch;
pub mod extractor;
pub mod handlers;
pub mod identity;
pub mod processor;
pub mod profile;
pub mod uploads;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchError, BatchRunner, JobRequest};
pub use processor::CandidateProcessor;
