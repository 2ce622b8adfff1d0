//! Background services

pub mod generation_runner;
pub mod output_ingest;

pub use generation_runner::GenerationRunner;
