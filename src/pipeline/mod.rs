// src/pipeline/mod.rs
pub mod prepare;
pub mod runner;

pub use runner::ResolutionRunner;
