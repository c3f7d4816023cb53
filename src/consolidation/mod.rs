// src/consolidation/mod.rs
pub mod history;
pub mod term;

pub use history::{consolidate, consolidation_patch, create_identity, TermObservation};
pub use term::{build_term_entry, parse_constituency, parse_party};
