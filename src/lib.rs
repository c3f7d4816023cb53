pub mod consolidation;
pub mod honorifics;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod utils;
