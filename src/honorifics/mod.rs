// src/honorifics/mod.rs
pub mod dictionary;
pub mod extractor;

pub use dictionary::{TitleCategory, TitleDictionary, TitleDictionaryDocument};
pub use extractor::{ExtractionOutcome, HonorificExtractor};
