//! hybridrag - hybrid retrieval for question answering
//!
//! Answers natural-language questions against a small ingested corpus by
//! expanding the question into related variants, scoring the corpus with
//! BM25 and with embedding similarity, and merging both into a deduplicated
//! evidence set for answer synthesis.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod expansion;
pub mod retrieval;

pub use error::{RagError, Result};
