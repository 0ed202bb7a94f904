//! Domain layer for Lint Relay
//!
//! Architecture: Domain Model - Issues and reports are plain in-memory values
//! - Contains the issue record produced from linter output and the aggregate report
//! - Independent of process handling, configuration files, or presentation
//! - Expresses the vocabulary shared by the extractor, parsers, and renderers

pub mod issues;

// Re-export main domain types for convenience
pub use issues::*;
