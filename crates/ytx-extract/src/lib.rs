//! Structured-output recovery for ytx.
//!
//! Models asked for a JSON array or object frequently wrap it in prose or
//! markdown fences, leave literal newlines inside strings, add trailing
//! commas, or stop mid-object when they hit their token ceiling. This crate
//! recovers the best valid value it can, or reports a definite failure.
//!
//! # Main types
//!
//! - [`extract_json`]: Staged repair returning a [`serde_json::Value`].
//! - [`extract_as`]: Same, deserialized into a caller type.
//! - [`StructuredKind`] / [`StructuredPayload`]: Cards, mind maps, and vocabulary.

/// Staged JSON extraction and repair.
pub mod extract;
/// Typed payloads for structured generation features.
pub mod payload;

pub use extract::{extract_as, extract_json, Container, ExtractError};
pub use payload::{parse_structured, Card, MindmapNode, StructuredKind, StructuredPayload, VocabEntry};
