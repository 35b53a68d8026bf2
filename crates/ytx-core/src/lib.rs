//! Core types and error definitions shared by every ytx crate.
//!
//! # Main types
//!
//! - [`YtxError`]: Unified error enum for all ytx subsystems.
//! - [`YtxResult`]: Convenience alias for `Result<T, YtxError>`.
//! - [`Role`] / [`ChatMessage`]: Provider-agnostic conversation turns.
//! - [`Transcript`] / [`Segment`]: Timestamped transcript lines.
//! - [`PromptTemplate`]: Templates carrying the `{transcript}` placeholder.

/// Error types.
pub mod error;
/// Conversation message types.
pub mod message;
/// Prompt templates for every generation feature.
pub mod prompt;
/// Transcript segments and timestamp helpers.
pub mod transcript;

pub use error::{YtxError, YtxResult};
pub use message::{ChatMessage, Role};
pub use prompt::{chat_system_prompt, PromptTemplate, TRANSCRIPT_PLACEHOLDER};
pub use transcript::{fmt_time, time_to_seconds, Segment, Transcript};
