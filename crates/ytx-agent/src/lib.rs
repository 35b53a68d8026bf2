//! Provider-agnostic streaming pipeline for ytx.
//!
//! A [`GenerationRequest`] goes to the [`RequestDispatcher`], which resolves
//! the model, builds the vendor request through a [`ProviderAdapter`], and
//! turns the vendor's SSE body into [`StreamEvent`]s with the
//! [`SseNormalizer`]. HTTP failures are mapped by [`classify`].

pub mod backends;
pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod keepalive;
pub mod request;
pub mod sse;
pub mod stream;

pub use backends::{adapter_for, ProviderAdapter};
pub use classify::{classify, ClassifiedError, ErrorCategory};
pub use config::{resolve_model, DispatcherConfig, LlmProvider};
pub use dispatcher::{describe_timeout, RequestDispatcher};
pub use keepalive::{KeepAliveGuard, LivenessHook, NoopLiveness};
pub use request::{GenerationRequest, HttpRequestSpec, MediaAnalysisRequest};
pub use sse::SseNormalizer;
pub use stream::{DispatchEvent, StreamEvent};
