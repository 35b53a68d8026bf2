use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, info_span, warn, Instrument};
use ytx_core::YtxResult;

use crate::backends::{adapter_for, GeminiAdapter};
use crate::classify::{classify, ClassifiedError, ErrorCategory};
use crate::config::{resolve_model, DispatcherConfig, LlmProvider};
use crate::keepalive::{KeepAliveGuard, LivenessHook, NoopLiveness};
use crate::request::{GenerationRequest, HttpRequestSpec, MediaAnalysisRequest};
use crate::sse::SseNormalizer;
use crate::stream::{DispatchEvent, StreamEvent};

/// Capacity of the per-request event channel.
const EVENT_BUFFER: usize = 256;

/// Owns the lifecycle of generation requests.
///
/// Every outcome, including configuration and transport failures, is
/// reported as a terminal event on the request's channel; the dispatcher
/// itself never returns an error. Nothing is retried automatically.
#[derive(Clone)]
pub struct RequestDispatcher {
    http: reqwest::Client,
    config: DispatcherConfig,
    liveness: Arc<dyn LivenessHook>,
}

impl RequestDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: DispatcherConfig) -> Self {
        Self {
            http,
            config,
            liveness: Arc::new(NoopLiveness),
        }
    }

    /// Replaces the hook pinged during media analysis.
    pub fn with_liveness(mut self, hook: Arc<dyn LivenessHook>) -> Self {
        self.liveness = hook;
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Runs `req` on a background task.
    pub fn spawn(&self, req: GenerationRequest) -> (mpsc::Receiver<DispatchEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run(req, tx).await });
        (rx, handle)
    }

    /// Like [`spawn`](Self::spawn), as a `Stream`.
    pub fn stream(&self, req: GenerationRequest) -> (ReceiverStream<DispatchEvent>, JoinHandle<()>) {
        let (rx, handle) = self.spawn(req);
        (ReceiverStream::new(rx), handle)
    }

    /// Runs [`analyze_media`](Self::analyze_media) on a background task.
    pub fn spawn_media(
        &self,
        req: MediaAnalysisRequest,
    ) -> (mpsc::Receiver<DispatchEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = self.clone();
        let handle = tokio::spawn(async move { this.analyze_media(req, tx).await });
        (rx, handle)
    }

    /// Runs one streaming request to completion, reporting to `tx`.
    ///
    /// Emits `Model` once the model is resolved, then chunks, then exactly
    /// one `Done` or `Error`. A dropped receiver abandons the request.
    pub async fn run(&self, req: GenerationRequest, tx: mpsc::Sender<DispatchEvent>) {
        let span = info_span!(
            "generation",
            request_id = %req.request_id,
            provider = %req.provider,
            channel = %req.channel,
        );
        let mut out = Emitter::new(tx);

        async {
            match self.config.request_timeout {
                Some(limit) => {
                    if tokio::time::timeout(limit, self.execute(&req, &mut out))
                        .await
                        .is_err()
                    {
                        warn!(timeout_secs = limit.as_secs(), "request timed out");
                        out.error(ClassifiedError::timeout(limit)).await;
                    }
                }
                None => self.execute(&req, &mut out).await,
            }
        }
        .instrument(span)
        .await;
    }

    async fn execute(&self, req: &GenerationRequest, out: &mut Emitter) {
        if req.api_key.trim().is_empty() {
            warn!(category = %ErrorCategory::MissingApiKey, "request rejected before dispatch");
            out.error(ClassifiedError::missing_api_key(req.provider)).await;
            return;
        }

        let model = resolve_model(req.provider, req.model.as_deref());
        if req.model.as_deref().is_some_and(|m| !m.is_empty() && m != model) {
            debug!(requested = ?req.model, model = %model, "discarded model from another provider");
        }
        out.send(DispatchEvent::Model {
            provider: req.provider,
            model: model.clone(),
        })
        .await;

        let adapter = adapter_for(req.provider, self.config.base_url(req.provider));
        let spec = adapter.build_request(req, &model);
        info!(model = %model, url = spec.loggable_url(), messages = req.messages.len(), "dispatching request");

        let resp = match self.send(&spec).await {
            Ok(resp) => resp,
            Err(e) => {
                let err = transport_error(&e);
                warn!(category = %err.category, error = %e, "request failed before a response");
                out.error(err).await;
                return;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = classify(status.as_u16(), &body, req.provider);
            warn!(status = status.as_u16(), category = %err.category, "vendor returned an error");
            out.error(err).await;
            return;
        }

        let mut normalizer = SseNormalizer::new(adapter);
        let mut body = resp.bytes_stream();
        let mut chunks = 0usize;

        while let Some(next) = body.next().await {
            match next {
                Ok(bytes) => {
                    for event in normalizer.push(&bytes) {
                        if matches!(event, StreamEvent::Chunk { .. }) {
                            chunks += 1;
                        }
                        out.send(event.into()).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, chunks, "response stream broke");
                    if let Some(event) = normalizer.fail(format!("Connection lost while streaming: {e}")) {
                        out.send(event.into()).await;
                    }
                    return;
                }
            }
            if normalizer.is_finished() {
                break;
            }
            if out.is_closed() {
                debug!(chunks, "receiver gone; abandoning stream");
                return;
            }
        }

        for event in normalizer.finish() {
            out.send(event.into()).await;
        }
        info!(chunks, "stream complete");
    }

    /// One-shot whole-video analysis through Gemini.
    ///
    /// The liveness hook is pinged every `keepalive_interval` while the call
    /// is in flight and released when it ends, however it ends. The reply
    /// is reported as a single chunk followed by `Done`.
    pub async fn analyze_media(&self, req: MediaAnalysisRequest, tx: mpsc::Sender<DispatchEvent>) {
        let span = info_span!(
            "media_analysis",
            request_id = %req.request_id,
            channel = %req.channel,
        );
        let mut out = Emitter::new(tx);

        async {
            let provider = LlmProvider::Gemini;
            if req.api_key.trim().is_empty() {
                out.error(ClassifiedError::missing_api_key(provider)).await;
                return;
            }

            let model = resolve_model(provider, req.model.as_deref());
            out.send(DispatchEvent::Model {
                provider,
                model: model.clone(),
            })
            .await;

            match self.media_text(&req, &model).await {
                Ok(text) => {
                    info!(chars = text.len(), "media analysis complete");
                    out.send(StreamEvent::Chunk { text }.into()).await;
                    out.send(StreamEvent::Done.into()).await;
                }
                Err(err) => {
                    warn!(category = %err.category, status = ?err.status, "media analysis failed");
                    out.error(err).await;
                }
            }
        }
        .instrument(span)
        .await;
    }

    /// Whole-video analysis as a plain call, returning the model's text.
    pub async fn describe_media(&self, req: &MediaAnalysisRequest) -> YtxResult<String> {
        let model = resolve_model(LlmProvider::Gemini, req.model.as_deref());
        Ok(self.media_text(req, &model).await?)
    }

    async fn media_text(&self, req: &MediaAnalysisRequest, model: &str) -> Result<String, ClassifiedError> {
        let provider = LlmProvider::Gemini;
        if req.api_key.trim().is_empty() {
            return Err(ClassifiedError::missing_api_key(provider));
        }

        let adapter = GeminiAdapter::new(self.config.base_url(provider));
        let spec = adapter.build_media_request(req, model);
        info!(model, url = spec.loggable_url(), "dispatching media analysis");

        let keepalive = KeepAliveGuard::start(Arc::clone(&self.liveness), self.config.keepalive_interval);
        let outcome = match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetch_json(&spec, provider))
                .await
                .unwrap_or_else(|_| Err(ClassifiedError::timeout(limit))),
            None => self.fetch_json(&spec, provider).await,
        };
        drop(keepalive);

        GeminiAdapter::extract_full_text(&outcome?).ok_or_else(|| {
            ClassifiedError::new(
                ErrorCategory::Unknown,
                None,
                "The model returned no text for this video",
            )
        })
    }

    async fn send(&self, spec: &HttpRequestSpec) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self.http.post(&spec.url);
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.json(&spec.body).send().await
    }

    async fn fetch_json(&self, spec: &HttpRequestSpec, provider: LlmProvider) -> Result<Value, ClassifiedError> {
        let resp = self.send(spec).await.map_err(|e| transport_error(&e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(ClassifiedError::network)?;
        if !status.is_success() {
            return Err(classify(status.as_u16(), &body, provider));
        }
        serde_json::from_str(&body).map_err(|e| {
            ClassifiedError::new(
                ErrorCategory::Unknown,
                Some(status.as_u16()),
                format!("Unreadable response from {provider}: {e}"),
            )
        })
    }
}

fn transport_error(err: &reqwest::Error) -> ClassifiedError {
    if err.is_timeout() {
        ClassifiedError::new(ErrorCategory::Timeout, None, "Request timed out")
    } else {
        ClassifiedError::network(err)
    }
}

/// Sends events for one request, at most one of them terminal.
///
/// Sends after the receiver is gone are dropped quietly: the consumer may
/// have been abandoned. `send` is cancel-safe with respect to `terminated`.
struct Emitter {
    tx: mpsc::Sender<DispatchEvent>,
    terminated: bool,
}

impl Emitter {
    fn new(tx: mpsc::Sender<DispatchEvent>) -> Self {
        Self {
            tx,
            terminated: false,
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&mut self, event: DispatchEvent) {
        if self.terminated {
            return;
        }
        let terminal = matches!(&event, DispatchEvent::Stream(e) if e.is_terminal());
        // Only a completed send counts: a send cancelled by the timeout
        // must leave room for the timeout error.
        match self.tx.send(event).await {
            Ok(()) => self.terminated = terminal,
            Err(_) => {
                debug!("event receiver dropped");
                self.terminated = true;
            }
        }
    }

    async fn error(&mut self, err: ClassifiedError) {
        self.send(StreamEvent::error(err.message).into()).await;
    }
}

/// How long a request may run, for display.
pub fn describe_timeout(timeout: Option<Duration>) -> String {
    match timeout {
        Some(d) => format!("{d:?}"),
        None => "none".to_string(),
    }
}
