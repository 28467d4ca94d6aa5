//! Async front of the invocation router.
//!
//! `ConsoleService` is a `tower::Service` so the network layer can drive it
//! like any other service. Each request runs on the blocking pool, because the
//! execution delegate parks the calling thread until the operation finishes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use objscope_core::{ObjectRegistry, OperationCatalog};
use tower::Service;
use tracing::{info_span, Instrument};

use super::config::ConsoleConfig;
use super::delegate::ExecutionDelegate;
use super::operation::{ConsoleResponse, ResponseStatus};
use super::router::InvocationRouter;

/// Raw console request: URI path and optional query, still percent-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleRequest {
    pub path: String,
    pub query: Option<String>,
}

impl ConsoleRequest {
    #[must_use]
    pub fn new(path: impl Into<String>, query: Option<&str>) -> Self {
        Self {
            path: path.into(),
            query: query.map(ToString::to_string),
        }
    }
}

/// The request never reached an answer.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("console worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

type ConsoleFuture = Pin<Box<dyn Future<Output = Result<ConsoleResponse, ConsoleError>> + Send>>;

// ---------------------------------------------------------------------------
// ConsoleService
// ---------------------------------------------------------------------------

/// Cloneable handle that answers console requests through a shared router.
#[derive(Debug, Clone)]
pub struct ConsoleService {
    router: Arc<InvocationRouter>,
}

impl ConsoleService {
    /// Builds a router over `catalog` with a fresh registry.
    #[must_use]
    pub fn new(
        config: &ConsoleConfig,
        catalog: Arc<dyn OperationCatalog>,
        delegate: Arc<dyn ExecutionDelegate>,
    ) -> Self {
        Self::with_registry(config, catalog, Arc::new(ObjectRegistry::new()), delegate)
    }

    /// Builds a router over `catalog` sharing an existing registry.
    #[must_use]
    pub fn with_registry(
        config: &ConsoleConfig,
        catalog: Arc<dyn OperationCatalog>,
        registry: Arc<ObjectRegistry>,
        delegate: Arc<dyn ExecutionDelegate>,
    ) -> Self {
        Self {
            router: Arc::new(InvocationRouter::new(
                catalog,
                registry,
                delegate,
                config.root_type.clone(),
            )),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        self.router.registry()
    }
}

impl Service<ConsoleRequest> for ConsoleService {
    type Response = ConsoleResponse;
    type Error = ConsoleError;
    type Future = ConsoleFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ConsoleRequest) -> Self::Future {
        let router = Arc::clone(&self.router);
        let span = info_span!(
            "console",
            path = %request.path,
            status = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let start = Instant::now();
                let ConsoleRequest { path, query } = request;
                let response = tokio::task::spawn_blocking(move || {
                    router.handle(&path, query.as_deref())
                })
                .await?;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let span = tracing::Span::current();
                span.record("status", tracing::field::debug(response.status));
                span.record("duration_ms", duration_ms);
                if response.status == ResponseStatus::InternalError {
                    tracing::warn!(duration_ms, body = %response.body, "console request failed");
                } else {
                    tracing::info!(duration_ms, "console request complete");
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
