/// Request timing middleware
///
/// Logs one line per request with method, path, status and elapsed
/// milliseconds. Slow requests are raised to `warn` (500 ms) and `error`
/// (1 s) so they stand out in the default filter.
///
/// # Example
///
/// ```no_run
/// use axum::Router;
/// use hearth_api::middleware::timing::RequestTimingLayer;
///
/// let app: Router = Router::new().layer(RequestTimingLayer::new());
/// ```

use axum::{extract::Request, response::Response};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

const WARN_AFTER: Duration = Duration::from_millis(500);
const ERROR_AFTER: Duration = Duration::from_millis(1000);

/// Severity a request of the given duration is logged at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingLevel {
    Info,
    Warn,
    Error,
}

impl TimingLevel {
    pub fn for_elapsed(elapsed: Duration) -> Self {
        if elapsed < WARN_AFTER {
            TimingLevel::Info
        } else if elapsed < ERROR_AFTER {
            TimingLevel::Warn
        } else {
            TimingLevel::Error
        }
    }
}

#[derive(Clone, Default)]
pub struct RequestTimingLayer;

impl RequestTimingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestTimingLayer {
    type Service = RequestTimingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTimingMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct RequestTimingMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for RequestTimingMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let started = Instant::now();
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;
            let elapsed = started.elapsed();
            let status = response.status().as_u16();
            let ms = elapsed.as_millis() as u64;

            match TimingLevel::for_elapsed(elapsed) {
                TimingLevel::Info => {
                    tracing::info!(%method, %path, status, ms, "request completed")
                }
                TimingLevel::Warn => {
                    tracing::warn!(%method, %path, status, ms, "slow request")
                }
                TimingLevel::Error => {
                    tracing::error!(%method, %path, status, ms, "very slow request")
                }
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(TimingLevel::for_elapsed(Duration::from_millis(12)), TimingLevel::Info);
        assert_eq!(TimingLevel::for_elapsed(Duration::from_millis(499)), TimingLevel::Info);
        assert_eq!(TimingLevel::for_elapsed(Duration::from_millis(500)), TimingLevel::Warn);
        assert_eq!(TimingLevel::for_elapsed(Duration::from_millis(999)), TimingLevel::Warn);
        assert_eq!(TimingLevel::for_elapsed(Duration::from_secs(3)), TimingLevel::Error);
    }

    #[tokio::test]
    async fn test_response_passes_through() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(RequestTimingLayer::new());

        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
