// HTTP pull endpoint for Prometheus scrapers

use crate::error::{ObserverError, Result};
use crate::exporter::PublishedGauges;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use std::time::Duration;
use tokio::sync::watch;

const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Pause after `failures` consecutive accept errors: 10ms doubling up to one second
pub(crate) fn accept_backoff(failures: u32) -> Duration {
    let millis = 10u64.saturating_mul(1u64 << failures.saturating_sub(1).min(16));
    Duration::from_millis(millis).min(MAX_ACCEPT_BACKOFF)
}

/// A bound metrics listener. Binding happens up front so a busy port
/// fails startup instead of the first scrape.
pub struct MetricsEndpoint {
    listener: TcpListener,
    gauges: Arc<PublishedGauges>,
}

impl MetricsEndpoint {
    pub async fn bind(addr: SocketAddr, gauges: Arc<PublishedGauges>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ObserverError::MetricsEndpoint(format!("Failed to bind {}: {}", addr, e)))?;

        Ok(Self { listener, gauges })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to true
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("Metrics endpoint listening on http://{}/metrics", addr);
        }

        let mut failures = 0u32;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => {
                            failures = 0;
                            conn
                        }
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            let pause = accept_backoff(failures);
                            tracing::warn!("Metrics endpoint accept error: {} (retrying in {:?})", e, pause);
                            tokio::select! {
                                _ = tokio::time::sleep(pause) => {}
                                _ = shutdown.changed() => {}
                            }
                            continue;
                        }
                    };

                    let gauges = Arc::clone(&self.gauges);
                    let io = TokioIo::new(stream);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let gauges = Arc::clone(&gauges);
                            async move { Ok::<_, Infallible>(handle(&req, &gauges)) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            tracing::debug!("Metrics connection from {} ended with error: {}", peer, e);
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Metrics endpoint shut down");
        Ok(())
    }
}

fn handle(req: &Request<hyper::body::Incoming>, gauges: &PublishedGauges) -> Response<Full<Bytes>> {
    match req.uri().path() {
        "/metrics" => match gauges.encode() {
            Ok(body) => {
                let mut response = Response::new(Full::new(Bytes::from(body)));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(prometheus::TEXT_FORMAT));
                response
            }
            Err(e) => {
                tracing::error!("Failed to encode metrics: {}", e);
                plain(StatusCode::INTERNAL_SERVER_ERROR, "encoding error")
            }
        },
        "/health" => plain(StatusCode::OK, "ok"),
        _ => plain(StatusCode::NOT_FOUND, "not found"),
    }
}

fn plain(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
