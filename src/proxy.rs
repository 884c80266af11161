use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

use crate::cache::TtlCache;
use crate::error::ProxyError;
use crate::fetcher::CalendarFetcher;
use crate::logger;
use crate::registry::AliasRegistry;
use crate::Result;

const CALENDAR_CONTENT_TYPE: &str = "text/calendar";

/// HTTP front end: resolves the request path to an alias and serves the
/// upstream calendar from cache or via a fresh fetch.
pub struct ProxyServer {
    addr: SocketAddr,
    registry: Arc<AliasRegistry>,
    cache: Arc<TtlCache>,
    fetcher: Arc<dyn CalendarFetcher>,
}

impl ProxyServer {
    pub fn new(
        addr: SocketAddr,
        registry: Arc<AliasRegistry>,
        cache: Arc<TtlCache>,
        fetcher: Arc<dyn CalendarFetcher>,
    ) -> Self {
        info!("Creating proxy server on {}", addr);
        Self {
            addr,
            registry,
            cache,
            fetcher,
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting iCal proxy on {} with {} aliases",
            self.addr,
            self.registry.len()
        );

        let registry = self.registry.clone();
        let cache = self.cache.clone();
        let fetcher = self.fetcher.clone();

        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let remote_addr = conn.remote_addr();
            let registry = registry.clone();
            let cache = cache.clone();
            let fetcher = fetcher.clone();

            async move {
                Ok::<_, hyper::Error>(service_fn(move |req| {
                    debug!(
                        "Received request from {}: {} {}",
                        remote_addr,
                        req.method(),
                        req.uri()
                    );
                    handle_request(
                        req,
                        remote_addr,
                        registry.clone(),
                        cache.clone(),
                        fetcher.clone(),
                    )
                }))
            }
        });

        let server = Server::bind(&self.addr).serve(make_svc);
        info!("Proxy server is ready to accept connections");

        if let Err(e) = server.await {
            error!("Server error: {}", e);
            return Err(ProxyError::Network(e.to_string()));
        }

        Ok(())
    }
}

/// Per-request flow: extract alias, resolve it, consult the cache, fetch on
/// a miss, store the result, respond. No retries; all fetch failures map to
/// the same 500 for the client.
pub async fn handle_request(
    req: Request<Body>,
    remote_addr: SocketAddr,
    registry: Arc<AliasRegistry>,
    cache: Arc<TtlCache>,
    fetcher: Arc<dyn CalendarFetcher>,
) -> std::result::Result<Response<Body>, hyper::Error> {
    let started = Instant::now();
    let path = req.uri().path().to_string();
    let alias = path.strip_prefix('/').unwrap_or(&path).to_string();

    let response = dispatch(&alias, registry, cache, fetcher).await;
    logger::log_request(
        &remote_addr.to_string(),
        &path,
        response.status().as_u16(),
        started.elapsed(),
    );
    Ok(response)
}

async fn dispatch(
    alias: &str,
    registry: Arc<AliasRegistry>,
    cache: Arc<TtlCache>,
    fetcher: Arc<dyn CalendarFetcher>,
) -> Response<Body> {
    if alias.is_empty() {
        warn!("Bad request: missing alias");
        return plain_text(StatusCode::BAD_REQUEST, "Missing alias");
    }

    let url = match registry.resolve(alias) {
        Some(url) => url.to_string(),
        None => {
            warn!("Unknown alias: {}", alias);
            return plain_text(StatusCode::NOT_FOUND, "Not found");
        }
    };

    if let Some(data) = cache.get(alias).await {
        info!("Cache hit for alias {}", alias);
        return calendar_response(data);
    }

    info!("Cache miss for alias {}, fetching from upstream {}", alias, url);
    let data = match fetcher.fetch(&url).await {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to fetch calendar for alias {}: {}", alias, e);
            return plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch calendar");
        }
    };

    cache.set(alias, data.clone()).await;
    info!("Served calendar for alias {} ({} bytes)", alias, data.len());
    calendar_response(data)
}

fn calendar_response(data: Bytes) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, CALENDAR_CONTENT_TYPE)
        .body(Body::from(data))
        .unwrap()
}

fn plain_text(status: StatusCode, message: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(message))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    struct MockFetcher {
        data: Mutex<Bytes>,
        fail: Mutex<bool>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn returning(data: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                data: Mutex::new(Bytes::from_static(data)),
                fail: Mutex::new(false),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            let fetcher = Self::returning(b"");
            *fetcher.fail.lock().unwrap() = true;
            fetcher
        }

        fn set_data(&self, data: &'static [u8]) {
            *self.data.lock().unwrap() = Bytes::from_static(data);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CalendarFetcher for MockFetcher {
        async fn fetch(&self, _url: &str) -> crate::Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock().unwrap() {
                return Err(ProxyError::UpstreamStatus(StatusCode::BAD_GATEWAY));
            }
            Ok(self.data.lock().unwrap().clone())
        }
    }

    fn team_registry() -> Arc<AliasRegistry> {
        let mut mappings = HashMap::new();
        mappings.insert("team".to_string(), "http://upstream/team.ics".to_string());
        Arc::new(AliasRegistry::new(mappings))
    }

    async fn send(
        path: &str,
        registry: Arc<AliasRegistry>,
        cache: Arc<TtlCache>,
        fetcher: Arc<dyn CalendarFetcher>,
    ) -> Response<Body> {
        let req = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let remote = "127.0.0.1:40000".parse().unwrap();
        handle_request(req, remote, registry, cache, fetcher)
            .await
            .unwrap()
    }

    async fn body_bytes(resp: Response<Body>) -> Bytes {
        hyper::body::to_bytes(resp.into_body()).await.unwrap()
    }

    #[tokio::test]
    async fn test_root_path_is_bad_request() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let fetcher = MockFetcher::returning(b"B1");

        let resp = send("/", team_registry(), cache, fetcher.clone()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_bytes(resp).await, Bytes::from_static(b"Missing alias"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_alias_is_not_found() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let fetcher = MockFetcher::returning(b"B1");

        let resp = send("/unknown", team_registry(), cache, fetcher.clone()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(resp).await, Bytes::from_static(b"Not found"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_first_request_fetches_upstream() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let fetcher = MockFetcher::returning(b"B1");

        let resp = send("/team", team_registry(), cache, fetcher.clone()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            CALENDAR_CONTENT_TYPE
        );
        assert_eq!(body_bytes(resp).await, Bytes::from_static(b"B1"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_from_cache() {
        let registry = team_registry();
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let fetcher = MockFetcher::returning(b"B1");

        send("/team", registry.clone(), cache.clone(), fetcher.clone()).await;
        // A later fetch would return different bytes, but the cache is fresh.
        fetcher.set_data(b"B2");

        let resp = send("/team", registry, cache, fetcher.clone()).await;
        assert_eq!(body_bytes(resp).await, Bytes::from_static(b"B1"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let registry = team_registry();
        let cache = Arc::new(TtlCache::new(Duration::from_millis(20)));
        let fetcher = MockFetcher::returning(b"B1");

        send("/team", registry.clone(), cache.clone(), fetcher.clone()).await;
        sleep(Duration::from_millis(40)).await;
        fetcher.set_data(b"B2");

        let resp = send("/team", registry, cache, fetcher.clone()).await;
        assert_eq!(body_bytes(resp).await, Bytes::from_static(b"B2"));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_internal_error_and_not_cached() {
        let registry = team_registry();
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let fetcher = MockFetcher::failing();

        let resp = send("/team", registry, cache.clone(), fetcher.clone()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_bytes(resp).await,
            Bytes::from_static(b"Failed to fetch calendar")
        );
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.len().await, 0);
    }
}
