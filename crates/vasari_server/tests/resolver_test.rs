//! Tests for the media file resolution middleware.

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use vasari_core::Udi;
use vasari_error::BuilderErrorKind;
use vasari_server::{
    EntityTag, MatchValidator, MediaFileResolver, RequestTarget, ResolverOptions,
    format_http_date, router,
};
use vasari_storage::{
    ApacheContentTypeProvider, InMemoryBlobContainer, MediaStorage, RemoteBlobStorage,
    ShardedFileStorage, StorageEntry, StorageError, StorageErrorKind, StorageResult,
};

/// In-memory storage that counts reads and can be slowed down or broken.
#[derive(Default)]
struct TestStorage {
    entries: Mutex<HashMap<String, StorageEntry>>,
    gets: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
}

impl TestStorage {
    fn with_entry(self, entry: StorageEntry) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.name().clone(), entry);
        self
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaStorage for TestStorage {
    async fn get(
        &self,
        name: &str,
        _cancel: &CancellationToken,
    ) -> StorageResult<Option<StorageEntry>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(StorageError::new(StorageErrorKind::RemoteRead(
                "backend unavailable".to_string(),
            )));
        }
        Ok(self.entries.lock().unwrap().get(name).cloned())
    }

    async fn put(&self, entry: &StorageEntry, _cancel: &CancellationToken) -> StorageResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.name().clone(), entry.clone());
        Ok(())
    }

    async fn delete(&self, name: &str, _cancel: &CancellationToken) -> StorageResult<bool> {
        Ok(self.entries.lock().unwrap().remove(name).is_some())
    }
}

struct Reject;

#[async_trait]
impl MatchValidator for Reject {
    async fn validate(&self, _udi: &Udi, _headers: &HeaderMap) -> bool {
        false
    }
}

fn modified() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
}

fn jpeg() -> StorageEntry {
    StorageEntry::from_bytes("abc.jpg", "image/jpeg", modified(), b"0123456789".to_vec())
}

fn app(storage: Arc<TestStorage>) -> Router {
    let resolver = MediaFileResolver::builder()
        .storage(storage)
        .build()
        .unwrap();
    router(Arc::new(resolver))
}

async fn send(app: Router, method: Method, uri: &str, headers: &[(&str, String)]) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request = request.header(*name, value.as_str());
    }
    app.oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn etag() -> String {
    EntityTag::for_asset(&modified(), 10).to_string()
}

#[tokio::test]
async fn test_get_serves_file_with_caching_headers() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let response = send(app(storage), Method::GET, "/media-file/abc.jpg", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[CONTENT_TYPE], "image/jpeg");
    assert_eq!(headers[CONTENT_LENGTH], "10");
    assert_eq!(headers[CACHE_CONTROL], "public, max-age=604800");
    assert_eq!(headers[LAST_MODIFIED], "Fri, 01 Mar 2024 12:30:00 GMT");
    assert_eq!(headers[ETAG], etag().as_str());
    assert_eq!(body(response).await, b"0123456789");
}

#[tokio::test]
async fn test_head_has_headers_but_no_body() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let response = send(app(storage), Method::HEAD, "/media-file/abc.jpg", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_LENGTH], "10");
    assert!(body(response).await.is_empty());
}

#[tokio::test]
async fn test_matching_etag_is_not_modified() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let response = send(
        app(storage),
        Method::GET,
        "/media-file/abc.jpg",
        &[("if-none-match", etag())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers()[ETAG], etag().as_str());
    assert!(response.headers().get(CONTENT_LENGTH).is_none());
    assert!(body(response).await.is_empty());
}

#[tokio::test]
async fn test_stale_etag_serves_file() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let response = send(
        app(storage),
        Method::GET,
        "/media-file/abc.jpg",
        &[("if-none-match", "W/\"stale\"".to_string())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, b"0123456789");
}

#[tokio::test]
async fn test_if_modified_since_not_modified() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let response = send(
        app(storage),
        Method::GET,
        "/media-file/abc.jpg",
        &[("if-modified-since", format_http_date(&modified()))],
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_if_modified_since_older_serves_file() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let earlier = modified() - ChronoDuration::days(1);
    let response = send(
        app(storage),
        Method::GET,
        "/media-file/abc.jpg",
        &[("if-modified-since", format_http_date(&earlier))],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_failed_if_match_is_precondition_failed() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let response = send(
        app(storage),
        Method::GET,
        "/media-file/abc.jpg",
        &[("if-match", "\"other\"".to_string())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    assert!(body(response).await.is_empty());
}

#[tokio::test]
async fn test_if_match_any_serves_file() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let response = send(
        app(storage),
        Method::GET,
        "/media-file/abc.jpg",
        &[("if-match", "*".to_string())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unmatched_requests_fall_through() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));

    for uri in ["/media-file", "/document/abc.jpg", "/"] {
        let response = send(app(storage.clone()), Method::GET, uri, &[]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
    assert_eq!(storage.gets(), 0);

    let health = send(app(storage.clone()), Method::GET, "/health", &[]).await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_guid_identifiers_fall_through() {
    let storage = Arc::new(TestStorage::default());
    let response = send(
        app(storage.clone()),
        Method::GET,
        "/media-file/6f1c1b3e2a5d4c0e9b7a8d6c5e4f3a2b",
        &[],
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(storage.gets(), 0);
}

#[tokio::test]
async fn test_other_methods_fall_through() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let response = send(app(storage.clone()), Method::POST, "/media-file/abc.jpg", &[]).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(storage.gets(), 0);
}

#[tokio::test]
async fn test_missing_file_falls_through() {
    let storage = Arc::new(TestStorage::default());
    let response = send(app(storage.clone()), Method::GET, "/media-file/abc.jpg", &[]).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(storage.gets(), 1);
}

#[tokio::test]
async fn test_storage_failure_falls_through() {
    let storage = Arc::new(TestStorage {
        fail: true,
        ..TestStorage::default()
    });
    let response = send(app(storage), Method::GET, "/media-file/abc.jpg", &[]).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validator_veto_falls_through() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let resolver = MediaFileResolver::builder()
        .storage(storage.clone())
        .validator(Arc::new(Reject))
        .build()
        .unwrap();

    let response = send(
        router(Arc::new(resolver)),
        Method::GET,
        "/media-file/abc.jpg",
        &[],
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(storage.gets(), 0);
}

#[tokio::test]
async fn test_host_and_path_target() {
    let storage = Arc::new(TestStorage::default().with_entry(StorageEntry::from_bytes(
        "photos/abc.jpg",
        "image/jpeg",
        modified(),
        b"0123456789".to_vec(),
    )));
    let options = ResolverOptions::default().with_request_target(RequestTarget::HostAndPath);
    let resolver = MediaFileResolver::builder()
        .storage(storage)
        .options(options)
        .build()
        .unwrap();

    let response = send(
        router(Arc::new(resolver)),
        Method::GET,
        "/photos/abc.jpg",
        &[("host", "media-file".to_string())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, b"0123456789");
}

#[tokio::test]
async fn test_custom_max_age() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let resolver = MediaFileResolver::builder()
        .storage(storage)
        .options(ResolverOptions::default().with_browser_max_age_secs(60))
        .build()
        .unwrap();

    let response = send(
        router(Arc::new(resolver)),
        Method::GET,
        "/media-file/abc.jpg",
        &[],
    )
    .await;

    assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=60");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_fetch() {
    let storage = Arc::new(
        TestStorage {
            delay: Some(Duration::from_millis(100)),
            ..TestStorage::default()
        }
        .with_entry(jpeg()),
    );
    let resolver = Arc::new(MediaFileResolver::new(storage.clone()));
    let app = router(Arc::clone(&resolver));

    let requests: Vec<_> = (0..8)
        .map(|i| {
            let app = app.clone();
            // Half the callers already hold the current copy
            let headers = if i % 2 == 0 {
                vec![("if-none-match", etag())]
            } else {
                Vec::new()
            };
            tokio::spawn(async move {
                send(app, Method::GET, "/media-file/abc.jpg", &headers)
                    .await
                    .status()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for request in requests {
        statuses.push(request.await.unwrap());
    }

    assert_eq!(storage.gets(), 1);
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::NOT_MODIFIED)
            .count(),
        4
    );
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 4);
    assert_eq!(resolver.in_flight(), 0);
}

#[tokio::test]
async fn test_sequential_requests_fetch_again() {
    let storage = Arc::new(TestStorage::default().with_entry(jpeg()));
    let resolver = Arc::new(MediaFileResolver::new(storage.clone()));

    for _ in 0..3 {
        let response = send(
            router(Arc::clone(&resolver)),
            Method::GET,
            "/media-file/abc.jpg",
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(storage.gets(), 3);
    assert_eq!(resolver.in_flight(), 0);
}

#[tokio::test]
async fn test_misses_leave_no_ticket_behind() {
    let storage = Arc::new(TestStorage::default());
    let resolver = Arc::new(MediaFileResolver::new(storage.clone()));

    for _ in 0..2 {
        let response = send(
            router(Arc::clone(&resolver)),
            Method::GET,
            "/media-file/abc.jpg",
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(resolver.in_flight(), 0);
    }

    assert_eq!(storage.gets(), 2);
}

#[tokio::test]
async fn test_failures_leave_no_ticket_behind() {
    let storage = Arc::new(TestStorage {
        fail: true,
        ..TestStorage::default()
    });
    let resolver = Arc::new(MediaFileResolver::new(storage.clone()));

    for _ in 0..2 {
        let response = send(
            router(Arc::clone(&resolver)),
            Method::GET,
            "/media-file/abc.jpg",
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(resolver.in_flight(), 0);
    }

    // A failed fetch is not remembered; the next request tries again
    assert_eq!(storage.gets(), 2);
}

#[tokio::test]
async fn test_spaced_names_resolve_on_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let backends: Vec<Arc<dyn MediaStorage>> = vec![
        Arc::new(
            ShardedFileStorage::new(dir.path(), Arc::new(ApacheContentTypeProvider::bundled()))
                .unwrap(),
        ),
        Arc::new(RemoteBlobStorage::new(Arc::new(InMemoryBlobContainer::new()))),
    ];

    let entry = StorageEntry::from_bytes("my photo.jpg", "image/jpeg", modified(), vec![5u8; 6]);
    for storage in backends {
        storage.put(&entry, &CancellationToken::new()).await.unwrap();
        let app = router(Arc::new(MediaFileResolver::new(storage)));

        for uri in ["/media-file/my%20photo.jpg", "/media-file/my%2520photo.jpg"] {
            let response = send(app.clone(), Method::GET, uri, &[]).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            assert_eq!(body(response).await, vec![5u8; 6]);
        }
    }
}

#[test]
fn test_identify_forms_candidates() {
    let resolver = MediaFileResolver::new(Arc::new(TestStorage::default()));
    let headers = HeaderMap::new();

    let udi = resolver
        .identify(&"/media-file/photos/abc.jpg".parse().unwrap(), &headers)
        .unwrap();
    assert_eq!(udi.entity_type_name(), "media-file");
    assert_eq!(udi.id().unwrap(), "photos/abc.jpg");

    assert!(
        resolver
            .identify(&"/media-file".parse().unwrap(), &headers)
            .is_none()
    );
    assert!(
        resolver
            .identify(&"/document/abc.jpg".parse().unwrap(), &headers)
            .is_none()
    );
}

#[test]
fn test_builder_requires_storage() {
    let err = MediaFileResolver::builder().build().unwrap_err();
    assert!(matches!(err.kind(), BuilderErrorKind::MissingField(field) if field.contains("storage")));
}
