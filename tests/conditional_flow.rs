//! End-to-end behaviour of the conditional cache inside a middleware stack.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rttp_etag::cache::{
    CacheStore, EtagCache, MemoryStore, MutationAction, MutationEvent, NO_CACHE, ResourceIdentity,
};
use rttp_etag::middleware::{
    ConditionalCache, MiddlewareHandler, dispatch, from_middleware, handler_fn,
};
use rttp_etag::options::{CacheSettings, Options};
use rttp_etag::{Request, Response, StatusCode};
use serde_json::{Value, json};

const TENANT: &str = "site-1";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rttp_etag=debug")
        .with_test_writer()
        .try_init();
}

struct Harness {
    store: MemoryStore,
    conditional: Arc<ConditionalCache>,
    stack: Vec<MiddlewareHandler>,
    hits: Arc<AtomicUsize>,
}

impl Harness {
    /// A stack whose terminal handler serves `content` for every request and
    /// counts how often it ran.
    fn new(options: Options, content: Arc<std::sync::Mutex<Value>>) -> Self {
        init_tracing();
        let store = MemoryStore::new();
        let cache = EtagCache::new(Arc::new(store.clone()), CacheSettings::new(TENANT));
        let conditional = Arc::new(ConditionalCache::new(cache, options));
        let hits = Arc::new(AtomicUsize::new(0));

        let handler_hits = Arc::clone(&hits);
        let stack = vec![
            from_middleware(Arc::clone(&conditional)),
            handler_fn(move |_req: Request| {
                handler_hits.fetch_add(1, Ordering::SeqCst);
                let payload = content.lock().unwrap().clone();
                async move { Response::json(StatusCode::Ok, payload) }
            }),
        ];

        Self {
            store,
            conditional,
            stack,
            hits,
        }
    }

    async fn get(&self, target: &str, if_none_match: Option<&str>) -> Response {
        let mut request = Request::get(target);
        if let Some(tag) = if_none_match {
            request = request.header("If-None-Match", tag);
        }
        dispatch(&self.stack, request).await
    }

    fn handler_runs(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn post(modified: &str) -> Value {
    json!({
        "id": 42,
        "date": "2016-05-10T11:22:33",
        "modified_gmt": modified,
        "slug": "hello-world",
        "type": "post",
        "guid": {"rendered": "http://example.com/?p=42"},
        "title": {"rendered": "Hello world"},
    })
}

fn shared(value: Value) -> Arc<std::sync::Mutex<Value>> {
    Arc::new(std::sync::Mutex::new(value))
}

#[tokio::test]
async fn first_response_carries_caching_headers() {
    let harness = Harness::new(Options::default(), shared(post("2016-05-11T08:00:00")));
    let response = harness.get("/wp/v2/posts/42", None).await;

    assert_eq!(response.status(), StatusCode::Ok);
    let etag = response.headers().get("etag").unwrap();
    assert!(etag.starts_with('"') && etag.ends_with('"'));
    assert_eq!(response.headers().get("cache-control"), Some("public, max-age=0"));
    assert_eq!(response.headers().get("pragma"), Some("no-cache"));
    assert_eq!(
        response.headers().get("last-modified"),
        Some("Wed, 11 May 2016 08:00:00 GMT")
    );

    let bare = etag.trim_matches('"');
    for key in ["site-1:etags:posts/42", "site-1:etags:posts/hello-world"] {
        assert_eq!(harness.store.get(key).await.unwrap().as_deref(), Some(bare));
    }
}

#[tokio::test]
async fn matching_token_short_circuits() {
    let harness = Harness::new(Options::default(), shared(post("2016-05-11T08:00:00")));
    let first = harness.get("/wp/v2/posts/42", None).await;
    let etag = first.headers().get("etag").unwrap().to_owned();

    let second = harness.get("/wp/v2/posts/42", Some(&etag)).await;
    assert_eq!(second.status(), StatusCode::NotModified);
    assert_eq!(second.headers().get("etag"), Some(etag.as_str()));
    assert!(second.body_bytes().is_empty());
    assert_eq!(harness.handler_runs(), 1);
}

#[tokio::test]
async fn different_token_gets_full_response() {
    let harness = Harness::new(Options::default(), shared(post("2016-05-11T08:00:00")));
    harness.get("/wp/v2/posts/42", None).await;

    let response = harness.get("/wp/v2/posts/42", Some("\"deadbeef\"")).await;
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(harness.handler_runs(), 2);
}

#[tokio::test]
async fn weak_mode_round_trip() {
    let options = Options {
        generate_weak_etag: true,
        ..Options::default()
    };
    let harness = Harness::new(options, shared(post("2016-05-11T08:00:00")));
    let first = harness.get("/wp/v2/posts/42", None).await;
    let etag = first.headers().get("etag").unwrap().to_owned();
    assert!(etag.starts_with("W/\""));

    let second = harness.get("/wp/v2/posts/42", Some(&etag)).await;
    assert_eq!(second.status(), StatusCode::NotModified);
    assert_eq!(second.headers().get("etag"), Some(etag.as_str()));
}

#[tokio::test]
async fn stored_hash_ignores_framing_mode() {
    let content = shared(post("2016-05-11T08:00:00"));
    let strong = Harness::new(Options::default(), Arc::clone(&content));
    let weak = Harness::new(
        Options {
            generate_weak_etag: true,
            ..Options::default()
        },
        content,
    );
    strong.get("/wp/v2/posts/42", None).await;
    weak.get("/wp/v2/posts/42", None).await;

    let key = "site-1:etags:posts/42";
    assert_eq!(
        strong.store.get(key).await.unwrap(),
        weak.store.get(key).await.unwrap()
    );
}

#[tokio::test]
async fn slug_lookup_with_page_size_one() {
    let harness = Harness::new(Options::default(), shared(json!([post("2016-05-11T08:00:00")])));
    let target = "/wp/v2/posts?filter%5Bname%5D=hello-world&per_page=1";
    let first = harness.get(target, None).await;
    let etag = first.headers().get("etag").unwrap().to_owned();
    assert_eq!(first.headers().get("last-modified"), None);

    let second = harness.get(target, Some(&etag)).await;
    assert_eq!(second.status(), StatusCode::NotModified);
    assert_eq!(harness.handler_runs(), 1);
}

#[tokio::test]
async fn mutation_invalidates_then_next_response_rewrites() {
    let content = shared(post("2016-05-11T08:00:00"));
    let harness = Harness::new(Options::default(), Arc::clone(&content));
    let first = harness.get("/wp/v2/posts/42", None).await;
    let old_etag = first.headers().get("etag").unwrap().to_owned();

    *content.lock().unwrap() = post("2016-06-01T12:00:00");
    let event = MutationEvent::new(
        MutationAction::Updated,
        ResourceIdentity::new("post").with_id("42").with_slug("hello-world"),
    );
    harness.conditional.on_mutation(&event).await;
    assert!(harness.store.is_empty().await);

    let stale = harness.get("/wp/v2/posts/42", Some(&old_etag)).await;
    assert_eq!(stale.status(), StatusCode::Ok);
    let new_etag = stale.headers().get("etag").unwrap();
    assert_ne!(new_etag, old_etag);
    // id entry, slug entry, and the id entry's slug link
    assert_eq!(harness.store.len().await, 3);
}

#[tokio::test]
async fn id_only_mutation_clears_the_slug_route() {
    let content = shared(json!([post("2016-05-11T08:00:00")]));
    let harness = Harness::new(Options::default(), Arc::clone(&content));
    let target = "/wp/v2/posts?slug=hello-world&per_page=1";
    let first = harness.get(target, None).await;
    let old_etag = first.headers().get("etag").unwrap().to_owned();

    *content.lock().unwrap() = json!([post("2016-06-01T12:00:00")]);
    let event = MutationEvent::new(
        MutationAction::Updated,
        ResourceIdentity::new("post").with_id("42"),
    );
    harness.conditional.on_mutation(&event).await;

    let slug_key = format!("{TENANT}:etags:posts/hello-world");
    assert_eq!(harness.store.get(&slug_key).await.unwrap(), None);
    assert!(harness.store.is_empty().await);

    let stale = harness.get(target, Some(&old_etag)).await;
    assert_eq!(stale.status(), StatusCode::Ok);
    assert_eq!(harness.handler_runs(), 2);
}

#[tokio::test]
async fn disabled_cache_control_falls_back() {
    let options = Options {
        add_cache_control_header: false,
        ..Options::default()
    };
    let harness = Harness::new(options, shared(post("2016-05-11T08:00:00")));
    let response = harness.get("/wp/v2/posts/42", None).await;

    assert_eq!(response.headers().get("cache-control"), Some(NO_CACHE));
    assert_eq!(response.headers().get("pragma"), None);
}

#[tokio::test]
async fn disabled_etag_writes_nothing() {
    let options = Options {
        add_etag_header: false,
        ..Options::default()
    };
    let harness = Harness::new(options, shared(post("2016-05-11T08:00:00")));
    let response = harness.get("/wp/v2/posts/42", None).await;

    assert_eq!(response.headers().get("etag"), None);
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn error_responses_are_left_alone() {
    init_tracing();
    let store = MemoryStore::new();
    let cache = EtagCache::new(Arc::new(store.clone()), CacheSettings::new(TENANT));
    let stack = vec![
        from_middleware(Arc::new(ConditionalCache::new(cache, Options::default()))),
        handler_fn(|_req: Request| async {
            Response::json(StatusCode::NotFound, json!({"code": "rest_post_invalid_id"}))
        }),
    ];

    let response = dispatch(&stack, Request::get("/wp/v2/posts/999")).await;
    assert_eq!(response.status(), StatusCode::NotFound);
    assert_eq!(response.headers().get("etag"), None);
    assert_eq!(response.headers().get("cache-control"), None);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn route_index_is_fingerprinted_but_not_stored() {
    let index = json!({
        "namespace": "wp/v2",
        "routes": {"/wp/v2": {}, "/wp/v2/posts": {}},
    });
    let harness = Harness::new(Options::default(), shared(index));
    let response = harness.get("/wp/v2", None).await;

    assert!(response.headers().get("etag").is_some());
    assert_eq!(response.headers().get("last-modified"), None);
    assert!(harness.store.is_empty().await);
}
