use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use apigw_cache::{CombinedCache, DiscoveryCache, LinearCache, ResponseEnvelope, WatchRequest};
use apigw_core::{Resource, TypeUrl};
use apigw_telemetry::ControlPlaneMetrics;

fn resource_map(type_url: &TypeUrl, entries: &[(&str, u32)]) -> HashMap<String, Resource> {
    entries
        .iter()
        .map(|(name, payload)| {
            (
                name.to_string(),
                Resource::encode(*name, type_url, &json!({ "payload": payload })).unwrap(),
            )
        })
        .collect()
}

fn combined_over(caches: Vec<Arc<LinearCache>>) -> (CombinedCache, Arc<ControlPlaneMetrics>) {
    let metrics = ControlPlaneMetrics::unregistered();
    let caches: Vec<Arc<dyn DiscoveryCache>> =
        caches.into_iter().map(|c| c as Arc<dyn DiscoveryCache>).collect();
    (CombinedCache::new(caches, metrics.clone()), metrics)
}

async fn recv(rx: &mut mpsc::Receiver<ResponseEnvelope>) -> ResponseEnvelope {
    timeout(Duration::from_secs(2), rx.recv()).await.expect("timed out").expect("channel closed")
}

#[tokio::test]
async fn test_watch_routes_to_serving_cache_and_forwards_updates() {
    let routes = Arc::new(LinearCache::new(TypeUrl::RouteConfig));
    let secrets = Arc::new(LinearCache::new(TypeUrl::Secret));
    routes.set_resources(resource_map(&TypeUrl::RouteConfig, &[("a", 1)])).unwrap();

    let (combined, _) = combined_over(vec![routes.clone(), secrets.clone()]);
    let (tx, mut rx) = mpsc::channel(8);
    let _watcher = combined.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx).unwrap();

    let first = recv(&mut rx).await;
    assert_eq!(first.type_url, TypeUrl::RouteConfig);
    assert_eq!(first.version, "1");

    // A change in an unrelated family never reaches this watcher.
    secrets
        .set_resources(resource_map(&TypeUrl::Secret, &[("s", 1)]))
        .unwrap();
    routes.set_resources(resource_map(&TypeUrl::RouteConfig, &[("a", 2)])).unwrap();
    let second = recv(&mut rx).await;
    assert_eq!(second.type_url, TypeUrl::RouteConfig);
    assert_eq!(second.version, "2");
}

#[tokio::test]
async fn test_two_upstreams_at_same_version_yield_one_response() {
    // Two caches serving the same type URL, both pushed to version "1".
    let left = Arc::new(LinearCache::new(TypeUrl::PolicyChainConfig));
    let right = Arc::new(LinearCache::new(TypeUrl::PolicyChainConfig));
    left.set_resources(resource_map(&TypeUrl::PolicyChainConfig, &[("p", 1)])).unwrap();
    right.set_resources(resource_map(&TypeUrl::PolicyChainConfig, &[("p", 1)])).unwrap();

    let (combined, _) = combined_over(vec![left, right]);
    let (tx, mut rx) = mpsc::channel(8);
    let _watcher =
        combined.create_watch(WatchRequest::all(TypeUrl::PolicyChainConfig), tx).unwrap();

    let first = recv(&mut rx).await;
    assert_eq!(first.version, "1");

    // The duplicate from the second upstream is suppressed.
    let extra = timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(extra.is_err(), "expected dedup, got a second response at the same version");
}

#[tokio::test]
async fn test_cancellation_empties_registry_and_upstream_watches() {
    let cache = Arc::new(LinearCache::new(TypeUrl::RouteConfig));
    let (combined, _) = combined_over(vec![cache.clone()]);

    let mut watchers = Vec::new();
    let mut receivers = Vec::new();
    for _ in 0..100 {
        let (tx, rx) = mpsc::channel(8);
        watchers.push(combined.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx).unwrap());
        receivers.push(rx);
    }
    assert_eq!(combined.watcher_count(), 100);
    assert_eq!(cache.watch_count(), 100);

    for watcher in &watchers {
        watcher.cancel();
    }
    assert_eq!(combined.watcher_count(), 0);
    assert_eq!(cache.watch_count(), 0);

    // Cancelling twice is a no-op.
    watchers[0].cancel();
    assert_eq!(combined.watcher_count(), 0);
}

#[tokio::test]
async fn test_dropping_the_handle_cancels() {
    let cache = Arc::new(LinearCache::new(TypeUrl::RouteConfig));
    let (combined, _) = combined_over(vec![cache.clone()]);

    let (tx, _rx) = mpsc::channel(8);
    let watcher = combined.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx).unwrap();
    assert_eq!(combined.watcher_count(), 1);
    drop(watcher);
    assert_eq!(combined.watcher_count(), 0);
    assert_eq!(cache.watch_count(), 0);
}

#[tokio::test]
async fn test_slow_consumer_drops_are_counted_and_resume_with_latest() {
    let cache = Arc::new(LinearCache::new(TypeUrl::RouteConfig));
    let (combined, metrics) = combined_over(vec![cache.clone()]);

    // Downstream with room for exactly one response that nobody reads.
    let (tx, mut rx) = mpsc::channel(1);
    let _watcher = combined.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx).unwrap();

    for round in 1..=10u32 {
        cache.set_resources(resource_map(&TypeUrl::RouteConfig, &[("a", round)])).unwrap();
    }

    // The fan-in task times out against the stuck downstream and drops.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while metrics.control_plane_events_sent_total.with_label_values(&["dropped"]).get() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "no drop was ever recorded");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Resume reading: drain whatever was buffered, then the next transition
    // must deliver the latest state.
    while timeout(Duration::from_millis(200), rx.recv()).await.is_ok() {}
    cache.set_resources(resource_map(&TypeUrl::RouteConfig, &[("a", 99)])).unwrap();
    let resumed = recv(&mut rx).await;
    assert_eq!(resumed.version, "11");

    // Other streams were never affected: a fresh watcher syncs immediately.
    let (tx2, mut rx2) = mpsc::channel(8);
    let _other = combined.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx2).unwrap();
    let synced = recv(&mut rx2).await;
    assert_eq!(synced.version, "11");
}

#[tokio::test]
async fn test_broadcast_watch_covers_all_caches() {
    let routes = Arc::new(LinearCache::new(TypeUrl::RouteConfig));
    let secrets = Arc::new(LinearCache::new(TypeUrl::Secret));
    routes.set_resources(resource_map(&TypeUrl::RouteConfig, &[("a", 1)])).unwrap();
    secrets.set_resources(resource_map(&TypeUrl::Secret, &[("s", 1)])).unwrap();

    let (combined, _) = combined_over(vec![routes, secrets]);
    let (tx, mut rx) = mpsc::channel(8);
    let _watcher =
        combined.create_watch(WatchRequest::all(TypeUrl::Unknown(String::new())), tx).unwrap();

    let mut seen = Vec::new();
    seen.push(recv(&mut rx).await.type_url);
    seen.push(recv(&mut rx).await.type_url);
    seen.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(seen, vec![TypeUrl::RouteConfig, TypeUrl::Secret]);
}

#[tokio::test]
async fn test_fetch_prefers_first_serving_cache() {
    let first = Arc::new(LinearCache::new(TypeUrl::Certificate));
    let second = Arc::new(LinearCache::new(TypeUrl::Certificate));
    first.set_resources(resource_map(&TypeUrl::Certificate, &[("one", 1)])).unwrap();
    second.set_resources(resource_map(&TypeUrl::Certificate, &[("two", 1), ("three", 1)])).unwrap();

    let (combined, _) = combined_over(vec![first, second]);
    let response = combined.fetch(&WatchRequest::all(TypeUrl::Certificate));
    assert_eq!(response.resources.len(), 1);
    assert_eq!(response.resources[0].name, "one");
}

#[tokio::test]
async fn test_delta_watch_through_the_combined_cache() {
    let cache = Arc::new(LinearCache::new(TypeUrl::Certificate));
    cache.set_resources(resource_map(&TypeUrl::Certificate, &[("ca", 1)])).unwrap();
    let (combined, _) = combined_over(vec![cache.clone()]);

    let (tx, mut rx) = mpsc::channel(8);
    let watcher = combined
        .create_delta_watch(
            apigw_cache::DeltaWatchRequest {
                type_url: TypeUrl::Certificate,
                ..Default::default()
            },
            tx,
        )
        .unwrap();

    let initial = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert_eq!(initial.resources.len(), 1);

    cache.set_resources(resource_map(&TypeUrl::Certificate, &[("ca", 2), ("server", 1)])).unwrap();
    let update = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert_eq!(update.resources.len(), 2);

    watcher.cancel();
    assert_eq!(combined.watcher_count(), 0);
    assert_eq!(cache.watch_count(), 0);
}
