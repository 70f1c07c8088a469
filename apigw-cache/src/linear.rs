use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use apigw_core::{Error, Resource, Result, TypeUrl};

use crate::cache::{DiscoveryCache, WatchId};
use crate::watch::{DeltaResponseEnvelope, DeltaWatchRequest, ResponseEnvelope, WatchRequest};

struct CachedEntry {
    resource: Resource,
    version: u64,
}

struct SotwWatch {
    names: Vec<String>,
    known_version: u64,
    // Set when a try_send found the channel full; the watch is then retried
    // on the next state transition regardless of which names changed.
    pending_retry: bool,
    tx: mpsc::Sender<ResponseEnvelope>,
}

impl SotwWatch {
    fn wants(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n == name)
    }
}

struct DeltaWatch {
    names: Vec<String>,
    known: HashMap<String, u64>,
    pending_retry: bool,
    tx: mpsc::Sender<DeltaResponseEnvelope>,
}

impl DeltaWatch {
    fn wants(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n == name)
    }
}

struct State {
    version: u64,
    resources: HashMap<String, CachedEntry>,
    watches: HashMap<u64, SotwWatch>,
    delta_watches: HashMap<u64, DeltaWatch>,
    next_watch_id: u64,
}

/// Snapshot cache for exactly one type URL. Holds the current resource set
/// keyed by stable name; every replacement bumps a strictly monotonic
/// version and notifies the open watches whose visible subset changed.
///
/// Watches are persistent: a watch lives until cancelled or its channel
/// closes, and is re-notified on every relevant transition. All sends are
/// non-blocking; no I/O ever happens while the cache lock is held.
pub struct LinearCache {
    type_url: TypeUrl,
    state: Mutex<State>,
}

impl LinearCache {
    pub fn new(type_url: TypeUrl) -> Self {
        Self {
            type_url,
            state: Mutex::new(State {
                version: 0,
                resources: HashMap::new(),
                watches: HashMap::new(),
                delta_watches: HashMap::new(),
                next_watch_id: 1,
            }),
        }
    }

    /// Replace the whole resource set atomically. Computes the changed-name
    /// set (added, updated, removed), bumps the version, and notifies
    /// affected watches before returning.
    pub fn set_resources(&self, new_resources: HashMap<String, Resource>) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.check_resources(new_resources.values())?;

        let mut changed: HashSet<String> = state
            .resources
            .keys()
            .filter(|name| !new_resources.contains_key(*name))
            .cloned()
            .collect();
        for (name, resource) in &new_resources {
            match state.resources.get(name) {
                Some(existing) if existing.resource == *resource => {}
                _ => {
                    changed.insert(name.clone());
                }
            }
        }

        state.version += 1;
        let version = state.version;
        let mut next: HashMap<String, CachedEntry> = HashMap::with_capacity(new_resources.len());
        for (name, resource) in new_resources {
            let entry_version = if changed.contains(&name) {
                version
            } else {
                state.resources[&name].version
            };
            next.insert(name, CachedEntry { resource, version: entry_version });
        }
        state.resources = next;

        trace!(
            type_url = %self.type_url,
            version,
            changed = changed.len(),
            total = state.resources.len(),
            "resource set replaced"
        );
        Self::notify_locked(&mut state, &self.type_url, &changed);
        Ok(())
    }

    /// Insert or update a single resource.
    pub fn update_resource(&self, name: &str, resource: Resource) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.check_resources(std::iter::once(&resource))?;
        state.version += 1;
        let version = state.version;
        state.resources.insert(name.to_string(), CachedEntry { resource, version });
        let changed: HashSet<String> = std::iter::once(name.to_string()).collect();
        Self::notify_locked(&mut state, &self.type_url, &changed);
        Ok(())
    }

    /// Remove a single resource. Removing an unknown name still bumps the
    /// version but notifies nobody.
    pub fn delete_resource(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.version += 1;
        let existed = state.resources.remove(name).is_some();
        if existed {
            let changed: HashSet<String> = std::iter::once(name.to_string()).collect();
            Self::notify_locked(&mut state, &self.type_url, &changed);
        }
        Ok(())
    }

    pub fn version(&self) -> String {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.version.to_string()
    }

    pub fn resource_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.resources.len()
    }

    fn check_resources<'a>(&self, resources: impl Iterator<Item = &'a Resource>) -> Result<()> {
        for resource in resources {
            if resource.body.type_url != self.type_url.as_str() {
                return Err(Error::cache(
                    self.type_url.as_str(),
                    format!(
                        "resource '{}' carries foreign type URL '{}'",
                        resource.name, resource.body.type_url
                    ),
                ));
            }
        }
        Ok(())
    }

    fn notify_locked(state: &mut State, type_url: &TypeUrl, changed: &HashSet<String>) {
        let State { version, resources, watches, delta_watches, .. } = state;
        let version = *version;

        let mut dead: Vec<u64> = Vec::new();
        for (id, watch) in watches.iter_mut() {
            let relevant = watch.pending_retry || changed.iter().any(|name| watch.wants(name));
            if !relevant {
                continue;
            }
            let envelope = build_sotw_response(type_url, version, resources, &watch.names);
            match watch.tx.try_send(envelope) {
                Ok(()) => {
                    watch.known_version = version;
                    watch.pending_retry = false;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(%type_url, watch_id = id, "watch channel full, will retry on next transition");
                    watch.pending_retry = true;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
            }
        }
        for id in dead {
            watches.remove(&id);
        }

        let mut dead: Vec<u64> = Vec::new();
        for (id, watch) in delta_watches.iter_mut() {
            // After a failed send the delta is recomputed against everything
            // the watch could care about, not just this transition's names.
            let candidates: Vec<String> = if watch.pending_retry {
                let mut names: HashSet<String> = watch.known.keys().cloned().collect();
                names.extend(resources.keys().filter(|n| watch.wants(n)).cloned());
                names.into_iter().collect()
            } else {
                changed.iter().filter(|n| watch.wants(n)).cloned().collect()
            };

            let Some(envelope) = build_delta_response(type_url, version, resources, watch, &candidates)
            else {
                continue;
            };
            match watch.tx.try_send(envelope) {
                Ok(()) => {
                    watch.pending_retry = false;
                    absorb_delta(watch, resources, &candidates);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(%type_url, watch_id = id, "delta watch channel full, will retry on next transition");
                    watch.pending_retry = true;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
            }
        }
        for id in dead {
            delta_watches.remove(&id);
        }
    }
}

/// Full current view of the requested subset, resources ordered by name.
fn build_sotw_response(
    type_url: &TypeUrl,
    version: u64,
    resources: &HashMap<String, CachedEntry>,
    names: &[String],
) -> ResponseEnvelope {
    let mut selected: Vec<Resource> = if names.is_empty() {
        resources.values().map(|e| e.resource.clone()).collect()
    } else {
        names.iter().filter_map(|n| resources.get(n)).map(|e| e.resource.clone()).collect()
    };
    selected.sort_by(|a, b| a.name.cmp(&b.name));
    ResponseEnvelope { type_url: type_url.clone(), version: version.to_string(), resources: selected }
}

/// Delta of `candidates` against what the watch already knows. `None` when
/// the client is already current.
fn build_delta_response(
    type_url: &TypeUrl,
    version: u64,
    resources: &HashMap<String, CachedEntry>,
    watch: &DeltaWatch,
    candidates: &[String],
) -> Option<DeltaResponseEnvelope> {
    let mut added: Vec<(Resource, String)> = Vec::new();
    let mut removed: Vec<String> = Vec::new();
    for name in candidates {
        match resources.get(name) {
            Some(entry) => {
                if watch.known.get(name) != Some(&entry.version) {
                    added.push((entry.resource.clone(), entry.version.to_string()));
                }
            }
            None => {
                if watch.known.contains_key(name) {
                    removed.push(name.clone());
                }
            }
        }
    }
    if added.is_empty() && removed.is_empty() {
        return None;
    }
    added.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    removed.sort();
    Some(DeltaResponseEnvelope {
        type_url: type_url.clone(),
        system_version: version.to_string(),
        resources: added,
        removed,
    })
}

fn absorb_delta(watch: &mut DeltaWatch, resources: &HashMap<String, CachedEntry>, candidates: &[String]) {
    for name in candidates {
        match resources.get(name) {
            Some(entry) => {
                watch.known.insert(name.clone(), entry.version);
            }
            None => {
                watch.known.remove(name);
            }
        }
    }
}

impl DiscoveryCache for LinearCache {
    fn type_url(&self) -> &TypeUrl {
        &self.type_url
    }

    fn create_watch(&self, request: WatchRequest, tx: mpsc::Sender<ResponseEnvelope>) -> WatchId {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let id = state.next_watch_id;
        state.next_watch_id += 1;

        let known = request.known_version.parse::<u64>().unwrap_or(0);
        let mut watch = SotwWatch {
            names: request.resource_names,
            known_version: known,
            pending_retry: false,
            tx,
        };

        let respond = if state.version == known {
            // The request already acknowledges the current version.
            false
        } else if request.known_version.is_empty() {
            // Fresh client: initial sync as soon as we have ever held state.
            state.version > 0
        } else {
            view_changed(&state, &watch.names, known)
        };

        if respond {
            let envelope = build_sotw_response(&self.type_url, state.version, &state.resources, &watch.names);
            match watch.tx.try_send(envelope) {
                Ok(()) => watch.known_version = state.version,
                Err(mpsc::error::TrySendError::Full(_)) => watch.pending_retry = true,
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        state.watches.insert(id, watch);
        WatchId(id)
    }

    fn create_delta_watch(
        &self,
        request: DeltaWatchRequest,
        tx: mpsc::Sender<DeltaResponseEnvelope>,
    ) -> WatchId {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let id = state.next_watch_id;
        state.next_watch_id += 1;

        let known: HashMap<String, u64> = request
            .initial_versions
            .iter()
            .map(|(name, v)| (name.clone(), v.parse::<u64>().unwrap_or(0)))
            .collect();
        let mut watch =
            DeltaWatch { names: request.resource_names, known, pending_retry: false, tx };

        let candidates: Vec<String> = {
            let mut names: HashSet<String> = watch.known.keys().cloned().collect();
            names.extend(state.resources.keys().filter(|n| watch.wants(n)).cloned());
            names.into_iter().collect()
        };
        if let Some(envelope) =
            build_delta_response(&self.type_url, state.version, &state.resources, &watch, &candidates)
        {
            match watch.tx.try_send(envelope) {
                Ok(()) => absorb_delta(&mut watch, &state.resources, &candidates),
                Err(mpsc::error::TrySendError::Full(_)) => watch.pending_retry = true,
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        state.delta_watches.insert(id, watch);
        WatchId(id)
    }

    fn cancel_watch(&self, id: WatchId) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.watches.remove(&id.0);
        state.delta_watches.remove(&id.0);
    }

    fn fetch(&self, request: &WatchRequest) -> Option<ResponseEnvelope> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Some(build_sotw_response(&self.type_url, state.version, &state.resources, &request.resource_names))
    }

    fn watch_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.watches.len() + state.delta_watches.len()
    }
}

/// Would responding now tell this watch anything new relative to `known`?
fn view_changed(state: &State, names: &[String], known: u64) -> bool {
    if known > state.version {
        // Client is ahead of us (control plane restarted); resync it.
        return true;
    }
    if names.is_empty() {
        return state.resources.values().any(|e| e.version > known);
    }
    names.iter().any(|name| match state.resources.get(name) {
        Some(entry) => entry.version > known,
        // The name may have been removed since the client's version.
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn res(name: &str, payload: u32) -> Resource {
        Resource::encode(name, &TypeUrl::RouteConfig, &json!({ "payload": payload })).unwrap()
    }

    fn resource_map(entries: &[(&str, u32)]) -> HashMap<String, Resource> {
        entries.iter().map(|(n, p)| (n.to_string(), res(n, *p))).collect()
    }

    fn cache() -> LinearCache {
        LinearCache::new(TypeUrl::RouteConfig)
    }

    #[tokio::test]
    async fn test_new_watch_gets_immediate_response_when_behind() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        cache.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx);
        let resp = rx.try_recv().unwrap();
        assert_eq!(resp.version, "1");
        assert_eq!(resp.resources.len(), 1);
    }

    #[tokio::test]
    async fn test_watch_at_current_version_registers_silently() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let request = WatchRequest {
            type_url: TypeUrl::RouteConfig,
            resource_names: Vec::new(),
            known_version: "1".into(),
        };
        cache.create_watch(request, tx);
        assert!(rx.try_recv().is_err());
        assert_eq!(cache.watch_count(), 1);
    }

    #[tokio::test]
    async fn test_replacement_notifies_open_watches() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        cache.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx);
        rx.try_recv().unwrap();

        cache.set_resources(resource_map(&[("a", 2)])).unwrap();
        let resp = rx.try_recv().unwrap();
        assert_eq!(resp.version, "2");
    }

    #[tokio::test]
    async fn test_identical_replacement_notifies_nobody() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        cache.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx);
        rx.try_recv().unwrap();

        cache.set_resources(resource_map(&[("a", 1)])).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_named_watch_ignores_unrelated_changes() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1), ("b", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let request = WatchRequest {
            type_url: TypeUrl::RouteConfig,
            resource_names: vec!["a".into()],
            known_version: "1".into(),
        };
        cache.create_watch(request, tx);
        assert!(rx.try_recv().is_err());

        // Change only b: the named watch stays quiet.
        cache.set_resources(resource_map(&[("a", 1), ("b", 2)])).unwrap();
        assert!(rx.try_recv().is_err());

        // Change a: notified, and the response carries only a.
        cache.set_resources(resource_map(&[("a", 9), ("b", 2)])).unwrap();
        let resp = rx.try_recv().unwrap();
        assert_eq!(resp.resources.len(), 1);
        assert_eq!(resp.resources[0].name, "a");
    }

    #[tokio::test]
    async fn test_clearing_the_set_sends_removal_notification() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1), ("b", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        cache.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx);
        rx.try_recv().unwrap();

        cache.set_resources(HashMap::new()).unwrap();
        let resp = rx.try_recv().unwrap();
        assert_eq!(resp.version, "2");
        assert!(resp.resources.is_empty());
    }

    #[tokio::test]
    async fn test_full_channel_drops_then_retries_on_next_transition() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        cache.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx);
        // Channel now holds the initial sync; the next two transitions find
        // it full and flag the watch for retry.
        cache.set_resources(resource_map(&[("a", 2)])).unwrap();
        cache.set_resources(resource_map(&[("a", 3)])).unwrap();

        assert_eq!(rx.try_recv().unwrap().version, "1");
        assert!(rx.try_recv().is_err());

        // Draining made room: the next transition delivers the latest state,
        // not the missed intermediates.
        cache.set_resources(resource_map(&[("a", 4)])).unwrap();
        let resp = rx.try_recv().unwrap();
        assert_eq!(resp.version, "4");
    }

    #[tokio::test]
    async fn test_foreign_type_url_is_rejected() {
        let cache = cache();
        let mut bad = HashMap::new();
        bad.insert(
            "a".to_string(),
            Resource::encode("a", &TypeUrl::Secret, &json!({"x": 1})).unwrap(),
        );
        assert!(cache.set_resources(bad).is_err());
    }

    #[tokio::test]
    async fn test_cancel_watch_is_idempotent() {
        let cache = cache();
        let (tx, _rx) = mpsc::channel(4);
        let id = cache.create_watch(WatchRequest::all(TypeUrl::RouteConfig), tx);
        assert_eq!(cache.watch_count(), 1);
        cache.cancel_watch(id);
        cache.cancel_watch(id);
        assert_eq!(cache.watch_count(), 0);
    }

    #[tokio::test]
    async fn test_delta_watch_initial_and_incremental() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1), ("b", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        cache.create_delta_watch(
            DeltaWatchRequest { type_url: TypeUrl::RouteConfig, ..Default::default() },
            tx,
        );
        let initial = rx.try_recv().unwrap();
        assert_eq!(initial.resources.len(), 2);
        assert!(initial.removed.is_empty());

        // Only the changed resource travels.
        cache.set_resources(resource_map(&[("a", 2), ("b", 1)])).unwrap();
        let delta = rx.try_recv().unwrap();
        assert_eq!(delta.resources.len(), 1);
        assert_eq!(delta.resources[0].0.name, "a");

        // Removal names the dropped resource.
        cache.set_resources(resource_map(&[("a", 2)])).unwrap();
        let delta = rx.try_recv().unwrap();
        assert!(delta.resources.is_empty());
        assert_eq!(delta.removed, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_delta_watch_with_current_knowledge_stays_quiet() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1)])).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let mut initial = HashMap::new();
        initial.insert("a".to_string(), "1".to_string());
        cache.create_delta_watch(
            DeltaWatchRequest {
                type_url: TypeUrl::RouteConfig,
                resource_names: Vec::new(),
                initial_versions: initial,
            },
            tx,
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_version_is_strictly_monotonic() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1)])).unwrap();
        assert_eq!(cache.version(), "1");
        cache.set_resources(resource_map(&[("a", 2)])).unwrap();
        assert_eq!(cache.version(), "2");
        cache.delete_resource("a").unwrap();
        assert_eq!(cache.version(), "3");
    }

    #[tokio::test]
    async fn test_fetch_returns_current_subset() {
        let cache = cache();
        cache.set_resources(resource_map(&[("a", 1), ("b", 1)])).unwrap();
        let resp = cache.fetch(&WatchRequest::all(TypeUrl::RouteConfig)).unwrap();
        assert_eq!(resp.resources.len(), 2);
        assert_eq!(resp.version, "1");
    }
}
