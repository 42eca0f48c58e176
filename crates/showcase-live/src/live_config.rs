//! A configuration section kept in sync with the store.
//!
//! Mounting a [`LiveConfig`] subscribes to the section's change feed, then
//! reads the stored value. Both the read and every push are shallow-merged
//! over the caller's defaults. Each value carries its store revision and only
//! newer revisions are applied, so a slow initial read can never roll back a
//! value that was pushed while it was in flight.

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::{ConfigBackend, SectionSnapshot, Subscription};
use crate::merge::shallow_merge;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigState {
    pub config: Map<String, Value>,
    /// True until the initial read resolves, whatever its outcome.
    pub loading: bool,
    pub error: Option<String>,
}

impl ConfigState {
    fn initial(defaults: &Map<String, Value>) -> Self {
        Self {
            config: defaults.clone(),
            loading: true,
            error: None,
        }
    }
}

pub struct LiveConfig<B: ConfigBackend> {
    backend: Arc<B>,
    section: String,
    defaults: Map<String, Value>,
    state_tx: Arc<watch::Sender<ConfigState>>,
    mount: Option<Mount>,
}

struct Mount {
    live: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

/// Publishes state for one mount. Once the mount is torn down every update
/// is dropped.
#[derive(Clone)]
struct Publisher {
    live: Arc<Mutex<bool>>,
    state_tx: Arc<watch::Sender<ConfigState>>,
}

impl Publisher {
    fn update(&self, modify: impl FnOnce(&mut ConfigState)) -> bool {
        let live = self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !*live {
            return false;
        }
        self.state_tx.send_modify(modify);
        true
    }
}

impl<B: ConfigBackend> LiveConfig<B> {
    /// Start tracking `section`. Must be called inside a Tokio runtime.
    pub fn mount(backend: Arc<B>, section: impl Into<String>, defaults: Map<String, Value>) -> Self {
        let (state_tx, _) = watch::channel(ConfigState::initial(&defaults));
        let mut live_config = Self {
            backend,
            section: section.into(),
            defaults,
            state_tx: Arc::new(state_tx),
            mount: None,
        };
        live_config.start();
        live_config
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn state(&self) -> ConfigState {
        self.state_tx.borrow().clone()
    }

    pub fn config(&self) -> Map<String, Value> {
        self.state_tx.borrow().config.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_some()
    }

    /// Receiver that observes every published state.
    pub fn watch(&self) -> watch::Receiver<ConfigState> {
        self.state_tx.subscribe()
    }

    /// Switch to another section: tear down the current mount, reset to the
    /// defaults and mount again.
    pub fn set_section(&mut self, section: impl Into<String>) {
        let section = section.into();
        if section == self.section && self.mount.is_some() {
            return;
        }
        self.teardown();
        self.section = section;
        self.state_tx.send_replace(ConfigState::initial(&self.defaults));
        self.start();
    }

    /// Stop tracking. State stays at whatever was last published.
    pub fn unmount(&mut self) {
        self.teardown();
    }

    fn start(&mut self) {
        let live = Arc::new(Mutex::new(true));
        let publisher = Publisher {
            live: live.clone(),
            state_tx: self.state_tx.clone(),
        };
        let task = tokio::spawn(run(
            self.backend.clone(),
            self.section.clone(),
            self.defaults.clone(),
            publisher,
        ));
        self.mount = Some(Mount { live, task });
    }

    fn teardown(&mut self) {
        if let Some(mount) = self.mount.take() {
            *mount.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = false;
            // The task owns the subscription; aborting it drops the subscription.
            mount.task.abort();
            debug!("unmounted config section '{}'", self.section);
        }
    }
}

impl<B: ConfigBackend> Drop for LiveConfig<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run<B: ConfigBackend>(
    backend: Arc<B>,
    section: String,
    defaults: Map<String, Value>,
    publisher: Publisher,
) {
    // Subscribe before reading so no write can fall between the two.
    let mut subscription = match backend.subscribe(&section).await {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            warn!("could not subscribe to config section '{}': {}", section, e);
            None
        }
    };
    let mut feed_open = subscription.is_some();

    let read = backend.get(&section);
    tokio::pin!(read);
    let mut read_done = false;
    let mut applied: Option<u64> = None;

    loop {
        tokio::select! {
            result = &mut read, if !read_done => {
                read_done = true;
                match result {
                    Ok(Some(snapshot)) => {
                        let fresh = applied.is_none_or(|revision| snapshot.revision > revision);
                        if fresh {
                            applied = Some(snapshot.revision);
                        } else {
                            debug!(
                                "ignoring read of '{}' rev {}: rev {:?} already applied",
                                section, snapshot.revision, applied
                            );
                        }
                        let config = fresh.then(|| shallow_merge(&defaults, &snapshot.value));
                        publisher.update(|state| {
                            if let Some(config) = config {
                                state.config = config;
                            }
                            state.loading = false;
                            state.error = None;
                        });
                    }
                    Ok(None) => {
                        debug!("config section '{}' not stored, using defaults", section);
                        publisher.update(|state| {
                            state.loading = false;
                            state.error = None;
                        });
                    }
                    Err(e) => {
                        warn!("failed to load config section '{}': {}", section, e);
                        let message = e.to_string();
                        publisher.update(|state| {
                            state.loading = false;
                            state.error = Some(message);
                        });
                    }
                }
            }
            update = next_update(&mut subscription), if feed_open => {
                match update {
                    Some(snapshot) => {
                        if applied.is_some_and(|revision| snapshot.revision <= revision) {
                            debug!("ignoring stale push of '{}' rev {}", section, snapshot.revision);
                            continue;
                        }
                        applied = Some(snapshot.revision);
                        let config = shallow_merge(&defaults, &snapshot.value);
                        publisher.update(|state| state.config = config);
                    }
                    None => {
                        debug!("change feed for '{}' ended", section);
                        feed_open = false;
                    }
                }
            }
            else => break,
        }
    }
}

async fn next_update(subscription: &mut Option<Subscription>) -> Option<SectionSnapshot> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::{mpsc, oneshot};

    use crate::error::BackendError;

    type ReadResult = Result<Option<SectionSnapshot>, BackendError>;

    /// Backend whose read and pushes are driven by the test.
    struct MockBackend {
        read: Mutex<Option<oneshot::Receiver<ReadResult>>>,
        pushes: Mutex<Option<mpsc::UnboundedReceiver<SectionSnapshot>>>,
        subscribes: AtomicUsize,
        unsubscribes: Arc<AtomicUsize>,
    }

    struct Controls {
        read: oneshot::Sender<ReadResult>,
        push: mpsc::UnboundedSender<SectionSnapshot>,
    }

    fn mock() -> (Arc<MockBackend>, Controls) {
        let (read_tx, read_rx) = oneshot::channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let backend = MockBackend {
            read: Mutex::new(Some(read_rx)),
            pushes: Mutex::new(Some(push_rx)),
            subscribes: AtomicUsize::new(0),
            unsubscribes: Arc::new(AtomicUsize::new(0)),
        };
        let controls = Controls {
            read: read_tx,
            push: push_tx,
        };
        (Arc::new(backend), controls)
    }

    impl ConfigBackend for MockBackend {
        async fn get(&self, _section: &str) -> ReadResult {
            let read = self.read.lock().unwrap().take();
            match read {
                Some(rx) => rx.await.unwrap_or(Ok(None)),
                None => Ok(None),
            }
        }

        async fn subscribe(&self, _section: &str) -> Result<Subscription, BackendError> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            let rx = self
                .pushes
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| mpsc::unbounded_channel().1);
            let unsubscribes = self.unsubscribes.clone();
            Ok(Subscription::new(rx, move || {
                unsubscribes.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    fn defaults() -> Map<String, Value> {
        json!({ "title": "Welcome", "show_banner": true })
            .as_object()
            .unwrap()
            .clone()
    }

    fn snapshot(value: Value, revision: u64) -> SectionSnapshot {
        SectionSnapshot { value, revision }
    }

    async fn wait_until(live: &LiveConfig<MockBackend>, check: impl Fn(&ConfigState) -> bool) -> ConfigState {
        let mut rx = live.watch();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|state| check(state)))
            .await
            .expect("state never reached")
            .expect("sender dropped")
            .clone()
    }

    async fn wait_for_count(counter: &AtomicUsize, expected: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn starts_loading_with_defaults() {
        let (backend, _controls) = mock();
        let live = LiveConfig::mount(backend, "hero", defaults());
        let state = live.state();
        assert!(state.loading);
        assert_eq!(state.config, defaults());
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn not_found_resolves_to_defaults() {
        let (backend, controls) = mock();
        let live = LiveConfig::mount(backend, "hero", defaults());
        controls.read.send(Ok(None)).unwrap();

        let state = wait_until(&live, |s| !s.loading).await;
        assert_eq!(state.config, defaults());
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn stored_value_is_merged_over_defaults() {
        let (backend, controls) = mock();
        let live = LiveConfig::mount(backend, "hero", defaults());
        controls
            .read
            .send(Ok(Some(snapshot(json!({ "title": "Spring drop" }), 3))))
            .unwrap();

        let state = wait_until(&live, |s| !s.loading).await;
        assert_eq!(state.config["title"], "Spring drop");
        assert_eq!(state.config["show_banner"], true);
    }

    #[tokio::test]
    async fn push_applies_before_read_resolves() {
        let (backend, controls) = mock();
        let live = LiveConfig::mount(backend, "hero", defaults());
        controls.push.send(snapshot(json!({ "title": "Pushed" }), 2)).unwrap();

        let state = wait_until(&live, |s| s.config["title"] == "Pushed").await;
        assert!(state.loading);
    }

    #[tokio::test]
    async fn late_read_does_not_overwrite_newer_push() {
        let (backend, controls) = mock();
        let live = LiveConfig::mount(backend, "hero", defaults());
        controls.push.send(snapshot(json!({ "title": "Pushed" }), 2)).unwrap();
        wait_until(&live, |s| s.config["title"] == "Pushed").await;

        controls
            .read
            .send(Ok(Some(snapshot(json!({ "title": "Stale" }), 1))))
            .unwrap();
        let state = wait_until(&live, |s| !s.loading).await;
        assert_eq!(state.config["title"], "Pushed");
    }

    #[tokio::test]
    async fn late_not_found_keeps_pushed_value() {
        let (backend, controls) = mock();
        let live = LiveConfig::mount(backend, "hero", defaults());
        controls.push.send(snapshot(json!({ "title": "Pushed" }), 1)).unwrap();
        wait_until(&live, |s| s.config["title"] == "Pushed").await;

        controls.read.send(Ok(None)).unwrap();
        let state = wait_until(&live, |s| !s.loading).await;
        assert_eq!(state.config["title"], "Pushed");
    }

    #[tokio::test]
    async fn pushes_after_read_replace_config() {
        let (backend, controls) = mock();
        let live = LiveConfig::mount(backend, "hero", defaults());
        controls
            .read
            .send(Ok(Some(snapshot(json!({ "title": "First" }), 1))))
            .unwrap();
        wait_until(&live, |s| !s.loading).await;

        controls.push.send(snapshot(json!({ "show_banner": false }), 2)).unwrap();
        let state = wait_until(&live, |s| s.config["show_banner"] == false).await;
        // Each push is merged over the defaults, not over the previous value.
        assert_eq!(state.config["title"], "Welcome");
    }

    #[tokio::test]
    async fn read_failure_surfaces_error_and_keeps_defaults() {
        let (backend, controls) = mock();
        let live = LiveConfig::mount(backend, "hero", defaults());
        controls.read.send(Err(BackendError::Status(500))).unwrap();

        let state = wait_until(&live, |s| !s.loading).await;
        assert_eq!(state.config, defaults());
        assert!(state.error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn drop_unsubscribes_exactly_once() {
        let (backend, _controls) = mock();
        let live = LiveConfig::mount(backend.clone(), "hero", defaults());
        wait_for_count(&backend.subscribes, 1).await;

        drop(live);
        wait_for_count(&backend.unsubscribes, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.unsubscribes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_updates_after_unmount() {
        let (backend, controls) = mock();
        let mut live = LiveConfig::mount(backend.clone(), "hero", defaults());
        wait_for_count(&backend.subscribes, 1).await;
        let mut rx = live.watch();

        live.unmount();
        assert!(!live.is_mounted());
        let _ = controls.push.send(snapshot(json!({ "title": "Late" }), 5));
        let _ = controls.read.send(Ok(Some(snapshot(json!({ "title": "Late" }), 5))));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(live.state(), ConfigState::initial(&defaults()));
        assert_eq!(backend.unsubscribes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn set_section_remounts() {
        let (backend, controls) = mock();
        let mut live = LiveConfig::mount(backend.clone(), "hero", defaults());
        controls
            .read
            .send(Ok(Some(snapshot(json!({ "title": "Hero" }), 1))))
            .unwrap();
        wait_until(&live, |s| !s.loading).await;

        live.set_section("footer");
        assert_eq!(live.section(), "footer");
        assert_eq!(live.config(), defaults());

        let state = wait_until(&live, |s| !s.loading).await;
        assert_eq!(state.config, defaults());
        wait_for_count(&backend.unsubscribes, 1).await;
        assert_eq!(backend.subscribes.load(Ordering::SeqCst), 2);
        assert_eq!(backend.unsubscribes.load(Ordering::SeqCst), 1);
    }
}
