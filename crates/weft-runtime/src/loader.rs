//! Lazy, deduplicated, asynchronous resource loading.
//!
//! The loader guarantees that each distinct resource key (a module id or a
//! style file path) is fetched at most once per render session, no matter
//! how many components request it concurrently. Callers asking for a module
//! that is already being fetched queue behind the in-flight fetch and are
//! released in registration order once the module's code has executed and
//! registered its definitions.
//!
//! Module failures and style failures are treated differently: a module
//! that cannot be fetched or executed poisons the whole session (its
//! definitions are load-bearing), while a style that fails to fetch is
//! logged and counted as settled so a missing stylesheet can never block
//! the completion signal. Nothing is retried; a fetch happens exactly once
//! per key per session.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, watch};
use weft_core::{ComponentMetadata, ResourcePaths, Result, TextFetcher, WeftError};

use crate::registry::ComponentRegistry;
use crate::sandbox::{Sandbox, StagedRegistration};
use crate::stats::{LoaderStats, StatsSnapshot};
use crate::tracker::LoadTracker;

type LoadedCallback = Box<dyn FnOnce(Arc<ComponentMetadata>, HashMap<String, String>) + Send>;

struct LoaderState {
    /// Modules whose code has executed and registered. Never shrinks.
    loaded_modules: HashSet<String>,
    /// FIFO waiter queues, keyed by module id. A key is present exactly
    /// while a fetch for that module is outstanding.
    module_waiters: HashMap<String, Vec<oneshot::Sender<Result<()>>>>,
    /// Style file path to fetched content. Entries are never evicted.
    style_cache: HashMap<String, String>,
    /// Style file paths with an outstanding fetch.
    pending_styles: HashSet<String>,
    /// First fatal error recorded for this session, if any.
    fatal: Option<WeftError>,
}

struct LoaderInner {
    fetcher: Arc<dyn TextFetcher>,
    paths: ResourcePaths,
    registry: Arc<ComponentRegistry>,
    sandbox: Sandbox,
    tracker: Arc<LoadTracker>,
    stats: Arc<LoaderStats>,
    state: Mutex<LoaderState>,
    fatal_tx: watch::Sender<Option<WeftError>>,
    on_loaded: Mutex<Option<LoadedCallback>>,
}

/// Per-session resource loader. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct ResourceLoader {
    inner: Arc<LoaderInner>,
}

impl ResourceLoader {
    pub(crate) fn new(
        fetcher: Arc<dyn TextFetcher>,
        paths: ResourcePaths,
        registry: Arc<ComponentRegistry>,
        tracker: Arc<LoadTracker>,
        sandbox: Sandbox,
        stats: Arc<LoaderStats>,
    ) -> Self {
        let (fatal_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(LoaderInner {
                fetcher,
                paths,
                registry,
                sandbox,
                tracker,
                stats,
                state: Mutex::new(LoaderState {
                    loaded_modules: HashSet::new(),
                    module_waiters: HashMap::new(),
                    style_cache: HashMap::new(),
                    pending_styles: HashSet::new(),
                    fatal: None,
                }),
                fatal_tx,
                on_loaded: Mutex::new(None),
            }),
        }
    }

    /// Ensures a component's module is available.
    ///
    /// Components with an embedded class resolve immediately with no fetch;
    /// components without a module have nothing to load.
    pub async fn ensure_component_loaded(&self, metadata: &ComponentMetadata) -> Result<()> {
        if metadata.is_embedded() {
            self.inner.stats.record_embedded_hit();
            return Ok(());
        }
        match &metadata.module {
            Some(module_id) => self.ensure_module_loaded(module_id).await,
            None => Ok(()),
        }
    }

    /// Ensures a module's code has been fetched, executed and registered.
    ///
    /// Already-loaded modules resolve without suspending. Otherwise the
    /// caller queues behind the (single) fetch for this module; queued
    /// callers are released in registration order after the module's
    /// registrations have been committed to the registry.
    ///
    /// # Errors
    ///
    /// Resolves with the session's fatal error if the fetch or the module's
    /// execution fails, or if the session was already poisoned.
    pub async fn ensure_module_loaded(&self, module_id: &str) -> Result<()> {
        let (waiter, start_fetch) = {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(fatal) = &state.fatal {
                return Err(fatal.clone());
            }
            if state.loaded_modules.contains(module_id) {
                self.inner.stats.record_module_cache_hit();
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            let start_fetch = !state.module_waiters.contains_key(module_id);
            state
                .module_waiters
                .entry(module_id.to_string())
                .or_default()
                .push(tx);
            (rx, start_fetch)
        };

        if start_fetch {
            self.inner.stats.record_module_fetch();
            let loader = self.clone();
            let module_id = module_id.to_string();
            tokio::spawn(async move { loader.fetch_and_execute(module_id).await });
        }

        match waiter.await {
            Ok(result) => result,
            Err(_) => Err(self.fatal_or_aborted()),
        }
    }

    /// Ensures a component's style sheet for the given visual mode is
    /// loaded or loading.
    ///
    /// Resolves the style id with the default-mode fallback; no-ops when
    /// the component has no style for this mode or the sheet is already
    /// cached. The fetch itself runs in the background: completion is
    /// observed through the load tracker, never awaited here. Must be
    /// called from within a Tokio runtime.
    pub fn ensure_style_loaded(&self, metadata: &ComponentMetadata, visual_mode: &str) {
        let Some(style_id) = metadata.style_for_mode(visual_mode) else {
            return;
        };
        let path = self.inner.paths.style_path(style_id);
        let key = path.to_string_lossy().into_owned();

        {
            let mut state = self.inner.state.lock().unwrap();
            if state.fatal.is_some() {
                return;
            }
            if state.style_cache.contains_key(&key) {
                self.inner.stats.record_style_cache_hit();
                return;
            }
            if !state.pending_styles.insert(key.clone()) {
                // A fetch for this sheet is already in flight.
                return;
            }
            // Count the sheet before the lock drops; a settle on another
            // task must never find it pending but uncounted.
            self.inner.stats.record_style_fetch();
            self.inner.tracker.style_started();
        }

        let loader = self.clone();
        tokio::spawn(async move { loader.fetch_style(key, path).await });
    }

    /// Marks the document root as having begun loading.
    pub fn mark_root_loading(&self) {
        tracing::debug!("Document root load started");
        self.inner.tracker.mark_root_started();
    }

    /// Registers the completion consumer.
    ///
    /// Invoked exactly once, with the root metadata and a snapshot of every
    /// loaded style sheet, when the completion signal fires. A consumer
    /// registered after the signal has already fired runs immediately. A
    /// session that has recorded a fatal error never invokes the consumer.
    pub fn on_loaded<F>(&self, callback: F)
    where
        F: FnOnce(Arc<ComponentMetadata>, HashMap<String, String>) + Send + 'static,
    {
        if self.inner.state.lock().unwrap().fatal.is_some() {
            return;
        }
        {
            let mut slot = self.inner.on_loaded.lock().unwrap();
            if !self.inner.tracker.is_loaded() {
                *slot = Some(Box::new(callback));
                return;
            }
        }
        callback(self.inner.registry.root(), self.style_sheets());
    }

    /// Waits until the completion signal fires, returning the loaded style
    /// sheets.
    ///
    /// A session that never requests a style never fires the signal; the
    /// caller is expected to know whether styles are in play (or to bound
    /// the wait).
    ///
    /// # Errors
    ///
    /// Resolves with the session's fatal error as soon as one is recorded.
    pub async fn wait_until_loaded(&self) -> Result<HashMap<String, String>> {
        let mut loaded_rx = self.inner.tracker.subscribe();
        let mut fatal_rx = self.inner.fatal_tx.subscribe();

        loop {
            if let Some(fatal) = fatal_rx.borrow().clone() {
                return Err(fatal);
            }
            if *loaded_rx.borrow() {
                return Ok(self.style_sheets());
            }

            tokio::select! {
                changed = loaded_rx.changed() => {
                    if changed.is_err() {
                        return Err(self.fatal_or_aborted());
                    }
                }
                changed = fatal_rx.changed() => {
                    if changed.is_err() {
                        return Err(self.fatal_or_aborted());
                    }
                }
            }
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    pub fn is_module_loaded(&self, module_id: &str) -> bool {
        self.inner
            .state
            .lock()
            .unwrap()
            .loaded_modules
            .contains(module_id)
    }

    /// Snapshot of every style sheet loaded so far, keyed by file path.
    pub fn style_sheets(&self) -> HashMap<String, String> {
        self.inner.state.lock().unwrap().style_cache.clone()
    }

    pub fn pending_style_count(&self) -> usize {
        self.inner.tracker.pending_styles()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.tracker.is_loaded()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    async fn fetch_and_execute(&self, module_id: String) {
        let path = self.inner.paths.module_path(&module_id);
        tracing::debug!("Fetching module '{}' from {}", module_id, path.display());

        let source = match self.inner.fetcher.read_text(&path).await {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Module '{}' fetch failed: {}", module_id, e);
                self.poison(e);
                return;
            }
        };

        match self.inner.sandbox.execute(&module_id, source).await {
            Ok(staged) => self.commit_registrations(&module_id, staged),
            Err(e) => {
                tracing::error!("Module '{}' execution failed: {}", module_id, e);
                self.poison(e);
            }
        }
    }

    /// Commits the registrations a module staged during execution.
    ///
    /// Per registration: descriptors are parsed into metadata, inserted
    /// into the registry, the module is marked loaded, and only then is its
    /// waiter queue drained, so a released caller always finds the
    /// metadata present.
    fn commit_registrations(&self, fetched_module: &str, staged: Vec<StagedRegistration>) {
        if !staged.iter().any(|r| r.module_id == fetched_module) {
            tracing::warn!(
                "Module '{}' executed without registering itself; its waiters stay queued",
                fetched_module
            );
        }

        for registration in staged {
            let mut parsed = Vec::with_capacity(registration.descriptors.len());
            for descriptor in registration.descriptors {
                match serde_json::from_value::<ComponentMetadata>(descriptor) {
                    Ok(metadata) => parsed.push(metadata),
                    Err(e) => {
                        let err = WeftError::Descriptor(format!(
                            "module '{}': {}",
                            registration.module_id, e
                        ));
                        tracing::error!("{}", err);
                        self.poison(err);
                        return;
                    }
                }
            }

            for metadata in parsed {
                tracing::debug!(
                    "Registering component <{}> from module '{}'",
                    metadata.tag,
                    registration.module_id
                );
                self.inner.registry.define(metadata);
            }
            self.inner.stats.record_module_registered();

            let waiters = {
                let mut state = self.inner.state.lock().unwrap();
                state.loaded_modules.insert(registration.module_id.clone());
                state
                    .module_waiters
                    .remove(&registration.module_id)
                    .unwrap_or_default()
            };
            for waiter in waiters {
                let _ = waiter.send(Ok(()));
            }
        }
    }

    async fn fetch_style(&self, key: String, path: PathBuf) {
        let fired = match self.inner.fetcher.read_text(&path).await {
            Ok(content) => {
                {
                    let mut state = self.inner.state.lock().unwrap();
                    state.style_cache.insert(key.clone(), content);
                    state.pending_styles.remove(&key);
                }
                tracing::debug!("Style sheet {} loaded", key);
                self.inner.tracker.style_settled()
            }
            Err(e) => {
                // Non-fatal: a missing stylesheet must not block the
                // completion signal.
                tracing::error!("Style sheet {} failed to load: {}", key, e);
                self.inner.stats.record_style_fetch_failure();
                {
                    let mut state = self.inner.state.lock().unwrap();
                    state.pending_styles.remove(&key);
                }
                self.inner.tracker.style_settled()
            }
        };

        if fired {
            self.finish_load();
        }
    }

    fn finish_load(&self) {
        // A poisoned session never reports a completed load; waiters see
        // the fatal error instead.
        if self.inner.state.lock().unwrap().fatal.is_some() {
            tracing::debug!("Completion signal fired after a fatal error; consumer skipped");
            return;
        }
        let styles = self.style_sheets();
        tracing::info!("Application load complete ({} style sheets)", styles.len());
        let callback = self.inner.on_loaded.lock().unwrap().take();
        if let Some(callback) = callback {
            callback(self.inner.registry.root(), styles);
        }
    }

    /// Records the session's first fatal error and fails every queued
    /// waiter with it. Later fatal errors keep the first one.
    fn poison(&self, err: WeftError) {
        let (fatal, first, waiters) = {
            let mut state = self.inner.state.lock().unwrap();
            let first = state.fatal.is_none();
            let fatal = state.fatal.get_or_insert(err).clone();
            let waiters: Vec<_> = state
                .module_waiters
                .drain()
                .flat_map(|(_, waiters)| waiters)
                .collect();
            (fatal, first, waiters)
        };

        for waiter in waiters {
            let _ = waiter.send(Err(fatal.clone()));
        }
        if first {
            self.inner.fatal_tx.send_replace(Some(fatal));
        }
    }

    fn fatal_or_aborted(&self) -> WeftError {
        self.inner
            .state
            .lock()
            .unwrap()
            .fatal
            .clone()
            .unwrap_or_else(|| WeftError::Aborted("render session dropped".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Duration;
    use weft_core::{ComponentClass, MemoryFetcher, ResourceLimits, DEFAULT_MODE};

    fn test_loader() -> (ResourceLoader, Arc<MemoryFetcher>) {
        let fetcher = Arc::new(MemoryFetcher::new());
        let loader = ResourceLoader::new(
            fetcher.clone(),
            ResourcePaths::new("/dist"),
            Arc::new(ComponentRegistry::new()),
            Arc::new(LoadTracker::new()),
            Sandbox::new(ResourceLimits::default(), serde_json::Map::new()),
            Arc::new(LoaderStats::default()),
        );
        (loader, fetcher)
    }

    const M1_SOURCE: &str =
        "weft.register('m1', null, { tag: 'x-a', module: 'm1', styles: { $: 's1' } });";

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/m1.js", M1_SOURCE);

        let first = loader.ensure_module_loaded("m1");
        let second = loader.ensure_module_loaded("m1");
        let (first, second) = tokio::join!(first, second);

        first.unwrap();
        second.unwrap();
        assert_eq!(fetcher.read_count(), 1);
        // The registration landed before either caller was released.
        assert!(loader.registry().lookup("x-a").is_some());
        assert!(loader.is_module_loaded("m1"));
    }

    #[tokio::test]
    async fn test_waiters_release_in_registration_order() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/m1.js", M1_SOURCE);

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..4 {
            let loader = loader.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                loader.ensure_module_loaded("m1").await.unwrap();
                order.lock().unwrap().push(i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(fetcher.read_count(), 1);
    }

    #[tokio::test]
    async fn test_loaded_module_resolves_without_suspending() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/m1.js", M1_SOURCE);
        loader.ensure_module_loaded("m1").await.unwrap();

        let result = loader.ensure_module_loaded("m1").now_or_never();
        assert!(matches!(result, Some(Ok(()))));
        assert_eq!(fetcher.read_count(), 1);
        assert_eq!(loader.stats().module_cache_hits, 1);
    }

    #[tokio::test]
    async fn test_embedded_class_skips_loading() {
        let (loader, fetcher) = test_loader();
        let metadata = ComponentMetadata::new("x-e")
            .with_module("never-fetched")
            .with_class(ComponentClass::new("Embedded"));

        let result = loader.ensure_component_loaded(&metadata).now_or_never();
        assert!(matches!(result, Some(Ok(()))));
        assert_eq!(fetcher.read_count(), 0);
        assert_eq!(loader.stats().embedded_hits, 1);
    }

    #[tokio::test]
    async fn test_component_without_module_has_nothing_to_load() {
        let (loader, fetcher) = test_loader();
        let metadata = ComponentMetadata::new("x-bare");

        loader.ensure_component_loaded(&metadata).await.unwrap();
        assert_eq!(fetcher.read_count(), 0);
    }

    #[tokio::test]
    async fn test_module_fetch_failure_poisons_the_session() {
        let (loader, _fetcher) = test_loader();

        let result = loader.ensure_module_loaded("m1").await;
        assert!(matches!(result, Err(WeftError::Fetch(_))));

        // Subsequent requests and observers see the recorded error.
        let later = loader.ensure_module_loaded("m2").await;
        assert!(matches!(later, Err(WeftError::Fetch(_))));
        let waited = loader.wait_until_loaded().await;
        assert!(matches!(waited, Err(WeftError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_module_fetch_failure_fails_all_queued_waiters() {
        let (loader, _fetcher) = test_loader();

        let first = loader.ensure_module_loaded("m1");
        let second = loader.ensure_module_loaded("m1");
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, Err(WeftError::Fetch(_))));
        assert!(matches!(second, Err(WeftError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_throwing_module_poisons_the_session() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/m1.js", "throw new Error('broken');");

        let result = loader.ensure_module_loaded("m1").await;
        assert!(matches!(result, Err(WeftError::Execution(_))));
    }

    #[tokio::test]
    async fn test_unparseable_descriptor_poisons_the_session() {
        let (loader, fetcher) = test_loader();
        // Descriptor without a tag cannot become component metadata.
        fetcher.insert("/dist/m1.js", "weft.register('m1', null, { module: 'm1' });");

        let result = loader.ensure_module_loaded("m1").await;
        assert!(matches!(result, Err(WeftError::Descriptor(_))));
    }

    #[tokio::test]
    async fn test_module_that_never_registers_itself_leaves_waiters_queued() {
        let (loader, fetcher) = test_loader();
        fetcher.insert(
            "/dist/m1.js",
            "weft.register('other', null, { tag: 'x-o', module: 'other' });",
        );

        let handle = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.ensure_module_loaded("m1").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!handle.is_finished());
        assert!(loader.is_module_loaded("other"));
        assert!(!loader.is_module_loaded("m1"));
        assert!(loader.registry().lookup("x-o").is_some());
        handle.abort();
    }

    #[tokio::test]
    async fn test_style_requests_share_one_fetch() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/s1.css", ".x-a { color: red; }");
        let metadata = ComponentMetadata::new("x-a").with_style(DEFAULT_MODE, "s1");

        loader.mark_root_loading();
        loader.ensure_style_loaded(&metadata, DEFAULT_MODE);
        loader.ensure_style_loaded(&metadata, DEFAULT_MODE);

        let styles = loader.wait_until_loaded().await.unwrap();
        assert_eq!(fetcher.read_count(), 1);
        assert_eq!(
            styles.get("/dist/s1.css").map(String::as_str),
            Some(".x-a { color: red; }")
        );

        // Cached sheet: a later request is a no-op.
        loader.ensure_style_loaded(&metadata, DEFAULT_MODE);
        assert_eq!(fetcher.read_count(), 1);
        assert_eq!(loader.stats().style_cache_hits, 1);
    }

    #[tokio::test]
    async fn test_style_fetch_failure_still_completes_the_load() {
        let (loader, fetcher) = test_loader();
        let metadata = ComponentMetadata::new("x-a").with_style(DEFAULT_MODE, "s1");

        loader.mark_root_loading();
        loader.ensure_style_loaded(&metadata, DEFAULT_MODE);

        let styles = loader.wait_until_loaded().await.unwrap();
        assert!(styles.is_empty());
        assert_eq!(fetcher.read_count(), 1);
        assert_eq!(loader.stats().style_fetch_failures, 1);
        assert_eq!(loader.pending_style_count(), 0);
    }

    #[tokio::test]
    async fn test_unstyled_component_is_a_noop() {
        let (loader, fetcher) = test_loader();
        let metadata = ComponentMetadata::new("x-bare").with_module("m1");

        loader.mark_root_loading();
        loader.ensure_style_loaded(&metadata, "dark");

        assert_eq!(fetcher.read_count(), 0);
        assert_eq!(loader.pending_style_count(), 0);
        assert!(!loader.is_loaded());
    }

    #[tokio::test]
    async fn test_mode_fallback_selects_default_style() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/s1.css", ".x-a {}");
        let metadata = ComponentMetadata::new("x-a").with_style(DEFAULT_MODE, "s1");

        loader.mark_root_loading();
        loader.ensure_style_loaded(&metadata, "dark");

        let styles = loader.wait_until_loaded().await.unwrap();
        assert!(styles.contains_key("/dist/s1.css"));
    }

    #[tokio::test]
    async fn test_completion_consumer_runs_once_with_snapshot() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/s1.css", ".x-a {}");
        let metadata = ComponentMetadata::new("x-a").with_style(DEFAULT_MODE, "s1");

        let seen = Arc::new(Mutex::new(None));
        {
            let seen = seen.clone();
            loader.on_loaded(move |root, styles| {
                *seen.lock().unwrap() = Some((root.tag.clone(), styles.len()));
            });
        }

        loader.mark_root_loading();
        loader.ensure_style_loaded(&metadata, DEFAULT_MODE);
        loader.wait_until_loaded().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            Some(("#document".to_string(), 1))
        );
    }

    #[tokio::test]
    async fn test_consumer_registered_after_completion_runs_immediately() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/s1.css", ".x-a {}");
        let metadata = ComponentMetadata::new("x-a").with_style(DEFAULT_MODE, "s1");

        loader.mark_root_loading();
        loader.ensure_style_loaded(&metadata, DEFAULT_MODE);
        loader.wait_until_loaded().await.unwrap();

        let seen = Arc::new(Mutex::new(false));
        {
            let seen = seen.clone();
            loader.on_loaded(move |_, _| *seen.lock().unwrap() = true);
        }
        assert!(*seen.lock().unwrap());
    }

    #[tokio::test]
    async fn test_style_request_is_counted_before_an_overlapping_settle() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/s2.css", ".x-b {}");
        let metadata = ComponentMetadata::new("x-b").with_style(DEFAULT_MODE, "s2");

        loader.mark_root_loading();
        // One sheet already counted and in flight elsewhere.
        loader.inner.tracker.style_started();

        // By the time the request returns, the new sheet is counted too.
        loader.ensure_style_loaded(&metadata, DEFAULT_MODE);
        assert_eq!(loader.pending_style_count(), 2);

        // The first sheet settles while s2 is still pending; the signal
        // must hold until s2 resolves and the snapshot must include it.
        assert!(!loader.inner.tracker.style_settled());
        assert!(!loader.is_loaded());

        let styles = loader.wait_until_loaded().await.unwrap();
        assert!(styles.contains_key("/dist/s2.css"));
        assert!(loader.is_loaded());
    }

    #[tokio::test]
    async fn test_fatal_error_suppresses_the_completion_consumer() {
        let (loader, fetcher) = test_loader();
        fetcher.insert("/dist/s1.css", ".x-a {}");
        let metadata = ComponentMetadata::new("x-a").with_style(DEFAULT_MODE, "s1");

        let invoked = Arc::new(Mutex::new(false));
        {
            let invoked = invoked.clone();
            loader.on_loaded(move |_, _| *invoked.lock().unwrap() = true);
        }

        loader.mark_root_loading();
        loader.ensure_style_loaded(&metadata, DEFAULT_MODE);
        // The session is poisoned while the style fetch is still in flight.
        loader.poison(WeftError::Fetch("dist tree unreachable".into()));

        // Let the style settle. The latch fires internally, but a poisoned
        // session never reports a completed load.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(loader.is_loaded());
        assert!(!*invoked.lock().unwrap());

        let waited = loader.wait_until_loaded().await;
        assert!(matches!(waited, Err(WeftError::Fetch(_))));

        // A consumer registered after the fact stays silent as well.
        let late = Arc::new(Mutex::new(false));
        {
            let late = late.clone();
            loader.on_loaded(move |_, _| *late.lock().unwrap() = true);
        }
        assert!(!*late.lock().unwrap());
    }
}
