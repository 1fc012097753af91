//! Render session assembly.
//!
//! A [`RenderSession`] wires one registry, one sandbox and one loader
//! together and owns them for the lifetime of a single server-side render.
//! Sessions share nothing: module and style caches, the completion signal
//! and any fatal error all die with the session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use weft_core::{
    ComponentMetadata, FsFetcher, ResourceLimits, ResourcePaths, Result, TextFetcher, WeftError,
    DEFAULT_MODE,
};

use crate::loader::ResourceLoader;
use crate::registry::ComponentRegistry;
use crate::sandbox::Sandbox;
use crate::stats::{LoaderStats, StatsSnapshot};
use crate::tracker::LoadTracker;

/// Configuration for one render session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Build output tree the session reads modules and styles from.
    pub paths: ResourcePaths,
    /// Execution bounds for sandboxed module code.
    pub limits: ResourceLimits,
    /// Visual mode used to select component style sheets.
    pub visual_mode: String,
    /// Data exposed to module code as `weft.session`.
    pub session_data: serde_json::Map<String, serde_json::Value>,
}

impl SessionConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: ResourcePaths::new(root),
            limits: ResourceLimits::default(),
            visual_mode: DEFAULT_MODE.to_string(),
            session_data: serde_json::Map::new(),
        }
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_visual_mode(mut self, mode: impl Into<String>) -> Self {
        self.visual_mode = mode.into();
        self
    }

    pub fn with_session_data(mut self, data: serde_json::Map<String, serde_json::Value>) -> Self {
        self.session_data = data;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::Config`] if the limits are invalid or the visual
    /// mode is empty.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate().map_err(WeftError::Config)?;
        if self.visual_mode.is_empty() {
            return Err(WeftError::Config(
                "visual mode must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One server-side render: a component registry, a sandbox and a resource
/// loader with a shared lifetime.
pub struct RenderSession {
    config: SessionConfig,
    registry: Arc<ComponentRegistry>,
    loader: ResourceLoader,
}

impl RenderSession {
    /// Creates a session that reads resources from the local filesystem.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_fetcher(config, Arc::new(FsFetcher))
    }

    /// Creates a session with a custom resource fetcher.
    pub fn with_fetcher(config: SessionConfig, fetcher: Arc<dyn TextFetcher>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ComponentRegistry::new());
        let tracker = Arc::new(LoadTracker::new());
        let stats = Arc::new(LoaderStats::default());
        let sandbox = Sandbox::new(config.limits.clone(), config.session_data.clone());
        let loader = ResourceLoader::new(
            fetcher,
            config.paths.clone(),
            registry.clone(),
            tracker,
            sandbox,
            stats,
        );

        Ok(Self {
            config,
            registry,
            loader,
        })
    }

    /// Defines a component, replacing any previous definition for its tag.
    pub fn define(&self, metadata: ComponentMetadata) {
        self.registry.define(metadata);
    }

    /// Looks up a component definition by tag name.
    pub fn lookup(&self, tag: &str) -> Option<Arc<ComponentMetadata>> {
        self.registry.lookup(tag)
    }

    /// The current document root definition.
    pub fn root(&self) -> Arc<ComponentMetadata> {
        self.registry.root()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn visual_mode(&self) -> &str {
        &self.config.visual_mode
    }

    /// Marks the document root as having begun loading.
    pub fn mark_root_loading(&self) {
        self.loader.mark_root_loading();
    }

    /// Ensures a component's module is available. See
    /// [`ResourceLoader::ensure_component_loaded`].
    pub async fn ensure_component_loaded(&self, metadata: &ComponentMetadata) -> Result<()> {
        self.loader.ensure_component_loaded(metadata).await
    }

    /// Ensures a module is loaded. See
    /// [`ResourceLoader::ensure_module_loaded`].
    pub async fn ensure_module_loaded(&self, module_id: &str) -> Result<()> {
        self.loader.ensure_module_loaded(module_id).await
    }

    /// Ensures a component's style sheet for this session's visual mode is
    /// loaded or loading.
    pub fn ensure_style_loaded(&self, metadata: &ComponentMetadata) {
        self.loader
            .ensure_style_loaded(metadata, &self.config.visual_mode);
    }

    /// Registers the completion consumer. See [`ResourceLoader::on_loaded`].
    pub fn on_loaded<F>(&self, callback: F)
    where
        F: FnOnce(Arc<ComponentMetadata>, HashMap<String, String>) + Send + 'static,
    {
        self.loader.on_loaded(callback);
    }

    /// Waits for the load-completion signal. See
    /// [`ResourceLoader::wait_until_loaded`].
    pub async fn wait_until_loaded(&self) -> Result<HashMap<String, String>> {
        self.loader.wait_until_loaded().await
    }

    pub fn style_sheets(&self) -> HashMap<String, String> {
        self.loader.style_sheets()
    }

    pub fn is_loaded(&self) -> bool {
        self.loader.is_loaded()
    }

    pub fn pending_style_count(&self) -> usize {
        self.loader.pending_style_count()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.loader.stats()
    }
}
