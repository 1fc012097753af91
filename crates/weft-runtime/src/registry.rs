//! Tag name to component metadata mapping for one render session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use weft_core::{ComponentMetadata, ROOT_TAG};

/// Session-wide component registry.
///
/// Grows monotonically as modules register their definitions. A synthetic
/// root entry for [`ROOT_TAG`] is installed at construction so the document
/// root always resolves.
pub struct ComponentRegistry {
    entries: Mutex<HashMap<String, Arc<ComponentMetadata>>>,
    initial_root: Arc<ComponentMetadata>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        let root = Arc::new(ComponentMetadata::new(ROOT_TAG));
        let mut entries = HashMap::new();
        entries.insert(ROOT_TAG.to_string(), root.clone());
        Self {
            entries: Mutex::new(entries),
            initial_root: root,
        }
    }

    /// Inserts or overwrites the entry for `metadata.tag`. The last
    /// definition wins.
    pub fn define(&self, metadata: ComponentMetadata) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(metadata.tag.clone(), Arc::new(metadata));
    }

    /// Looks up a tag name. Unknown tags resolve to `None`; the caller
    /// decides whether that is an error.
    pub fn lookup(&self, tag: &str) -> Option<Arc<ComponentMetadata>> {
        self.entries.lock().unwrap().get(tag).cloned()
    }

    /// The document root entry.
    pub fn root(&self) -> Arc<ComponentMetadata> {
        self.lookup(ROOT_TAG)
            .unwrap_or_else(|| self.initial_root.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
