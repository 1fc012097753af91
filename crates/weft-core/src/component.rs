//! Component metadata and the descriptor format.
//!
//! A component definition maps a tag name to the resources needed to render
//! it: an optional module identifier (compiled code, fetched and executed on
//! first use) and a set of style identifiers keyed by visual mode. The same
//! struct doubles as the descriptor format, so definitions can be parsed from
//! a JSON manifest or from descriptor objects produced by sandboxed module
//! code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tag name of the synthetic document root entry.
pub const ROOT_TAG: &str = "#document";

/// Style map key used when no entry exists for the requested visual mode.
pub const DEFAULT_MODE: &str = "$";

/// An already-resolved component class.
///
/// A definition carrying a class needs no module fetch: the class is assumed
/// to exist in the session's execution context (or to require no code at
/// all). In descriptors this is spelled as a plain string naming the class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentClass {
    pub name: String,
}

impl ComponentClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Immutable definition record for one tag name.
///
/// Written once at definition time and shared read-only afterwards. The
/// `styles` map is keyed by visual mode name; [`DEFAULT_MODE`] acts as the
/// fallback entry for modes without a dedicated style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    /// Tag name this definition is registered under.
    pub tag: String,

    /// Identifier of the module that defines this component, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// Visual mode name to style identifier.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub styles: HashMap<String, String>,

    /// Statically embedded class, set when no module fetch is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ComponentClass>,
}

impl ComponentMetadata {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            module: None,
            styles: HashMap::new(),
            class: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_style(mut self, mode: impl Into<String>, style: impl Into<String>) -> Self {
        self.styles.insert(mode.into(), style.into());
        self
    }

    pub fn with_class(mut self, class: ComponentClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Whether this component resolves without a module fetch.
    pub fn is_embedded(&self) -> bool {
        self.class.is_some()
    }

    /// Resolves the style identifier for a visual mode.
    ///
    /// Falls back to the [`DEFAULT_MODE`] entry when the mode has no
    /// dedicated style; returns `None` when the component has no style at
    /// all for this mode.
    pub fn style_for_mode(&self, mode: &str) -> Option<&str> {
        self.styles
            .get(mode)
            .or_else(|| self.styles.get(DEFAULT_MODE))
            .map(String::as_str)
    }
}
