//! Sandboxed execution of component module code.
//!
//! One isolated JavaScript context per render session, exposing only the
//! injected `weft` global surface to loaded code.

pub mod bindings;
pub mod context;
pub mod conversions;

pub use bindings::StagedRegistration;
pub use context::Sandbox;
