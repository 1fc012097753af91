//! Shared types for the weft component runtime.
//!
//! This crate carries the pieces that both the runtime and its callers need:
//! component metadata and the descriptor format, the resource fetch trait and
//! its filesystem/in-memory implementations, resource paths, execution limits,
//! and the error type.

pub mod component;
pub mod error;
pub mod fetch;
pub mod limits;

pub use component::{ComponentClass, ComponentMetadata, DEFAULT_MODE, ROOT_TAG};
pub use error::{Result, WeftError};
pub use fetch::{FsFetcher, MemoryFetcher, ResourcePaths, TextFetcher};
pub use limits::ResourceLimits;
