//! Server-side component runtime: lazy, deduplicated, asynchronous resource
//! loading with sandboxed module execution and load-completion tracking.
//!
//! A [`RenderSession`] owns one component registry, one sandboxed JavaScript
//! context and one resource loader. Rendering code asks the loader to ensure
//! a component's module and style are available; the loader fetches each
//! distinct resource at most once per session, queues concurrent callers
//! behind the in-flight fetch, executes fetched module code in the sandbox
//! (where it registers its component definitions), and fires a single
//! "application fully loaded" signal once every requested style has settled.

pub mod loader;
pub mod registry;
pub mod sandbox;
pub mod session;
pub mod stats;
pub mod tracker;

pub use loader::ResourceLoader;
pub use registry::ComponentRegistry;
pub use sandbox::{Sandbox, StagedRegistration};
pub use session::{RenderSession, SessionConfig};
pub use stats::{LoaderStats, StatsSnapshot};
pub use tracker::LoadTracker;
