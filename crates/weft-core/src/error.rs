use thiserror::Error;

/// Errors produced while loading and executing component resources.
///
/// The enum is `Clone` because a single failure can fan out to every caller
/// queued behind the failing resource.
#[derive(Error, Debug, Clone)]
pub enum WeftError {
    #[error("Resource fetch error: {0}")]
    Fetch(String),

    #[error("JavaScript execution error: {0}")]
    Execution(String),

    #[error("Module execution timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid component descriptor: {0}")]
    Descriptor(String),

    #[error("Sandbox closed")]
    SandboxClosed,

    #[error("Render session aborted: {0}")]
    Aborted(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, WeftError>;
