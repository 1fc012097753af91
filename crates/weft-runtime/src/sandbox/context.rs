//! The per-session sandbox context and its owning thread.
//!
//! Boa contexts are not `Send`, so each render session runs one dedicated
//! OS thread that owns the context for the session's whole life. Module
//! executions are submitted over a channel and answered over oneshot
//! replies; this is what makes the execution surface `async` while the
//! engine itself stays single-threaded. Running every module of a session
//! in the same context is what gives modules a shared global state:
//! classes and session data set up by one module are visible to the next.

use std::thread;

use boa_engine::{Context, Source};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot};
use weft_core::{ResourceLimits, Result, WeftError};

use crate::sandbox::bindings::{self, StagedRegistration};

struct SandboxJob {
    module_id: String,
    source: String,
    reply: oneshot::Sender<Result<Vec<StagedRegistration>>>,
}

/// Handle to a render session's sandboxed execution context.
///
/// Cheap to clone; all clones talk to the same context thread.
#[derive(Clone)]
pub struct Sandbox {
    jobs: mpsc::UnboundedSender<SandboxJob>,
    limits: ResourceLimits,
}

impl Sandbox {
    /// Spawns the context thread and installs the `weft` bindings.
    ///
    /// `session_data` seeds the `weft.session` namespace before any module
    /// code runs.
    pub fn new(limits: ResourceLimits, session_data: serde_json::Map<String, JsonValue>) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let thread_limits = limits.clone();
        thread::spawn(move || run_context_thread(jobs_rx, thread_limits, session_data));
        Self {
            jobs: jobs_tx,
            limits,
        }
    }

    /// Executes one module's source text in the session context.
    ///
    /// Returns the registrations the module staged via `weft.register`.
    /// Execution is bounded by the configured timeout; a module that
    /// exceeds it leaves the context thread stuck on that script, so the
    /// thread is abandoned rather than interrupted (the session is
    /// aborting in that case anyway).
    ///
    /// # Errors
    ///
    /// - [`WeftError::Execution`] if the script fails to parse or throws
    /// - [`WeftError::Timeout`] if execution exceeds the limit
    /// - [`WeftError::SandboxClosed`] if the context thread is gone
    pub async fn execute(
        &self,
        module_id: &str,
        source: String,
    ) -> Result<Vec<StagedRegistration>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.jobs
            .send(SandboxJob {
                module_id: module_id.to_string(),
                source,
                reply: reply_tx,
            })
            .map_err(|_| WeftError::SandboxClosed)?;

        match tokio::time::timeout(self.limits.execution_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(WeftError::SandboxClosed),
            Err(_) => Err(WeftError::Timeout(
                self.limits.execution_timeout.as_millis() as u64,
            )),
        }
    }
}

fn run_context_thread(
    mut jobs: mpsc::UnboundedReceiver<SandboxJob>,
    limits: ResourceLimits,
    session_data: serde_json::Map<String, JsonValue>,
) {
    let mut ctx = Context::default();

    if let Some(limit) = limits.recursion_limit {
        ctx.runtime_limits_mut().set_recursion_limit(limit);
    }
    if let Some(limit) = limits.loop_iteration_limit {
        ctx.runtime_limits_mut().set_loop_iteration_limit(limit);
    }

    if let Err(e) = bindings::install_weft_bindings(&mut ctx, &session_data) {
        // Dropping the receiver makes every pending and future execute()
        // observe SandboxClosed.
        tracing::error!("Failed to initialize sandbox context: {}", e);
        return;
    }

    while let Some(job) = jobs.blocking_recv() {
        let result = execute_module(&mut ctx, &job.module_id, &job.source);
        let _ = job.reply.send(result);
    }
}

fn execute_module(
    ctx: &mut Context,
    module_id: &str,
    source: &str,
) -> Result<Vec<StagedRegistration>> {
    let outcome = ctx.eval(Source::from_bytes(source));
    let staged = bindings::take_staged();
    match outcome {
        Ok(_) => Ok(staged),
        // Whatever was staged before the failure is discarded: a module's
        // registrations commit all together or not at all.
        Err(e) => Err(WeftError::Execution(format!("module '{}': {}", module_id, e))),
    }
}
