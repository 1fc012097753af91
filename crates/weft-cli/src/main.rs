//! # Weft CLI Entry Point
//!
//! Main binary for the weft component runtime. Loads a component manifest,
//! runs a full render-session load cycle against a build output tree, and
//! reports the result as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Load an application and print its style sheets and loader stats
//! weft render -m app.json -d dist/
//!
//! # Load with a dark visual mode and a tighter module execution limit
//! weft render -m app.json -d dist/ --mode dark --max-execution-time-ms 5000
//!
//! # Check that every resource a manifest references exists on disk
//! weft validate -m app.json -d dist/
//! ```
//!
//! ## Manifest Format
//!
//! A manifest is a JSON object with an optional root tag and a list of
//! component descriptors:
//!
//! ```json
//! {
//!   "root": "x-app",
//!   "components": [
//!     { "tag": "x-app", "module": "app", "styles": { "$": "app" } },
//!     { "tag": "x-button", "module": "controls" }
//!   ]
//! }
//! ```

use anyhow::Result;
use argh::FromArgs;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use weft_core::{ComponentMetadata, ResourceLimits, ResourcePaths};
use weft_runtime::{RenderSession, SessionConfig};

/// Main CLI structure parsed from command-line arguments.
///
/// Uses `argh` for declarative argument parsing. The top-level command
/// dispatches to one of the two subcommands: render or validate.
#[derive(FromArgs)]
/// Weft - server-side component runtime
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available CLI subcommands.
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Render(RenderArgs),
    Validate(ValidateArgs),
}

/// Arguments for running a render-session load cycle.
///
/// Defines every component in the manifest, marks the document root as
/// loading, concurrently ensures each component's module and style sheet,
/// waits for the load-completion signal, and prints the loaded style sheets
/// and loader stats as JSON to stdout.
///
/// # Example
///
/// ```bash
/// weft render -m demos/todo/app.json -d demos/todo/dist/
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "render")]
/// run a full load cycle for a component manifest
struct RenderArgs {
    /// path to the JSON component manifest
    #[argh(option, short = 'm')]
    manifest: String,

    /// build output directory containing <module>.js and <style>.css files
    #[argh(option, short = 'd')]
    dist: String,

    /// visual mode used to select component style sheets
    ///
    /// Components fall back to their "$" style entry when they have no
    /// dedicated style for this mode. Defaults to "$".
    #[argh(option, long = "mode", default = "\"$\".into()")]
    mode: String,

    /// JSON object exposed to module code as `weft.session`
    ///
    /// Must be a valid JSON object. Defaults to `{}`.
    #[argh(option, long = "session-data", default = "\"{}\".into()")]
    session_data: String,

    /// maximum execution time per module in milliseconds
    ///
    /// Bounds each sandboxed module execution. A module exceeding the
    /// limit fails the whole load. Defaults to 30000ms (30 seconds).
    #[argh(option, long = "max-execution-time-ms", default = "30000")]
    max_execution_time_ms: u64,

    /// maximum time to wait for the load-completion signal in milliseconds
    ///
    /// Bounds the wait after all modules have loaded. Defaults to 10000ms.
    #[argh(option, long = "load-timeout-ms", default = "10000")]
    load_timeout_ms: u64,
}

/// Arguments for checking a manifest against a build output tree.
///
/// Parses the manifest and reports every module or style file it references
/// that does not exist on disk, without executing anything.
///
/// # Example
///
/// ```bash
/// weft validate -m app.json -d dist/
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "validate")]
/// check that a manifest's resources exist on disk
struct ValidateArgs {
    /// path to the JSON component manifest
    #[argh(option, short = 'm')]
    manifest: String,

    /// build output directory containing <module>.js and <style>.css files
    #[argh(option, short = 'd')]
    dist: String,
}

/// A component manifest: an optional root tag plus component descriptors.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    root: Option<String>,
    components: Vec<ComponentMetadata>,
}

fn load_manifest(path: &str) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read manifest {}: {}", path, e))?;
    let manifest: Manifest = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid manifest {}: {}", path, e))?;

    if let Some(root_tag) = &manifest.root {
        if !manifest.components.iter().any(|c| &c.tag == root_tag) {
            return Err(anyhow::anyhow!(
                "Root component <{}> is not in the manifest",
                root_tag
            ));
        }
    }
    Ok(manifest)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for unix tool usage
    // (piping the JSON output to jq, etc.).
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli: Cli = argh::from_env();
    match cli.command {
        Commands::Render(args) => run_render(args).await,
        Commands::Validate(args) => run_validate(args),
    }
}

/// Executes the `render` subcommand.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or parsed, if any module
/// fails to fetch or execute, or if the completion signal does not fire
/// within the load timeout.
async fn run_render(args: RenderArgs) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let session_data: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&args.session_data)
            .map_err(|e| anyhow::anyhow!("Invalid JSON in session data: {}", e))?;

    let limits = ResourceLimits::new()
        .with_execution_timeout(Duration::from_millis(args.max_execution_time_ms));
    let config = SessionConfig::new(&args.dist)
        .with_limits(limits)
        .with_visual_mode(&args.mode)
        .with_session_data(session_data);
    let session = RenderSession::new(config)?;

    let tags: Vec<String> = manifest.components.iter().map(|c| c.tag.clone()).collect();
    tracing::info!(
        "Defining {} components from {}",
        tags.len(),
        args.manifest
    );
    for metadata in manifest.components {
        session.define(metadata);
    }
    session.mark_root_loading();

    // First pass: kick off style fetches for the manifest definitions and
    // load every module concurrently. Shared modules are fetched once.
    let mut module_loads = Vec::new();
    for tag in &tags {
        if let Some(metadata) = session.lookup(tag) {
            session.ensure_style_loaded(&metadata);
            let session = &session;
            module_loads.push(async move { session.ensure_component_loaded(&metadata).await });
        }
    }
    for result in futures::future::join_all(module_loads).await {
        result?;
    }

    // Second pass: modules may have registered richer definitions than the
    // manifest stubs; ensure their styles too. Already-fetched sheets are
    // no-ops.
    for tag in &tags {
        if let Some(metadata) = session.lookup(tag) {
            session.ensure_style_loaded(&metadata);
        }
    }

    let styles = if session.is_loaded() {
        session.style_sheets()
    } else if session.pending_style_count() == 0 {
        // No component requested a style sheet, so the completion signal
        // has nothing to wait for.
        tracing::info!("No style sheets requested; skipping completion wait");
        session.style_sheets()
    } else {
        tokio::time::timeout(
            Duration::from_millis(args.load_timeout_ms),
            session.wait_until_loaded(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Load did not complete within {}ms", args.load_timeout_ms))??
    };

    let output = serde_json::json!({
        "root": manifest.root,
        "styles": styles,
        "stats": session.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Executes the `validate` subcommand.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or parsed, or if any
/// referenced resource file is missing.
fn run_validate(args: ValidateArgs) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let paths = ResourcePaths::new(&args.dist);

    let mut checked = HashSet::new();
    let mut missing = 0usize;
    for component in &manifest.components {
        if let Some(module_id) = &component.module {
            let path = paths.module_path(module_id);
            if checked.insert(path.clone()) && !path.exists() {
                tracing::error!("<{}>: module file {} is missing", component.tag, path.display());
                missing += 1;
            }
        }
        for style_id in component.styles.values() {
            let path = paths.style_path(style_id);
            if checked.insert(path.clone()) && !path.exists() {
                tracing::error!("<{}>: style file {} is missing", component.tag, path.display());
                missing += 1;
            }
        }
    }

    if missing > 0 {
        return Err(anyhow::anyhow!(
            "{} missing resource file(s) under {}",
            missing,
            args.dist
        ));
    }
    println!(
        "{} components, all referenced resources present",
        manifest.components.len()
    );
    Ok(())
}
