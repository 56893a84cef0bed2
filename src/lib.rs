// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fs;
pub mod lifecycle;
pub mod logging;
pub mod types;
pub mod watch;
pub mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use crate::errors::{TerminationError, WatchError};
pub use crate::lifecycle::ExecutorService;
pub use crate::types::WatcherOptions;
pub use crate::watch::{Listener, SharedListener};
pub use crate::watcher::FileWatcher;

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - one scoped listener per path, bridged onto the async side
/// - Ctrl-C handling and an orderly `close()`
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let options = effective_options(cfg.as_ref(), &args)?;

    let mut paths: Vec<PathBuf> = cfg.map(|c| c.paths).unwrap_or_default();
    paths.extend(args.paths.iter().cloned());
    if paths.is_empty() {
        bail!("nothing to watch: pass PATH arguments or list `paths` in the config file");
    }

    let watcher = FileWatcher::with_options(options)?;
    debug!(?options, "file watcher started");

    // Listener callbacks run on the callback pool; hand paths over to the
    // runtime so stdout is written from one place.
    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
    let listener: SharedListener = Arc::new(move |path: &Path| {
        let _ = tx.send(path.to_path_buf());
    });

    for path in &paths {
        watcher
            .add_watcher_for(path, Arc::clone(&listener))
            .with_context(|| format!("failed to watch {}", path.display()))?;
        info!(path = %path.display(), "watching");
    }
    drop(listener);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown requested");
                break;
            }
            maybe = rx.recv() => match maybe {
                Some(path) => println!("{}", path.display()),
                None => break,
            },
        }
    }

    // close() blocks on thread joins.
    tokio::task::spawn_blocking(move || watcher.close()).await?;
    Ok(())
}

/// Load the config named on the command line, or `Symwatch.toml` if it
/// exists. An explicitly named file must exist.
fn load_config(explicit: Option<&Path>) -> Result<Option<ConfigFile>> {
    if let Some(path) = explicit {
        let cfg = load_and_validate(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        return Ok(Some(cfg));
    }

    let default = default_config_path();
    if !default.exists() {
        return Ok(None);
    }
    let cfg = load_and_validate(&default)
        .with_context(|| format!("failed to load config {}", default.display()))?;
    Ok(Some(cfg))
}

/// Config file values with CLI flags layered on top.
pub fn effective_options(cfg: Option<&ConfigFile>, args: &CliArgs) -> Result<WatcherOptions> {
    let mut options = cfg.map(ConfigFile::options).unwrap_or_default();

    if let Some(threads) = args.callback_threads {
        if threads == 0 {
            bail!("--callback-threads must be >= 1");
        }
        options.callback_threads = threads;
    }
    if let Some(secs) = args.shutdown_timeout {
        if secs == 0 {
            bail!("--shutdown-timeout must be >= 1");
        }
        options.shutdown_timeout = Duration::from_secs(secs);
    }

    Ok(options)
}
