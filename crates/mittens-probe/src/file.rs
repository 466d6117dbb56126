//! Sentinel-file probes.
//!
//! Orchestrators that probe with `test -f` / `cat` see two files: the
//! alive file once the sidecar is running, and the ready file once the
//! target is warm. Both are written to a temporary sibling and renamed
//! into place.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, info};

use mittens_core::Options;

use crate::state::ProbeState;

pub struct FileProbeWriter {
    alive: PathBuf,
    ready: PathBuf,
}

impl FileProbeWriter {
    pub fn new(alive: impl Into<PathBuf>, ready: impl Into<PathBuf>) -> Self {
        Self {
            alive: alive.into(),
            ready: ready.into(),
        }
    }

    pub fn from_options(options: &Options) -> Self {
        Self::new(
            options.file_probe.alive_path.clone(),
            options.file_probe.ready_path.clone(),
        )
    }

    pub fn alive_path(&self) -> &Path {
        &self.alive
    }

    pub fn ready_path(&self) -> &Path {
        &self.ready
    }

    /// Remove a ready file left over from a previous cycle.
    pub async fn prepare(&self) -> io::Result<()> {
        remove_if_present(&self.ready).await
    }

    pub async fn write_alive(&self) -> io::Result<()> {
        write_atomic(&self.alive, ProbeState::Starting.as_str()).await?;
        info!(path = %self.alive.display(), "alive file written");
        Ok(())
    }

    /// Reflect `state` on disk. Non-terminal states are a no-op.
    pub async fn publish(&self, state: ProbeState) -> io::Result<()> {
        match state {
            ProbeState::Ready => {
                if fs::metadata(&self.alive).await.is_err() {
                    self.write_alive().await?;
                }
                write_atomic(&self.ready, state.as_str()).await?;
                info!(path = %self.ready.display(), "ready file written");
            }
            ProbeState::Failed => {
                remove_if_present(&self.ready).await?;
                debug!(path = %self.ready.display(), "ready file withheld");
            }
            ProbeState::Starting | ProbeState::Warming => {}
        }
        Ok(())
    }

    /// Publish every update from the coordinator until a terminal state.
    ///
    /// Returns the terminal state, or the last seen state if the
    /// coordinator was dropped first.
    pub async fn observe(self, mut rx: watch::Receiver<ProbeState>) -> io::Result<ProbeState> {
        loop {
            let state = *rx.borrow_and_update();
            self.publish(state).await?;
            if state.is_terminal() {
                return Ok(state);
            }
            if rx.changed().await.is_err() {
                return Ok(*rx.borrow());
            }
        }
    }
}

async fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
