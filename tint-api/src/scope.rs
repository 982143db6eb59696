//! Per-request scratch scopes
//!
//! Every request that passes validation gets a private directory under the
//! scratch root, named by its request UUID. All temporary artifacts for the
//! request live there and are removed when the scope is released.
//!
//! Release happens exactly once per acquired scope: explicitly through
//! [`ScopeHandle::release`] on every pipeline path, or from `Drop` if the
//! handle is abandoned (panic unwinding, a cancelled task).

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CleanupFault;

#[derive(Debug, Default)]
struct ScopeLedger {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Acquire/release counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeStats {
    pub acquired: u64,
    pub released: u64,
}

impl ScopeStats {
    /// Scopes currently open
    pub fn active(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Owner of the scratch root; hands out [`ScopeHandle`]s
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
    ledger: Arc<ScopeLedger>,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ledger: Arc::new(ScopeLedger::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the scratch root if missing
    pub fn ensure_root(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Open a new scope for `request_id`
    ///
    /// Fails with `AlreadyExists` rather than sharing a directory with
    /// another scope.
    pub async fn acquire(&self, request_id: Uuid) -> io::Result<ScopeHandle> {
        tokio::fs::create_dir_all(&self.root).await?;
        let dir = self.root.join(request_id.to_string());
        tokio::fs::create_dir(&dir).await?;

        self.ledger.acquired.fetch_add(1, Ordering::SeqCst);
        debug!(scope = %request_id, dir = %dir.display(), "Scope acquired");

        Ok(ScopeHandle {
            id: request_id,
            dir,
            artifacts: Vec::new(),
            ledger: Arc::clone(&self.ledger),
            released: false,
        })
    }

    /// Release a scope; equivalent to [`ScopeHandle::release`]
    pub fn release(&self, handle: ScopeHandle) -> Result<usize, CleanupFault> {
        handle.release()
    }

    pub fn stats(&self) -> ScopeStats {
        ScopeStats {
            acquired: self.ledger.acquired.load(Ordering::SeqCst),
            released: self.ledger.released.load(Ordering::SeqCst),
        }
    }

    /// Remove scope directories older than `max_age`
    ///
    /// Only directories named like a request UUID are considered; anything
    /// else under the root is left alone. Returns the number removed.
    pub fn sweep_stale(&self, max_age: Duration) -> io::Result<usize> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_scope_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| Uuid::parse_str(name).is_ok())
                    .unwrap_or(false);
            if !is_scope_dir {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!(dir = %path.display(), age_secs = age.as_secs(), "Swept stale scope");
                }
                Err(e) => warn!("Failed to sweep stale scope {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("Swept {} stale scratch scope(s) from {}", removed, self.root.display());
        }
        Ok(removed)
    }
}

/// Periodically sweep stale scopes left behind by a previous run
///
/// The first sweep runs immediately.
pub fn spawn_sweeper(
    scratch: ScratchSpace,
    max_age: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let space = scratch.clone();
            match tokio::task::spawn_blocking(move || space.sweep_stale(max_age)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Scratch sweep failed: {}", e),
                Err(e) => warn!("Scratch sweep task failed: {}", e),
            }
        }
    })
}

/// Exclusive handle to one request's scratch directory
#[derive(Debug)]
pub struct ScopeHandle {
    id: Uuid,
    dir: PathBuf,
    artifacts: Vec<PathBuf>,
    ledger: Arc<ScopeLedger>,
    released: bool,
}

impl ScopeHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, in creation order
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Write an artifact into the scope
    ///
    /// `name` must be a bare file name.
    pub async fn write_artifact(&mut self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("artifact name '{}' must be a plain file name", name),
            ));
        }

        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        self.artifacts.push(path.clone());
        Ok(path)
    }

    /// Delete every artifact and the scope directory
    ///
    /// Returns the number of artifacts removed. Failures are collected into
    /// a [`CleanupFault`]; the scope counts as released either way.
    ///
    /// Synchronous so that `Drop` can share it. A scope holds at most an
    /// input and an output file, so this is a handful of unlink calls.
    pub fn release(mut self) -> Result<usize, CleanupFault> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<usize, CleanupFault> {
        if self.released {
            return Ok(0);
        }
        self.released = true;
        self.ledger.released.fetch_add(1, Ordering::SeqCst);

        let mut removed = 0;
        let mut failures = Vec::new();

        for path in self.artifacts.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => failures.push((path, e)),
            }
        }

        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => failures.push((self.dir.clone(), e)),
        }

        if failures.is_empty() {
            debug!(scope = %self.id, removed, "Scope released");
            Ok(removed)
        } else {
            Err(CleanupFault {
                scope: self.id.to_string(),
                failures,
            })
        }
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(scope = %self.id, "Scope dropped without explicit release, releasing now");
        if let Err(fault) = self.release_inner() {
            warn!("{}", fault);
        }
    }
}
