// src/exec/temp.rs

//! Temp directory and launcher-file lifecycle.
//!
//! A [`TempArtifactManager`] is created once (usually by the
//! [`Runner`](crate::Runner)) and handed to whatever needs launcher files.
//! Tests create their own isolated instances.
//!
//! Guarantees:
//! - the directory is created lazily, at most once per manager (re-created
//!   only after an explicit [`purge`](TempArtifactManager::purge));
//! - every artifact gets a unique file name, so concurrent runs never share
//!   a file;
//! - [`TempArtifact::cleanup`] is idempotent and also runs on drop;
//! - leftover artifacts and the directory are removed when the last handle
//!   to the manager is dropped, and on termination signals when
//!   [`watch_signals`](TempArtifactManager::watch_signals) is active.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::signal::TerminationSignals;

const DIR_PREFIX: &str = "wsrun-";
const FILE_PREFIX: &str = "run-";

/// Owner of the per-process temp directory.
#[derive(Clone)]
pub struct TempArtifactManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    base: PathBuf,
    dir: Mutex<Option<PathBuf>>,
    live: Mutex<HashSet<PathBuf>>,
}

impl fmt::Debug for TempArtifactManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempArtifactManager")
            .field("base", &self.inner.base)
            .field("dir", &*lock(&self.inner.dir))
            .finish_non_exhaustive()
    }
}

impl Default for TempArtifactManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TempArtifactManager {
    /// Manager rooted in the system temp directory.
    pub fn new() -> Self {
        Self::with_base_dir(std::env::temp_dir())
    }

    /// Manager whose directory is created inside `base`.
    pub fn with_base_dir(base: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                base: base.into(),
                dir: Mutex::new(None),
                live: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// The managed directory, created on first use.
    pub fn dir(&self) -> io::Result<PathBuf> {
        let mut dir = lock(&self.inner.dir);
        if let Some(existing) = dir.as_ref() {
            return Ok(existing.clone());
        }

        fs::create_dir_all(&self.inner.base)?;
        let created = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(&self.inner.base)?
            .keep();
        debug!(dir = %created.display(), "created temp artifact directory");
        *dir = Some(created.clone());
        Ok(created)
    }

    /// Write `contents` to a new, uniquely named file ending in `suffix`.
    ///
    /// With `executable`, the file is made `0755` on POSIX.
    pub fn create_artifact(
        &self,
        suffix: &str,
        contents: &str,
        executable: bool,
    ) -> io::Result<TempArtifact> {
        let dir = self.dir()?;
        let mut file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(suffix)
            .tempfile_in(&dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;

        if executable {
            make_executable(file.as_file())?;
        }

        // Close our handle before anything tries to run the file.
        let (handle, path) = file.keep().map_err(|e| e.error)?;
        drop(handle);

        lock(&self.inner.live).insert(path.clone());
        debug!(path = %path.display(), "created temp artifact");

        Ok(TempArtifact {
            path,
            cleaned: AtomicBool::new(false),
            owner: Arc::downgrade(&self.inner),
        })
    }

    /// Paths of artifacts that have not been cleaned up yet.
    pub fn live_artifacts(&self) -> Vec<PathBuf> {
        lock(&self.inner.live).iter().cloned().collect()
    }

    /// Remove every live artifact and the directory itself.
    pub fn purge(&self) {
        self.inner.purge();
    }

    /// Purge on SIGINT, SIGTERM, SIGHUP, SIGUSR1 or SIGUSR2 (Ctrl-C on
    /// Windows), then exit the process with `128 + signo`.
    ///
    /// For callers that have no batch to stop first; the CLI cancels its
    /// batch on the first signal instead. Must be called from within a
    /// Tokio runtime.
    pub fn watch_signals(&self) -> io::Result<JoinHandle<()>> {
        let inner = Arc::downgrade(&self.inner);
        let mut signals = TerminationSignals::listen()?;

        Ok(tokio::spawn(async move {
            let signal = signals.recv().await;
            info!(%signal, "termination signal received; removing temp artifacts");
            if let Some(inner) = Weak::upgrade(&inner) {
                inner.purge();
            }
            std::process::exit(signal.exit_code());
        }))
    }
}

impl ManagerInner {
    fn purge(&self) {
        let leftovers: Vec<PathBuf> = lock(&self.live).drain().collect();
        for path in leftovers {
            remove_quietly(&path);
        }

        if let Some(dir) = lock(&self.dir).take() {
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!(dir = %dir.display(), "removed temp artifact directory"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "failed to remove temp directory")
                }
            }
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.purge();
    }
}

/// A launcher file owned by one run.
pub struct TempArtifact {
    path: PathBuf,
    cleaned: AtomicBool,
    owner: Weak<ManagerInner>,
}

impl fmt::Debug for TempArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempArtifact")
            .field("path", &self.path)
            .field("cleaned", &self.is_cleaned())
            .finish()
    }
}

impl TempArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned.load(Ordering::SeqCst)
    }

    /// Remove the backing file. Safe to call any number of times; failures
    /// are logged and swallowed.
    pub fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return;
        }
        remove_quietly(&self.path);
        if let Some(owner) = self.owner.upgrade() {
            lock(&owner.live).remove(&self.path);
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed temp artifact"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temp artifact"),
    }
}

#[cfg(unix)]
fn make_executable(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
