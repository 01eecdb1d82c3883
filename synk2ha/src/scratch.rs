use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tempfile::TempDir;

/// Every scratch entry carries this prefix, so a purge never touches
/// anything the bridge did not create.
pub const SCRATCH_PREFIX: &str = "synk-";

/// Directory under which short-lived secret material is staged.
///
/// Two release paths exist: each [`ScratchSession`] deletes its own directory
/// when dropped, and [`ScratchArea::purge`] sweeps whatever an interrupted
/// session left behind (called at the start of every cycle and on shutdown).
#[derive(Clone, Debug)]
pub struct ScratchArea {
    root: PathBuf,
}

impl ScratchArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn session(&self) -> io::Result<ScratchSession> {
        fs::create_dir_all(&self.root)?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.root)?;
        debug!("scratch session opened at {}", dir.path().display());
        Ok(ScratchSession { dir })
    }

    /// Removes every leftover scratch entry and returns how many were removed.
    pub fn purge(&self) -> usize {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("cannot list scratch area {}: {e}", self.root.display());
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            if !entry.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX) {
                continue;
            }
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("cannot remove scratch entry {}: {e}", path.display()),
            }
        }
        if removed > 0 {
            debug!("purged {removed} scratch entries");
        }
        removed
    }
}

/// The scratch area the process currently stages into, shared with the
/// shutdown handler so it purges the directory in use at exit.
#[derive(Clone, Debug)]
pub struct SharedScratch {
    current: Arc<Mutex<ScratchArea>>,
}

impl SharedScratch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            current: Arc::new(Mutex::new(ScratchArea::new(root))),
        }
    }

    /// Switches to `root` after a configuration reload. The area being left
    /// is purged first.
    pub fn follow(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        let mut current = match self.current.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        if current.root != root {
            info!(
                "scratch area moved from {} to {}",
                current.root.display(),
                root.display()
            );
            current.purge();
            *current = ScratchArea::new(root);
        }
    }

    pub fn purge(&self) -> usize {
        match self.current.lock() {
            Ok(current) => current.purge(),
            Err(poisoned) => poisoned.into_inner().purge(),
        }
    }
}

/// A private scratch directory, deleted with everything in it on drop.
#[derive(Debug)]
pub struct ScratchSession {
    dir: TempDir,
}

impl ScratchSession {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        Ok(path)
    }
}
