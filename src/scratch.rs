use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error};
use uuid::Uuid;

/// A per-request working directory.
///
/// Call [`ScratchDir::cleanup`] when the request is done. If that never
/// happens (panic, dropped future) the directory is removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    pub async fn create(root: &Path) -> io::Result<Self> {
        let path = root.join(format!("blip-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&path).await?;
        debug!("created scratch dir {}", path.display());
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort recursive removal. Failures are logged, never returned.
    pub async fn cleanup(mut self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!("removed scratch dir {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!("failed to remove scratch dir {}: {}", self.path.display(), e),
        }
        self.removed = true;
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        // Inside a runtime the removal must not block a worker thread.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_now(&path));
            }
            Err(_) => remove_now(&path),
        }
    }
}

fn remove_now(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != io::ErrorKind::NotFound {
            error!("failed to remove scratch dir {}: {}", path.display(), e);
        }
    }
}
