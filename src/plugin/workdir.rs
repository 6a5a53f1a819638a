use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// The current working directory is process-wide; every scoped change
/// holds this lock from `chdir` until the previous directory is restored.
static WORKDIR_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` with the working directory set to `dir`.
///
/// The previous directory is restored on every exit path, including when
/// `f` panics. Fails without running `f` if `dir` cannot be entered.
pub fn with_working_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> io::Result<T> {
    let _lock = WORKDIR_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let _restore = RestoreOnDrop::enter(dir)?;
    Ok(f())
}

struct RestoreOnDrop {
    previous: PathBuf,
}

impl RestoreOnDrop {
    fn enter(dir: &Path) -> io::Result<Self> {
        let previous = env::current_dir()?;
        env::set_current_dir(dir)?;
        tracing::debug!("entered {}", dir.display());
        Ok(Self { previous })
    }
}

impl Drop for RestoreOnDrop {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.previous) {
            tracing::error!(
                "failed to restore working directory {}: {err}",
                self.previous.display()
            );
        }
    }
}
