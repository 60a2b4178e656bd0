use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};

/// Lock file created next to the settings files while a host is running
pub const LOCK_FILE: &str = "pomotray.lock";

/// Keeps other hosts from driving the same settings directory.
///
/// The lock file holds the owner's process id and is removed on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: Utf8PathBuf,
}

impl InstanceLock {
    /// Take the lock in `settings_dir`.
    ///
    /// Returns `Ok(None)` when another live instance holds it. A lock left by
    /// a process that no longer exists is replaced.
    pub fn acquire<P: AsRef<Utf8Path>>(settings_dir: P) -> Result<Option<Self>> {
        let path = settings_dir.as_ref().join(LOCK_FILE);

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    write!(file, "{}", std::process::id())
                        .with_context(|| format!("Failed to write lock file: {}", path))?;
                    tracing::debug!("Acquired instance lock {}", path);
                    return Ok(Some(Self { path }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !is_stale(&path) {
                        tracing::warn!("Another instance holds {}", path);
                        return Ok(None);
                    }
                    tracing::warn!("Removing stale lock file {}", path);
                    fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove stale lock: {}", path))?;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create lock file: {}", path));
                }
            }
        }

        Ok(None)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove lock file {}: {}", self.path, e);
        }
    }
}

/// Whether the recorded owner is gone
fn is_stale(path: &Utf8Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(pid) = contents.trim().parse::<u32>() else {
        // Unreadable owner, e.g. a write cut short
        return true;
    };
    pid == std::process::id() || !process_exists(pid)
}

#[cfg(target_os = "linux")]
fn process_exists(pid: u32) -> bool {
    Utf8PathBuf::from(format!("/proc/{}", pid)).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_exists(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_dir() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, dir)
    }

    #[test]
    fn test_second_acquire_is_refused_until_drop() {
        let (_temp_dir, dir) = temp_dir();

        let lock = InstanceLock::acquire(&dir).unwrap().unwrap();
        assert!(lock.path().exists());
        assert_eq!(
            fs::read_to_string(lock.path()).unwrap(),
            std::process::id().to_string()
        );

        // Held by a live process that is not us
        fs::write(lock.path(), "1").unwrap();
        assert!(InstanceLock::acquire(&dir).unwrap().is_none());

        let path = lock.path().to_path_buf();
        drop(lock);
        assert!(!path.exists());
        assert!(InstanceLock::acquire(&dir).unwrap().is_some());
    }

    #[test]
    fn test_garbled_lock_is_replaced() {
        let (_temp_dir, dir) = temp_dir();
        fs::write(dir.join(LOCK_FILE), "").unwrap();

        let lock = InstanceLock::acquire(&dir).unwrap();
        assert!(lock.is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_lock_of_dead_process_is_replaced() {
        let (_temp_dir, dir) = temp_dir();
        // Above the kernel's pid_max ceiling
        fs::write(dir.join(LOCK_FILE), "4294967294").unwrap();

        assert!(InstanceLock::acquire(&dir).unwrap().is_some());
    }
}
