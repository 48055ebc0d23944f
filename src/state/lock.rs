use super::StateError;
use crate::config::LockSettings;
use crate::shared::clock::now_secs;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub timeout: Duration,
    pub poll: Duration,
    pub stale_after_secs: i64,
    pub check_holder_pid: bool,
}

impl LockOptions {
    pub fn from_settings(settings: &LockSettings, test_mode: bool) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            poll: Duration::from_millis(settings.poll_ms.max(1)),
            stale_after_secs: settings.stale_after_secs as i64,
            check_holder_pid: !test_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: u32,
    pub acquired_at: i64,
}

#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    token: String,
}

impl StateLock {
    pub fn acquire(path: &Path, options: LockOptions) -> Result<Self, StateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StateError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let started = Instant::now();
        loop {
            let token = format!("{} {}", std::process::id(), now_secs());
            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(path)
            {
                Ok(mut file) => {
                    file.write_all(token.as_bytes())
                        .map_err(|source| StateError::WriteLock {
                            path: path.display().to_string(),
                            source,
                        })?;
                    return Ok(Self {
                        path: path.to_path_buf(),
                        token,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(path, options) {
                        let _ = fs::remove_file(path);
                        continue;
                    }
                }
                Err(source) => {
                    return Err(StateError::WriteLock {
                        path: path.display().to_string(),
                        source,
                    })
                }
            }

            if started.elapsed() >= options.timeout {
                return Err(StateError::LockTimeout {
                    path: path.display().to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            thread::sleep(options.poll);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let ours = fs::read_to_string(&self.path)
            .map(|raw| raw.trim() == self.token)
            .unwrap_or(false);
        if ours {
            let _ = fs::remove_file(&self.path);
        }
    }
}

pub fn read_lock_holder(path: &Path) -> Option<LockHolder> {
    let raw = fs::read_to_string(path).ok()?;
    let mut parts = raw.split_whitespace();
    let pid = parts.next()?.parse::<u32>().ok()?;
    let acquired_at = parts.next()?.parse::<i64>().ok()?;
    Some(LockHolder { pid, acquired_at })
}

fn is_stale(path: &Path, options: LockOptions) -> bool {
    let Some(holder) = read_lock_holder(path) else {
        // Unparseable lock content: only reclaim once the file itself is old.
        return lock_file_age_secs(path)
            .map(|age| age > options.stale_after_secs)
            .unwrap_or(false);
    };
    if now_secs() - holder.acquired_at > options.stale_after_secs {
        return true;
    }
    options.check_holder_pid && holder.pid != std::process::id() && !is_process_alive(holder.pid)
}

fn lock_file_age_secs(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let age = modified.elapsed().ok()?;
    Some(age.as_secs() as i64)
}

pub fn is_process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(true)
    }

    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fast_options() -> LockOptions {
        LockOptions {
            timeout: Duration::from_millis(60),
            poll: Duration::from_millis(5),
            stale_after_secs: 10,
            check_holder_pid: false,
        }
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json.lock");

        let guard = StateLock::acquire(&path, fast_options()).expect("first lock");
        let holder = read_lock_holder(&path).expect("holder");
        assert_eq!(holder.pid, std::process::id());

        let err = StateLock::acquire(&path, fast_options()).expect_err("second lock times out");
        assert!(matches!(err, StateError::LockTimeout { .. }));

        drop(guard);
        assert!(!path.exists());
        StateLock::acquire(&path, fast_options()).expect("lock after release");
    }

    #[test]
    fn stale_lock_from_crashed_holder_is_reclaimed() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json.lock");
        fs::write(&path, format!("999999 {}", now_secs() - 3_600)).expect("stale lock");

        let guard = StateLock::acquire(&path, fast_options()).expect("reclaimed");
        assert_eq!(
            read_lock_holder(guard.path()).expect("holder").pid,
            std::process::id()
        );
    }

    #[test]
    fn fresh_foreign_lock_is_respected_in_test_mode() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json.lock");
        fs::write(&path, format!("999999 {}", now_secs())).expect("fresh lock");

        let err = StateLock::acquire(&path, fast_options()).expect_err("held");
        assert!(matches!(err, StateError::LockTimeout { .. }));
        assert!(path.exists());
    }
}
