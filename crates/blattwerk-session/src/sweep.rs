// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Age-based cleanup of the base temp directory.
//
// The sweep is independent of the in-memory session store: it walks the
// directory tree and removes anything older than the threshold, so stale
// workspaces from crashed processes are reclaimed too. Long-running
// operations must not assume their output survives the next sweep.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, instrument, warn};

use blattwerk_core::error::Result;

/// Remove entries directly under `base` whose modification time is older
/// than `max_age`. Returns the number of entries removed.
#[instrument(skip_all, fields(base = %base.as_ref().display()))]
pub fn sweep_dir(base: impl AsRef<Path>, max_age: Duration) -> Result<usize> {
    let base = base.as_ref();
    if !base.is_dir() {
        debug!("base directory does not exist, nothing to sweep");
        return Ok(0);
    }

    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(err) => {
                warn!(path = %path.display(), %err, "cannot stat entry, skipping");
                continue;
            }
        };

        if modified >= cutoff {
            continue;
        }

        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), "stale entry removed");
                removed += 1;
            }
            Err(err) => warn!(path = %path.display(), %err, "could not remove stale entry"),
        }
    }

    if removed > 0 {
        info!(removed, "cleanup sweep finished");
    }
    Ok(removed)
}

/// Run [`sweep_dir`] forever on a fixed interval.
///
/// Spawn this on the runtime at startup; it never returns.
pub async fn run_periodic(base: PathBuf, max_age: Duration, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_dir(&base, max_age) {
            warn!(%err, "cleanup sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_files_survive() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("new.pdf"), b"data").expect("write");

        let removed = sweep_dir(tmp.path(), Duration::from_secs(3600)).expect("sweep");
        assert_eq!(removed, 0);
        assert!(tmp.path().join("new.pdf").exists());
    }

    #[test]
    fn aged_entries_are_removed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("old.pdf"), b"data").expect("write file");
        let sub = tmp.path().join("session-dir");
        std::fs::create_dir(&sub).expect("mkdir");
        std::fs::write(sub.join("upload.pdf"), b"data").expect("write nested");

        // Zero max age: everything currently present is "old".
        std::thread::sleep(Duration::from_millis(50));
        let removed = sweep_dir(tmp.path(), Duration::ZERO).expect("sweep");
        assert_eq!(removed, 2);
        assert!(!sub.exists());
    }

    #[test]
    fn missing_base_is_a_noop() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let gone = tmp.path().join("does-not-exist");
        assert_eq!(sweep_dir(&gone, Duration::ZERO).expect("sweep"), 0);
    }
}
