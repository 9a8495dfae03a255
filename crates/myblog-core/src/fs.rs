//! Filesystem helpers for the markdown tree.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Suffix format appended to a stem when the preferred name is taken.
pub const COLLISION_SUFFIX_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Upper bound on numbered fallbacks tried for one timestamp.
const MAX_ATTEMPTS: usize = 10_000;

/// Name for the `attempt`-th try: `<stem>.<ext>`, then
/// `<stem>-<timestamp>.<ext>`, then `<stem>-<timestamp>-<n>.<ext>`.
fn candidate(dir: &Path, stem: &str, ext: &str, now: DateTime<Utc>, attempt: usize) -> PathBuf {
    match attempt {
        0 => dir.join(format!("{}.{}", stem, ext)),
        1 => dir.join(format!("{}-{}.{}", stem, now.format(COLLISION_SUFFIX_FORMAT), ext)),
        n => dir.join(format!(
            "{}-{}-{}.{}",
            stem,
            now.format(COLLISION_SUFFIX_FORMAT),
            n - 1,
            ext
        )),
    }
}

/// First free name in the sequence `<stem>.<ext>`, `<stem>-<timestamp>.<ext>`,
/// `<stem>-<timestamp>-1.<ext>`, ...
///
/// Only a snapshot: use [`rename_no_clobber`] to claim the name.
pub fn unique_destination(dir: &Path, stem: &str, ext: &str, now: DateTime<Utc>) -> PathBuf {
    (0..MAX_ATTEMPTS)
        .map(|attempt| candidate(dir, stem, ext, now, attempt))
        .find(|path| !path.exists())
        .unwrap_or_else(|| candidate(dir, stem, ext, now, MAX_ATTEMPTS))
}

/// Atomically create `to` as another name for `from`. Fails with
/// `AlreadyExists` when `to` is taken. Falls back to an exclusive copy where
/// hard links are unavailable.
fn claim(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(_) => {
            let mut target = OpenOptions::new().write(true).create_new(true).open(to)?;
            let mut source = fs::File::open(from)?;
            if let Err(e) = io::copy(&mut source, &mut target) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
    }
}

/// Rename `from` to `<stem>.<ext>` in the same directory without replacing
/// an existing file, trying the timestamped and numbered fallbacks of
/// [`unique_destination`]. Returns the final path.
///
/// # Errors
///
/// Returns an error if `from` has no parent, every candidate is taken, or
/// the move fails.
pub fn rename_no_clobber(from: &Path, stem: &str, ext: &str) -> io::Result<PathBuf> {
    let dir = from.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no parent directory: {}", from.display()),
        )
    })?;
    let now = Utc::now();

    for attempt in 0..MAX_ATTEMPTS {
        let destination = candidate(dir, stem, ext, now, attempt);
        match claim(from, &destination) {
            Ok(()) => {
                fs::remove_file(from).map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("remove {} after move failed: {}", from.display(), e),
                    )
                })?;
                return Ok(destination);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(io::Error::new(
                    e.kind(),
                    format!(
                        "rename {} -> {} failed: {}",
                        from.display(),
                        destination.display(),
                        e
                    ),
                ))
            }
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {} in {}", stem, dir.display()),
    ))
}
