/// Compaction: rewrites the log to one PUT per live key.
///
/// The rewrite goes to `<log>.tmp` and is installed with the portable
/// two-rename swap (`log → log.bak`, `log.tmp → log`). Recovery only ever
/// opens `<log>`, so a straggler `.tmp` or `.bak` left by a crash is inert;
/// the next compaction truncates or removes it.
use anyhow::{Context, Result};
use aof::AofWriter;
use keydir::{Entry, KeyDir};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::{recovery, Backend, Handles, Inner, Store};

impl Store {
    /// Rewrites the log so that only the latest PUT per live key remains,
    /// discarding superseded PUTs and all DELs, then atomically replaces the
    /// old log and rebuilds the index against the new file's offsets.
    ///
    /// Holds the exclusive lock for the whole protocol, so the index
    /// snapshot it walks is consistent and no reader can observe the swap in
    /// progress. The store's own file handles are released before the
    /// renames (required on platforms that keep renamed-over files open) and
    /// reopened before returning — on the error path too, so a failed
    /// compaction leaves the store serving the old log.
    ///
    /// Idempotent under repeated invocation; a no-op success on a
    /// memory-only store.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors while writing or installing the new log, or if
    /// the store is closed. A value that can no longer be read from the old
    /// log causes that key to be skipped, not an abort.
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.inner.write();
        let Inner { index, backend } = &mut *inner;
        let disk = match backend {
            Backend::Memory => return Ok(()),
            Backend::Disk(d) => d,
        };
        anyhow::ensure!(disk.handles.is_some(), "store is closed");

        // Release our handles so the renames below succeed everywhere.
        disk.handles = None;

        let tmp = sibling(&disk.path, ".tmp");
        let bak = sibling(&disk.path, ".bak");

        let outcome = rewrite_live(index, &disk.path, &tmp)
            .and_then(|()| swap_log(&disk.path, &tmp, &bak));

        // Whichever file is current after the swap (the new log on success,
        // the original on failure), rebuild the index against it and reopen
        // the handles before surfacing the outcome.
        recovery::replay(&disk.path, index)?;
        disk.handles = Some(Handles::open(&disk.path)?);

        outcome
    }
}

/// Writes one PUT per live key into a fresh log at `tmp`, reading current
/// values from the old log through a dedicated handle (the store's own
/// handles are already released at this point).
fn rewrite_live(index: &KeyDir, log: &Path, tmp: &Path) -> Result<()> {
    if let Some(parent) = log.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut out = AofWriter::create(tmp).context("failed to create compaction temp file")?;
    let mut src = File::open(log).ok();

    let mut kept = 0u64;
    let mut skipped = 0u64;
    for (key, entry) in index.iter() {
        let value = match entry {
            Entry::Cached { bytes } => Some(bytes.clone()),
            Entry::Located { offset, size } => src
                .as_mut()
                .and_then(|f| aof::read_value_at(f, *offset, *size).ok()),
        };
        match value {
            Some(v) => {
                out.append_put(key, &v)?;
                kept += 1;
            }
            // Unreadable value: drop the key rather than aborting.
            None => skipped += 1,
        }
    }

    out.sync_to_disk()?;

    if skipped > 0 {
        log::warn!("compaction skipped {skipped} keys with unreadable values");
    }
    log::debug!("compaction wrote {kept} live records to {}", tmp.display());
    Ok(())
}

/// The two-rename swap: `log → log.bak`, `tmp → log`, then drop the backup.
///
/// If installing the new log fails after the original was moved aside, the
/// original is moved back so an error return never leaves the path without a
/// log file.
fn swap_log(log: &Path, tmp: &Path, bak: &Path) -> Result<()> {
    if bak.exists() {
        fs::remove_file(bak)?;
    }
    let had_log = log.exists();
    if had_log {
        fs::rename(log, bak)?;
    }
    if let Err(e) = fs::rename(tmp, log) {
        if had_log {
            let _ = fs::rename(bak, log);
        }
        return Err(e).context("failed to install compacted log");
    }
    if had_log {
        // Recovery ignores a straggler .bak, so best-effort removal is fine.
        let _ = fs::remove_file(bak);
    }
    Ok(())
}

/// `<log>.tmp`-style sibling: appends to the full file name rather than
/// replacing the extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
