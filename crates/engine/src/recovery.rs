/// Log replay: rebuilding the index at open time (and after compaction).
///
/// Replay is the crash-safety contract in action: it applies complete records
/// from byte zero and stops at the first one that does not decode, so a torn
/// trailing record is truncated from the logical state while everything
/// before it survives.
use anyhow::Result;
use aof::{AofError, AofReader, Record};
use keydir::{Entry, KeyDir};
use std::path::Path;

/// Rebuilds `index` from the log at `path`.
///
/// Each PUT installs (or overwrites) a `Located` entry; each DEL erases the
/// key. A missing file yields an empty index. The first corrupt record halts
/// replay normally — all records decoded before it are kept.
///
/// # Errors
///
/// Only hard I/O failures (open or read errors other than file-not-found)
/// propagate; corruption never does.
pub(crate) fn replay(path: &Path, index: &mut KeyDir) -> Result<()> {
    index.clear();

    let mut reader = match AofReader::open(path) {
        Ok(r) => r,
        Err(AofError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let mut records = 0u64;
    loop {
        match reader.next_record() {
            Ok(Some(Record::Put {
                key,
                value_offset,
                value_size,
            })) => {
                index.insert(
                    key,
                    Entry::Located {
                        offset: value_offset,
                        size: value_size,
                    },
                );
                records += 1;
            }
            Ok(Some(Record::Del { key })) => {
                index.remove(&key);
                records += 1;
            }
            Ok(None) => break,
            Err(AofError::Corrupt(reason)) => {
                log::warn!(
                    "halting replay of {} at corrupt record ({reason}); \
                     keeping {records} records",
                    path.display()
                );
                break;
            }
            Err(AofError::Io(e)) => return Err(e.into()),
        }
    }

    log::debug!(
        "replayed {records} records from {} ({} live keys)",
        path.display(),
        index.len()
    );
    Ok(())
}
