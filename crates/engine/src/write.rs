/// Write path: `put()` and `del()`.
///
/// All mutations hold the outer lock exclusively. A PUT appends its record to
/// the log first and installs the index entry only after the append
/// succeeded, so readers never observe an entry whose bytes are not yet on
/// disk and a failed append leaves the index unchanged.
use anyhow::Result;
use keydir::Entry;

use crate::{Backend, Inner, Store, MAX_KEY_SIZE, MAX_VALUE_SIZE};

impl Store {
    /// Inserts or overwrites a key-value pair.
    ///
    /// Memory-only stores cache the value inline and cannot fail. Persistent
    /// stores append a PUT record and, on success, point the index at the
    /// freshly written payload; overwrites replace the old entry without
    /// consulting it (the superseded record stays in the log until
    /// compaction).
    ///
    /// # Errors
    ///
    /// Fails on an invalid key (empty, oversized, or containing whitespace —
    /// the text-framed log header cannot round-trip those), an oversized
    /// value, an I/O failure during the append, or a closed store. On error
    /// the index is unchanged.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        anyhow::ensure!(
            aof::is_valid_key(&key),
            "invalid key: must be non-empty, at most {} bytes, with no whitespace",
            MAX_KEY_SIZE
        );
        anyhow::ensure!(
            value.len() <= MAX_VALUE_SIZE,
            "value too large: {} bytes (max {})",
            value.len(),
            MAX_VALUE_SIZE
        );

        let mut inner = self.inner.write();
        let Inner { index, backend } = &mut *inner;
        match backend {
            Backend::Memory => {
                index.insert(key, Entry::Cached { bytes: value });
            }
            Backend::Disk(disk) => {
                let handles = disk
                    .handles
                    .as_mut()
                    .ok_or_else(|| anyhow::anyhow!("store is closed"))?;
                let offset = handles.writer.append_put(&key, &value)?;
                index.insert(
                    key,
                    Entry::Located {
                        offset,
                        size: value.len() as u64,
                    },
                );
            }
        }
        Ok(())
    }

    /// Removes a key, returning whether it was present immediately before.
    ///
    /// Persistent stores append a DEL record even when the key is absent, so
    /// replay applies exactly the sequence of operations that was issued. The
    /// return value reflects pre-removal presence, never the append outcome;
    /// a failed DEL append is logged and otherwise ignored.
    ///
    /// Keys the log cannot frame (empty or containing whitespace) can never
    /// be present, so they return `false` without touching the log. A closed
    /// store treats `del` as a no-op returning `false`.
    pub fn del(&self, key: &[u8]) -> bool {
        if !aof::is_valid_key(key) {
            return false;
        }

        let mut inner = self.inner.write();
        let Inner { index, backend } = &mut *inner;
        match backend {
            Backend::Memory => index.remove(key),
            Backend::Disk(disk) => {
                let Some(handles) = disk.handles.as_mut() else {
                    return false;
                };
                let existed = index.remove(key);
                if let Err(e) = handles.writer.append_del(key) {
                    log::warn!("failed to append DEL record: {e}");
                }
                existed
            }
        }
    }
}
