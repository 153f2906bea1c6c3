/// Read path: `get()`.
///
/// Lookups take the outer lock in shared mode only. A `Cached` entry returns
/// its bytes directly; a `Located` entry is resolved with a positioned read
/// against the log, serialized behind the reader mutex so concurrent gets
/// cannot race each other's file cursor.
use keydir::Entry;

use crate::{Backend, Store};

impl Store {
    /// Looks up a key, returning its current value or `None` if absent.
    ///
    /// Absence is distinct from a present-but-empty value: a key holding an
    /// empty value returns `Some(vec![])`.
    ///
    /// A positioned read that fails or comes back short is surfaced as
    /// `None`. Under the locking discipline a live entry can never point past
    /// the end of the log, so this only happens when the file was damaged
    /// behind the store's back.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let inner = self.inner.read();
        let entry = inner.index.get(key)?;
        match entry {
            Entry::Cached { bytes } => Some(bytes.clone()),
            Entry::Located { offset, size } => match &inner.backend {
                Backend::Disk(disk) => {
                    let handles = disk.handles.as_ref()?;
                    let mut file = handles.reader.lock();
                    aof::read_value_at(&mut file, *offset, *size).ok()
                }
                // A memory-only store never installs Located entries.
                Backend::Memory => None,
            },
        }
    }
}
