//! # Engine - UndertowKV Storage Engine
//!
//! The central orchestrator that ties together the [`aof`] log codec and the
//! [`keydir`] index into a complete log-structured key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Threads (shared &Store)
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   STORE                       │
//! │                                               │
//! │ write.rs → AOF append → keydir install        │
//! │              (exclusive lock)                 │
//! │                                               │
//! │ read.rs  → keydir lookup → positioned read    │
//! │              (shared lock + reader mutex)     │
//! │                                               │
//! │ compaction.rs → rewrite live keys to .tmp     │
//! │                 → two-rename swap → replay    │
//! │                                               │
//! │ recovery.rs → replay log from byte zero       │
//! │               at open time                    │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                                 |
//! |----------------|---------------------------------------------------------|
//! | [`lib.rs`]     | `Store` struct, constructors, accessors, `Debug`, close |
//! | [`recovery`]   | Log replay with torn-tail truncation                    |
//! | [`write`]      | `put()` and `del()`                                     |
//! | [`read`]       | `get()`                                                 |
//! | [`compaction`] | `compact()` with atomic two-rename log swap             |
//!
//! ## Crash Safety
//!
//! Every PUT's index entry is installed only after the full record (value and
//! trailer included) has been appended and flushed. Replay applies records
//! from byte zero and stops at the first one that does not decode, so a torn
//! trailing record from a crash mid-append is silently truncated from the
//! logical state. Compaction writes a complete replacement log to `<log>.tmp`
//! and installs it with the portable two-rename swap (`log → log.bak`,
//! `log.tmp → log`); a crash at any step leaves either the original or the
//! new log, and recovery only ever opens `<log>` itself.
//!
//! ## Concurrency
//!
//! The store is shared by reference across threads; all operations take
//! `&self`. One reader/writer lock guards the index and the file handles:
//! `get` holds it shared, every mutation holds it exclusive. Because `get`
//! performs a seek+read on the log under the shared lock, the read handle
//! sits behind its own mutex — a bare shared file cursor would let two
//! concurrent reads race each other's seeks.

mod compaction;
mod read;
mod recovery;
mod write;

use anyhow::Result;
use aof::AofWriter;
use keydir::KeyDir;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

pub use aof::{MAX_KEY_SIZE, MAX_VALUE_SIZE};

/// A log-structured key-value store.
///
/// Keys and values are arbitrary byte strings; keys must be non-empty and
/// free of ASCII whitespace (the log header is whitespace-delimited — see
/// [`aof::is_valid_key`]). A store is either memory-only (no I/O side
/// effects; data dies with the instance) or bound to a single log file that
/// persists every write.
///
/// The store spawns no threads and all operations are synchronous. It is
/// `Send + Sync`; share it by reference (or `Arc`) across threads.
pub struct Store {
    inner: RwLock<Inner>,
}

pub(crate) struct Inner {
    pub(crate) index: KeyDir,
    pub(crate) backend: Backend,
}

pub(crate) enum Backend {
    Memory,
    Disk(DiskLog),
}

pub(crate) struct DiskLog {
    pub(crate) path: PathBuf,
    /// `None` once the store is closed, and transiently inside compaction
    /// while the log file is being swapped (unobservable — the exclusive
    /// lock is held for the whole swap).
    pub(crate) handles: Option<Handles>,
}

pub(crate) struct Handles {
    pub(crate) writer: AofWriter,
    /// Read handle for positioned value reads. `get` holds the outer lock
    /// only in shared mode, so the seek+read pair is serialized here.
    pub(crate) reader: Mutex<File>,
}

impl Handles {
    pub(crate) fn open(path: &Path) -> Result<Handles> {
        // The writer creates the file if it does not exist yet, so open it
        // before the read handle.
        let writer = AofWriter::open(path)?;
        let reader = File::open(path)?;
        Ok(Handles {
            writer,
            reader: Mutex::new(reader),
        })
    }
}

impl Store {
    /// Creates a memory-only store: no log path, no file I/O, values held
    /// inline in the index. Dropping the store loses all data.
    pub fn in_memory() -> Store {
        Store {
            inner: RwLock::new(Inner {
                index: KeyDir::new(),
                backend: Backend::Memory,
            }),
        }
    }

    /// Opens a store bound to `path`, replaying the existing log (if any)
    /// to rebuild the index.
    ///
    /// A missing or empty log yields an empty store. A torn trailing record
    /// is truncated from the logical state; everything before it is kept.
    /// The parent directory must already exist.
    ///
    /// Two stores open on the same path are unsupported and produce
    /// undefined on-disk state.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store> {
        let path = path.as_ref().to_path_buf();

        // Replay before opening the writer so no append handle is held while
        // the file is being scanned (avoids file-sharing conflicts on
        // Windows).
        let mut index = KeyDir::new();
        recovery::replay(&path, &mut index)?;

        let handles = Handles::open(&path)?;

        Ok(Store {
            inner: RwLock::new(Inner {
                index,
                backend: Backend::Disk(DiskLog {
                    path,
                    handles: Some(handles),
                }),
            }),
        })
    }

    /// Releases any held file handles. No-op for a memory-only store, and
    /// idempotent. The log file itself is left untouched.
    ///
    /// After closing a persistent store, `put` and `compact` fail, `get`
    /// returns `None`, and `del` is a no-op returning `false`.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        if let Backend::Disk(disk) = &mut inner.backend {
            disk.handles = None;
        }
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().index.is_empty()
    }

    /// Whether the store is bound to a log file.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.inner.read().backend, Backend::Disk(_))
    }

    /// The log path for a persistent store, `None` for memory-only.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        match &self.inner.read().backend {
            Backend::Memory => None,
            Backend::Disk(disk) => Some(disk.path.clone()),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        let mut d = f.debug_struct("Store");
        d.field("live_keys", &inner.index.len());
        match &inner.backend {
            Backend::Memory => {
                d.field("mode", &"memory");
            }
            Backend::Disk(disk) => {
                d.field("mode", &"persistent");
                d.field("log_path", &disk.path);
                d.field("open", &disk.handles.is_some());
            }
        }
        d.finish()
    }
}

#[cfg(test)]
mod tests;
