//! # AOF — Append-Only File log codec
//!
//! The on-disk representation for UndertowKV. Every mutation (`PUT` or `DEL`)
//! is framed as a text-headed record and appended to a single log file. The
//! engine keeps only byte offsets in memory and reads value payloads back with
//! positioned reads, so offsets returned by the writer must stay valid for the
//! lifetime of the file.
//!
//! ## Record Format
//!
//! ```text
//! PUT <key> <value-length>\n<value bytes...>\n
//! DEL <key>\n
//! ```
//!
//! The header is whitespace-delimited text; the value payload is raw bytes of
//! the exact length announced in the header, followed by a single `\n`
//! trailer. The length prefix makes values binary-safe (embedded newlines are
//! fine); keys must not contain whitespace or the header cannot round-trip —
//! see [`is_valid_key`]. There is no file header, footer, or checksum: the
//! file is nothing but a concatenation of records.
//!
//! ## Example
//!
//! ```rust,no_run
//! use aof::{AofReader, AofWriter};
//!
//! let mut w = AofWriter::open("kv.aof").unwrap();
//! let offset = w.append_put(b"hello", b"world").unwrap();
//! w.append_del(b"hello").unwrap();
//! drop(w);
//!
//! let mut r = AofReader::open("kv.aof").unwrap();
//! while let Some(rec) = r.next_record().unwrap() {
//!     println!("{rec:?}");
//! }
//! # let _ = offset;
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;
/// Maximum allowed value size in bytes (10 MiB).
///
/// The decoder treats a header announcing more than this as corruption, which
/// bounds the work a damaged size field can cause during replay.
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// One decoded record from the log.
///
/// `Put` does not carry the value bytes — only where they live. Replay never
/// materializes values; readers fetch them later with [`read_value_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A key-value insertion. `value_offset` is the absolute byte position of
    /// the first value byte, `value_size` the exact payload length.
    Put {
        key: Vec<u8>,
        value_offset: u64,
        value_size: u64,
    },
    /// A key deletion.
    Del { key: Vec<u8> },
}

/// Errors that can occur during log operations.
#[derive(Debug, Error)]
pub enum AofError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record that cannot be decoded: torn tail, bad trailer, unparseable
    /// header, empty key, oversized length field, or unknown operation token.
    #[error("corrupt record: {0}")]
    Corrupt(&'static str),
}

/// Returns whether `key` can be framed by the text header: non-empty, within
/// [`MAX_KEY_SIZE`], and free of ASCII whitespace (space and newline would
/// break the whitespace-delimited header; the rest are rejected wholesale to
/// keep the contract simple).
pub fn is_valid_key(key: &[u8]) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_SIZE && !key.iter().any(|b| b.is_ascii_whitespace())
}

/// Append-only log writer.
///
/// Each record is assembled in a reusable scratch buffer and written with a
/// single `write_all`, then the stream is flushed. No fsync is issued per
/// append; callers that need crash-durable acknowledgement use
/// [`AofWriter::sync_to_disk`].
pub struct AofWriter {
    file: File,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl AofWriter {
    /// Opens (or creates) a log file in append mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AofError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            buf: Vec::with_capacity(256),
        })
    }

    /// Creates a log file from scratch, truncating anything already there.
    /// Used for the compaction rewrite target.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, AofError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            buf: Vec::with_capacity(256),
        })
    }

    /// Appends a PUT record and returns the absolute byte offset at which the
    /// value payload begins.
    ///
    /// The offset is measured from the start of the file: the end-of-file
    /// position is queried explicitly before the write rather than assuming
    /// the cursor already sits there, so the returned offset stays valid for
    /// later positioned reads.
    pub fn append_put(&mut self, key: &[u8], value: &[u8]) -> Result<u64, AofError> {
        validate_for_append(key, value.len())?;

        self.buf.clear();
        self.buf.extend_from_slice(b"PUT ");
        self.buf.extend_from_slice(key);
        self.buf.push(b' ');
        self.buf.extend_from_slice(value.len().to_string().as_bytes());
        self.buf.push(b'\n');
        let header_len = self.buf.len() as u64;
        self.buf.extend_from_slice(value);
        self.buf.push(b'\n');

        let record_start = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&self.buf)?;
        self.file.flush()?;

        Ok(record_start + header_len)
    }

    /// Appends a DEL record.
    pub fn append_del(&mut self, key: &[u8]) -> Result<(), AofError> {
        validate_for_append(key, 0)?;

        self.buf.clear();
        self.buf.extend_from_slice(b"DEL ");
        self.buf.extend_from_slice(key);
        self.buf.push(b'\n');

        self.file.write_all(&self.buf)?;
        self.file.flush()?;
        Ok(())
    }

    /// Forces all written data down to the disk via `sync_all()`.
    ///
    /// The engine only calls this when sealing a compaction temporary file
    /// before the rename; ordinary appends rely on best-effort flushing.
    pub fn sync_to_disk(&mut self) -> Result<(), AofError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

fn validate_for_append(key: &[u8], value_len: usize) -> Result<(), AofError> {
    if !is_valid_key(key) {
        return Err(AofError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "key must be non-empty, within the size cap, and contain no whitespace",
        )));
    }
    if value_len > MAX_VALUE_SIZE {
        return Err(AofError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "value exceeds MAX_VALUE_SIZE",
        )));
    }
    Ok(())
}

/// Streaming log decoder.
///
/// Generic over any `Read` implementor so unit tests can decode from an
/// in-memory buffer. The decoder tracks its absolute byte position itself and
/// never seeks, so value payloads are skipped (not materialized) during
/// replay.
///
/// Termination contract: [`AofReader::next_record`] yields `Ok(Some(_))` per
/// complete record, `Ok(None)` at a clean end of stream, and
/// `Err(AofError::Corrupt(_))` at the first record that cannot be decoded —
/// including a torn trailing record from a crash mid-append.
pub struct AofReader<R: Read> {
    rdr: BufReader<R>,
    /// Absolute byte position of the next unread byte.
    pos: u64,
}

impl AofReader<File> {
    /// Opens an existing log file for sequential decoding from byte zero.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<AofReader<File>, AofError> {
        let f = File::open(path)?;
        Ok(AofReader::from_reader(f))
    }
}

impl<R: Read> AofReader<R> {
    /// Constructs a decoder from any `Read` implementor.
    pub fn from_reader(reader: R) -> Self {
        AofReader {
            rdr: BufReader::new(reader),
            pos: 0,
        }
    }

    /// Decodes the next record, if any.
    pub fn next_record(&mut self) -> Result<Option<Record>, AofError> {
        let mut line = Vec::new();
        let n = self.rdr.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None); // clean end of stream
        }
        if line.last() != Some(&b'\n') {
            return Err(AofError::Corrupt("truncated header"));
        }
        self.pos += n as u64;
        line.pop();

        let mut fields = line.split(|&b| b == b' ');
        // split() always yields at least one (possibly empty) field
        let op = fields.next().unwrap_or(b"");
        match op {
            b"PUT" => {
                let key = fields.next().ok_or(AofError::Corrupt("missing key"))?;
                let size_field = fields
                    .next()
                    .ok_or(AofError::Corrupt("missing value length"))?;
                if fields.next().is_some() {
                    return Err(AofError::Corrupt("trailing header fields"));
                }
                if key.is_empty() {
                    return Err(AofError::Corrupt("empty key"));
                }
                let value_size: u64 = std::str::from_utf8(size_field)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(AofError::Corrupt("unparseable value length"))?;
                if value_size > MAX_VALUE_SIZE as u64 {
                    return Err(AofError::Corrupt("value length exceeds cap"));
                }

                let value_offset = self.pos;

                // Skip the payload without materializing it.
                let skipped = io::copy(&mut (&mut self.rdr).take(value_size), &mut io::sink())?;
                if skipped != value_size {
                    return Err(AofError::Corrupt("truncated value"));
                }
                self.pos += value_size;

                let mut trailer = [0u8; 1];
                match self.rdr.read_exact(&mut trailer) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        return Err(AofError::Corrupt("missing trailer"));
                    }
                    Err(e) => return Err(e.into()),
                }
                if trailer[0] != b'\n' {
                    return Err(AofError::Corrupt("bad trailer"));
                }
                self.pos += 1;

                Ok(Some(Record::Put {
                    key: key.to_vec(),
                    value_offset,
                    value_size,
                }))
            }
            b"DEL" => {
                let key = fields.next().ok_or(AofError::Corrupt("missing key"))?;
                if fields.next().is_some() {
                    return Err(AofError::Corrupt("trailing header fields"));
                }
                if key.is_empty() {
                    return Err(AofError::Corrupt("empty key"));
                }
                Ok(Some(Record::Del { key: key.to_vec() }))
            }
            _ => Err(AofError::Corrupt("unknown operation")),
        }
    }
}

/// Positioned read of exactly `size` bytes at absolute byte `offset`.
///
/// The seek moves the handle's cursor, so callers sharing one handle across
/// threads must serialize the whole call (the engine wraps its read handle in
/// a mutex for exactly this reason).
pub fn read_value_at(file: &mut File, offset: u64, size: u64) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
