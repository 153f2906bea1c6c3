use std::fs;
use std::path::Path;

pub fn log_size(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

/// Appends raw bytes to an existing log, bypassing the store (for torn-tail
/// and corruption scenarios).
pub fn append_raw(path: &Path, bytes: &[u8]) {
    use std::io::Write;
    let mut f = fs::OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(bytes).unwrap();
}
