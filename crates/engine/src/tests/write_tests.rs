use crate::*;
use anyhow::Result;
use tempfile::tempdir;

// --------------------- Memory-only semantics ---------------------

#[test]
fn memory_put_overwrite_del() {
    let store = Store::in_memory();

    store.put(b"a".to_vec(), b"1".to_vec()).unwrap();
    store.put(b"a".to_vec(), b"2".to_vec()).unwrap();
    assert_eq!(store.get(b"a").unwrap(), b"2");

    assert!(store.del(b"a"));
    assert!(store.get(b"a").is_none());
    assert!(!store.del(b"a"));
}

#[test]
fn memory_store_has_no_log_path() {
    let store = Store::in_memory();
    assert!(!store.is_persistent());
    assert!(store.log_path().is_none());
}

// --------------------- Persistent write path ---------------------

#[test]
fn put_appends_and_del_is_logged() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("kv.aof");
    let store = Store::open(&path)?;

    store.put(b"a".to_vec(), b"1".to_vec())?;
    let after_put = super::helpers::log_size(&path);
    assert!(after_put > 0);

    // DEL of an absent key is still logged, so the file must grow.
    assert!(!store.del(b"missing"));
    assert!(super::helpers::log_size(&path) > after_put);
    Ok(())
}

#[test]
fn del_returns_presence_before_removal() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path().join("kv.aof"))?;

    store.put(b"k".to_vec(), b"v".to_vec())?;
    assert!(store.del(b"k"));
    assert!(!store.del(b"k"));
    Ok(())
}

#[test]
fn overwrite_keeps_single_live_entry() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path().join("kv.aof"))?;

    for i in 0..10u32 {
        store.put(b"k".to_vec(), i.to_string().into_bytes())?;
    }
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(b"k").unwrap(), b"9");
    Ok(())
}

// --------------------- Key and value validation ---------------------

#[test]
fn put_rejects_unframeable_keys() {
    let store = Store::in_memory();

    assert!(store.put(b"".to_vec(), b"v".to_vec()).is_err());
    assert!(store.put(b"a b".to_vec(), b"v".to_vec()).is_err());
    assert!(store.put(b"a\nb".to_vec(), b"v".to_vec()).is_err());
    assert!(store.put(vec![b'k'; MAX_KEY_SIZE + 1], b"v".to_vec()).is_err());
    assert!(store.is_empty());
}

#[test]
fn put_rejects_oversized_values() {
    let store = Store::in_memory();
    let result = store.put(b"k".to_vec(), vec![0u8; MAX_VALUE_SIZE + 1]);
    assert!(result.is_err());
}

#[test]
fn del_of_unframeable_key_is_false_and_unlogged() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("kv.aof");
    let store = Store::open(&path)?;

    assert!(!store.del(b""));
    assert!(!store.del(b"a b"));
    assert_eq!(super::helpers::log_size(&path), 0);
    Ok(())
}

#[test]
fn empty_value_is_allowed() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path().join("kv.aof"))?;

    store.put(b"k".to_vec(), Vec::new())?;
    assert_eq!(store.get(b"k").unwrap(), b"");
    Ok(())
}

// --------------------- Closed state ---------------------

#[test]
fn operations_after_close() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("kv.aof");
    let store = Store::open(&path)?;
    store.put(b"k".to_vec(), b"v".to_vec())?;

    store.close();
    store.close(); // idempotent

    assert!(store.put(b"k2".to_vec(), b"v".to_vec()).is_err());
    assert!(store.get(b"k").is_none());
    assert!(!store.del(b"k"));
    assert!(store.compact().is_err());

    // Closing must not have altered the log: a fresh open sees the data.
    let reopened = Store::open(&path)?;
    assert_eq!(reopened.get(b"k").unwrap(), b"v");
    Ok(())
}

#[test]
fn close_is_a_noop_for_memory_stores() {
    let store = Store::in_memory();
    store.put(b"k".to_vec(), b"v".to_vec()).unwrap();
    store.close();
    // Memory-only stores never enter the closed state.
    assert_eq!(store.get(b"k").unwrap(), b"v");
}
