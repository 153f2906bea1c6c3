use crate::*;
use anyhow::Result;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[test]
fn store_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Store>();
}

// --------------------- Contended writers ---------------------

#[test]
fn concurrent_writers_on_one_key_memory() {
    let store = Arc::new(Store::in_memory());
    let mut handles = Vec::new();

    for tid in 0..8u32 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..5000u32 {
                store
                    .put(b"hot".to_vec(), format!("{tid}:{i}").into_bytes())
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    // The winner is whichever put was ordered last, but the value must be
    // one that some thread actually wrote: "<digits>:<digits>".
    let value = store.get(b"hot").unwrap();
    let s = std::str::from_utf8(&value).unwrap();
    let (tid, i) = s.split_once(':').unwrap();
    assert!(is_digits(tid) && is_digits(i), "unexpected value {s:?}");
}

#[test]
fn concurrent_writers_on_one_key_persistent() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("kv.aof");
    let store = Arc::new(Store::open(&path)?);
    let mut handles = Vec::new();

    for tid in 0..4u32 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..500u32 {
                store
                    .put(b"hot".to_vec(), format!("{tid}:{i}").into_bytes())
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let value = store.get(b"hot").unwrap();
    let s = std::str::from_utf8(&value).unwrap();
    let (tid, i) = s.split_once(':').unwrap();
    assert!(is_digits(tid) && is_digits(i), "unexpected value {s:?}");

    // The same winner must be durable across a reopen.
    store.close();
    let reopened = Store::open(&path)?;
    assert_eq!(reopened.get(b"hot").unwrap(), value);
    Ok(())
}

#[test]
fn concurrent_writers_on_distinct_keys() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(Store::open(dir.path().join("kv.aof"))?);
    let mut handles = Vec::new();

    for tid in 0..4u32 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..250u32 {
                store
                    .put(
                        format!("t{tid}-k{i}").into_bytes(),
                        format!("{tid}:{i}").into_bytes(),
                    )
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    // With no cross-thread contention per key, every key holds exactly the
    // value its writer put last.
    assert_eq!(store.len(), 4 * 250);
    for tid in 0..4u32 {
        for i in 0..250u32 {
            assert_eq!(
                store.get(format!("t{tid}-k{i}").as_bytes()).unwrap(),
                format!("{tid}:{i}").into_bytes()
            );
        }
    }
    Ok(())
}

// --------------------- Readers racing writers ---------------------

#[test]
fn readers_never_observe_unwritten_values() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(Store::open(dir.path().join("kv.aof"))?);
    store.put(b"hot".to_vec(), b"0:0".to_vec())?;

    let mut handles = Vec::new();
    for tid in 1..4u32 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..300u32 {
                store
                    .put(b"hot".to_vec(), format!("{tid}:{i}").into_bytes())
                    .unwrap();
            }
        }));
    }
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for _ in 0..2000 {
                // Present the whole time; every observation must parse as a
                // value some writer produced.
                let value = store.get(b"hot").expect("hot key must stay present");
                let s = std::str::from_utf8(&value).unwrap();
                let (tid, i) = s.split_once(':').unwrap();
                assert!(is_digits(tid) && is_digits(i), "unexpected value {s:?}");
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    Ok(())
}

#[test]
fn readers_race_compaction_safely() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(Store::open(dir.path().join("kv.aof"))?);
    for i in 0..50u32 {
        store.put(format!("k{i}").into_bytes(), format!("v{i}").into_bytes())?;
    }

    let mut handles = Vec::new();
    {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for _ in 0..10 {
                store.compact().unwrap();
            }
        }));
    }
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for round in 0..500u32 {
                let i = round % 50;
                let value = store.get(format!("k{i}").as_bytes()).unwrap();
                assert_eq!(value, format!("v{i}").into_bytes());
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    Ok(())
}
