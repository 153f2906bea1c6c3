///! # CLI - UndertowKV Interactive Shell
///!
///! A REPL-style command-line interface for the UndertowKV storage engine.
///! Reads commands from stdin, executes them against the store, and prints
///! results to stdout. Designed for both interactive use and scripted testing
///! (pipe commands via stdin).
///!
///! ## Commands
///!
///! ```text
///! PUT key value      Insert or update a key-value pair
///! GET key            Look up a key (prints value or "(nil)")
///! DEL key            Delete a key (prints 1 if it existed, else 0)
///! COMPACT            Rewrite the log to only live keys
///! STATS              Print store debug info
///! HELP               Print this command list
///! EXIT / QUIT        Shut down gracefully
///! ```
///!
///! ## Configuration
///!
///! All settings are controlled via environment variables:
///!
///! ```text
///! UNDERTOW_LOG_PATH   log file path              (default: "data/kv.aof")
///! UNDERTOW_IN_MEMORY  no persistence if "true"   (default: "false")
///! UNDERTOW_LOG_LEVEL  log level for diagnostics  (default: "warn")
///! ```
///!
///! ## Example
///!
///! ```text
///! $ cargo run -p cli
///! UndertowKV started (mode=persistent, log=data/kv.aof, live_keys=0)
///! > PUT name Alice
///! OK
///! > GET name
///! Alice
///! > DEL name
///! 1
///! > EXIT
///! bye
///! ```

use anyhow::Result;
use engine::Store;
use std::io::{self, BufRead, Write};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn print_help() {
    println!("Commands: PUT key value | GET key | DEL key");
    println!("          COMPACT | STATS | HELP | EXIT");
}

fn main() -> Result<()> {
    let level = env_or("UNDERTOW_LOG_LEVEL", "warn")
        .parse::<simplelog::LevelFilter>()
        .unwrap_or(simplelog::LevelFilter::Warn);
    simplelog::SimpleLogger::init(level, simplelog::Config::default())?;

    let log_path = env_or("UNDERTOW_LOG_PATH", "data/kv.aof");
    let in_memory: bool = env_or("UNDERTOW_IN_MEMORY", "false").parse().unwrap_or(false);

    let store = if in_memory {
        Store::in_memory()
    } else {
        // The engine expects the data directory to exist already.
        if let Some(parent) = std::path::Path::new(&log_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Store::open(&log_path)?
    };

    println!(
        "UndertowKV started (mode={}, log={}, live_keys={})",
        if in_memory { "memory" } else { "persistent" },
        if in_memory { "-".to_string() } else { log_path.clone() },
        store.len()
    );
    print_help();
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "PUT" => {
                    if let Some(k) = parts.next() {
                        let v: String = parts.collect::<Vec<&str>>().join(" ");
                        if v.is_empty() {
                            println!("ERR usage: PUT key value");
                        } else {
                            match store.put(k.as_bytes().to_vec(), v.into_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR put failed: {e}"),
                            }
                        }
                    } else {
                        println!("ERR usage: PUT key value");
                    }
                }
                "GET" => {
                    if let Some(k) = parts.next() {
                        match store.get(k.as_bytes()) {
                            Some(v) => println!("{}", String::from_utf8_lossy(&v)),
                            None => println!("(nil)"),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "DEL" => {
                    if let Some(k) = parts.next() {
                        println!("{}", if store.del(k.as_bytes()) { 1 } else { 0 });
                    } else {
                        println!("ERR usage: DEL key");
                    }
                }
                "COMPACT" => match store.compact() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR compact failed: {e}"),
                },
                "STATS" => println!("{store:?}"),
                "HELP" => print_help(),
                "EXIT" | "QUIT" => break,
                _ => println!("ERR unknown command. Type HELP."),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    store.close();
    println!("bye");
    Ok(())
}
