//! Session command handlers.

use anyhow::Result;
use handy_core::session::{FileSessionStore, SessionKey, SessionStore, mask_token};

pub fn show(store: &FileSessionStore) -> Result<()> {
    let session = store.snapshot();
    for key in SessionKey::all() {
        let value = match session.get(*key) {
            Some(value) if key.is_secret() => mask_token(value),
            Some(value) => value.to_string(),
            None => "(not set)".to_string(),
        };
        println!("{:<12} {value}", key.as_str());
    }
    println!();
    println!("Session file: {}", store.path().display());
    Ok(())
}

fn parse_slot(slot: &str) -> Result<SessionKey> {
    slot.parse::<SessionKey>().map_err(anyhow::Error::msg)
}

pub fn set(store: &FileSessionStore, slot: &str, value: &str) -> Result<()> {
    let key = parse_slot(slot)?;
    store.set(key, value)?;
    println!("✓ Stored {key}");
    Ok(())
}

pub fn clear(store: &FileSessionStore, slot: Option<&str>) -> Result<()> {
    match slot {
        Some(slot) => {
            let key = parse_slot(slot)?;
            if store.clear(key)? {
                println!("✓ Cleared {key}");
            } else {
                println!("{key} was not set.");
            }
        }
        None => {
            store.clear_all()?;
            println!("✓ Session cleared");
        }
    }
    Ok(())
}
