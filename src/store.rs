// 💾 Override Persistence - String-keyed key/value store
// Four logical keys, JSON-encoded values:
//   zmw_manual_forex_buy_rates   → {"USD": 23.0, ...}
//   zmw_manual_forex_sell_rates  → {"USD": 23.2, ...}
//   zmw_manual_interest_rates    → {"30 Days Fixed": 4.6, ...}
//   zmw_page_lock                → true | false
//
// Loading never fails as a whole: each key falls back to its default on its
// own, so one corrupt key cannot take the others down with it.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{BoardError, Result};
use crate::overrides::OverrideSet;

pub const FOREX_BUY_STORAGE_KEY: &str = "zmw_manual_forex_buy_rates";
pub const FOREX_SELL_STORAGE_KEY: &str = "zmw_manual_forex_sell_rates";
pub const INTEREST_STORAGE_KEY: &str = "zmw_manual_interest_rates";
pub const LOCK_STORAGE_KEY: &str = "zmw_page_lock";

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Minimal string → string persistence
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write every pair or none of them
    fn write_batch(&mut self, entries: &[(&str, String)]) -> Result<()>;

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.write_batch(&[(key, value)])
    }
}

// ============================================================================
// SQLITE BACKEND
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the board database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;

        setup_kv_table(&conn)?;
        debug!(path = %path.display(), "opened sqlite override store");
        Ok(SqliteStore { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_kv_table(&conn)?;
        Ok(SqliteStore { conn })
    }
}

fn setup_kv_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_batch(&mut self, entries: &[(&str, String)]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// Session-only store. Used in tests and when the database cannot be opened.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded store, handy for simulating what a previous session left behind
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        MemoryStore {
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write_batch(&mut self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.clone());
        }
        Ok(())
    }
}

// ============================================================================
// LOAD / SAVE
// ============================================================================

/// What startup recovered from the store
#[derive(Debug, Default)]
pub struct PersistedState {
    pub overrides: OverrideSet,
    pub locked: bool,
    /// Keys that fell back to defaults, with the reason
    pub failures: Vec<BoardError>,
}

impl PersistedState {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn load_state(store: &dyn KeyValueStore) -> PersistedState {
    let mut failures = Vec::new();

    let overrides = OverrideSet {
        forex_buy: load_rate_map(store, FOREX_BUY_STORAGE_KEY, &mut failures),
        forex_sell: load_rate_map(store, FOREX_SELL_STORAGE_KEY, &mut failures),
        interest: load_rate_map(store, INTEREST_STORAGE_KEY, &mut failures),
    };
    let locked = load_lock(store, &mut failures);

    for failure in &failures {
        warn!("falling back to default: {}", failure);
    }

    PersistedState {
        overrides,
        locked,
        failures,
    }
}

fn load_rate_map(
    store: &dyn KeyValueStore,
    key: &str,
    failures: &mut Vec<BoardError>,
) -> BTreeMap<String, f64> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return BTreeMap::new(),
        Err(e) => {
            failures.push(e);
            return BTreeMap::new();
        }
    };

    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            failures.push(corrupt(key, e.to_string()));
            return BTreeMap::new();
        }
    };

    let Some(object) = value.as_object() else {
        failures.push(corrupt(key, "expected a JSON object".to_string()));
        return BTreeMap::new();
    };

    let mut rates = BTreeMap::new();
    for (entry_key, entry) in object {
        match entry.as_f64() {
            Some(rate) if rate.is_finite() && rate >= 0.0 => {
                rates.insert(entry_key.clone(), rate);
            }
            _ => warn!(key, entry = %entry_key, "dropping invalid stored override {}", entry),
        }
    }
    rates
}

fn load_lock(store: &dyn KeyValueStore, failures: &mut Vec<BoardError>) -> bool {
    match store.get(LOCK_STORAGE_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<bool>(&raw) {
            Ok(locked) => locked,
            Err(e) => {
                failures.push(corrupt(LOCK_STORAGE_KEY, e.to_string()));
                false
            }
        },
        Ok(None) => false,
        Err(e) => {
            failures.push(e);
            false
        }
    }
}

fn corrupt(key: &str, reason: String) -> BoardError {
    BoardError::CorruptValue {
        key: key.to_string(),
        reason,
    }
}

/// Persist all three override maps in one batch
pub fn save_overrides(store: &mut dyn KeyValueStore, overrides: &OverrideSet) -> Result<()> {
    let entries = [
        (FOREX_BUY_STORAGE_KEY, to_json(&overrides.forex_buy)?),
        (FOREX_SELL_STORAGE_KEY, to_json(&overrides.forex_sell)?),
        (INTEREST_STORAGE_KEY, to_json(&overrides.interest)?),
    ];
    store.write_batch(&entries)
}

pub fn save_lock(store: &mut dyn KeyValueStore, locked: bool) -> Result<()> {
    store.set(LOCK_STORAGE_KEY, to_json(&locked)?)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| BoardError::Persistence(e.to_string()))
}
