// Rate Board - Core Library
// Override resolution + board state for a static FX / interest rate board.
// Exposes all modules for use in the terminal UI, the CLI and tests.

pub mod error;
pub mod reference;   // Mid rates + interest schedule
pub mod overrides;   // Manual override set
pub mod store;       // Key/value persistence (SQLite, memory)
pub mod resolver;    // Reference + overrides → effective rates
pub mod board;       // Current vs previous snapshot, single-flight recompute
pub mod gate;        // Passphrase, lock, two-step confirm
pub mod controller;  // Single owner of board state
pub mod display;     // Rounding + rows for renderers
pub mod export;      // CSV export
pub mod config;

// Re-export commonly used types
pub use error::{AccessDenied, BoardError, ConfigError, Result};
pub use reference::{
    Currency, InterestTerm, ReferenceData,
    SPREAD_FACTOR_BUY, SPREAD_FACTOR_SELL,
};
pub use overrides::{
    OverrideChange, OverrideInput, OverrideSet, OverrideTarget, RateCategory,
    parse_override_input,
};
pub use store::{
    KeyValueStore, MemoryStore, SqliteStore, PersistedState,
    load_state, save_lock, save_overrides,
};
pub use resolver::{
    ResolvedRates,
    resolve_all, resolve_buy, resolve_interest, resolve_sell,
};
pub use board::{
    BoardSnapshot, BoardTracker, ChangeFlags, RecomputeOutcome, CHANGE_EPSILON,
};
pub use gate::{AccessGate, ConfirmState, PendingIntent, hash_passphrase};
pub use controller::{BoardController, NullRenderer, Renderer, Severity};
pub use display::{BoardView, ForexRow, InterestRow, build_view, format_percent, format_rate};
pub use export::export_board;
pub use config::BoardConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
