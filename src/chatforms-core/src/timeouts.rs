//! Default collection windows.
//!
//! Every wait the engine opens is bounded by one of these unless the caller
//! overrides it through [`SetupOptions`](crate::config::SetupOptions).

/// Default window for a single field's collection loop (5 minutes).
pub const DEFAULT_FIELD_TIMEOUT_MS: u64 = 300_000;

/// Default window for the conclude/redo choice (1 minute).
pub const DEFAULT_CONCLUDE_TIMEOUT_MS: u64 = 60_000;

/// Default window for a button trigger (5 minutes).
pub const DEFAULT_BUTTON_TIMEOUT_MS: u64 = 300_000;

/// Default window during which a child page can be left with back (5 minutes).
pub const DEFAULT_BACK_TIMEOUT_MS: u64 = 300_000;

/// How long a validation failure notice stays visible (4 seconds).
pub const DEFAULT_FEEDBACK_TTL_MS: u64 = 4_000;
