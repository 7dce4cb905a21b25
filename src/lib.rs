mod calendar;
mod config;
mod db;
mod errors;
mod journal;
mod models;
mod subscription;
mod surface;

pub use crate::calendar::{build_month_grid, discover_months};
pub use crate::config::{JournalConfig, DATA_DIR_ENV, DEFAULT_TRAILING_WINDOW_MONTHS};
pub use crate::db::{date_to_millis, Database, SCHEMA_VERSION};
pub use crate::errors::{ErrorReport, JournalError, JournalResult};
pub use crate::journal::Journal;
pub use crate::models::{
    DayCell, DayRecord, DayStatus, LongPress, MonthGrid, MonthKey, MonthTone, NoteRecord, StoreChange,
};
pub use crate::subscription::{MonthSubscription, SubscriptionManager};
pub use crate::surface::{Clipboard, Confirm, NotePrompt};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Loads config, starts file logging and opens the journal.
pub fn start() -> JournalResult<Journal> {
    let config = JournalConfig::load()?;
    std::fs::create_dir_all(&config.data_dir)?;
    init_tracing(&config.log_dir(), &config.log_filter).map_err(JournalError::Internal)?;
    Journal::open(config)
}

/// JSON logs, rotated daily, under `log_dir`. `RUST_LOG` wins over
/// `default_filter`.
pub fn init_tracing(log_dir: &Path, default_filter: &str) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "journal.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
