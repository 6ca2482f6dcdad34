#![doc(test(attr(deny(warnings))))]

//! Tally records income and expenses, materializes recurring entries into the
//! ledger, evaluates monthly budgets and forecasts next month's spending.
//!
//! [`Tracker`] is the entry point for one user; the member crates are
//! re-exported for callers that need the lower layers directly.

pub mod errors;
pub mod system_clock;
pub mod tracker;
pub mod utils;

use std::sync::Once;

pub use errors::TallyError;
pub use system_clock::SystemClock;
pub use tally_config as config;
pub use tally_core as services;
pub use tally_domain as domain;
pub use tally_storage_json as storage;
pub use tracker::{AddOutcome, Stores, Tracker};

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter and emits a startup log.
pub fn init() {
    init_with_filter(utils::DEFAULT_LOG_FILTER);
}

/// Like [`init`], using the filter from `config`.
pub fn init_with_config(config: &config::Config) {
    init_with_filter(&config.log_filter);
}

fn init_with_filter(directives: &str) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(directives);
        tracing::info!("Tally tracing initialized.");
    });
}
