#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use tally::{
    config::Config,
    domain::{Transaction, TransactionDraft, TransactionId, TransactionPatch, UserId},
    services::{CoreError, FixedClock, LedgerStore, MemoryLedgerStore, ProcessGuards},
    Stores, Tracker,
};
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
}

/// Creates a unique directory that outlives the calling test.
pub fn temp_dir() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let path = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    path
}

/// In-memory tracker pinned to `now`; the clock is returned for time travel.
pub fn memory_tracker(now: DateTime<Utc>) -> (Tracker, Arc<FixedClock>) {
    tracker_with(Stores::in_memory(), now)
}

pub fn tracker_with(stores: Stores, now: DateTime<Utc>) -> (Tracker, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(now));
    let tracker = Tracker::new(
        UserId::new("tester"),
        stores,
        clock.clone(),
        Arc::new(ProcessGuards::new()),
        &Config::default(),
    );
    (tracker, clock)
}

/// Ledger whose appends fail while the switch is on.
#[derive(Default)]
pub struct FailingLedger {
    inner: MemoryLedgerStore,
    failing: AtomicBool,
}

impl FailingLedger {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl LedgerStore for FailingLedger {
    fn append(&self, draft: TransactionDraft) -> Result<TransactionId, CoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::StoreUnavailable("ledger offline".into()));
        }
        self.inner.append(draft)
    }

    fn list(&self) -> Result<Vec<Transaction>, CoreError> {
        self.inner.list()
    }

    fn update(&self, id: TransactionId, patch: &TransactionPatch) -> Result<(), CoreError> {
        self.inner.update(id, patch)
    }

    fn delete(&self, id: TransactionId) -> Result<(), CoreError> {
        self.inner.delete(id)
    }
}
