//! tally-storage-json
//!
//! Filesystem JSON implementation of the tally-core store traits.
//! Each collection lives in its own file and is rewritten whole on every change.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
    process,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use once_cell::sync::Lazy;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tally_core::{BudgetStore, CoreError, LedgerStore, TemplateStore};
use tally_domain::{
    BudgetLimit, RecurringTemplate, TemplateDraft, TemplateId, Transaction, TransactionDraft,
    TransactionId, TransactionPatch,
};
use tracing::debug;

pub const TRANSACTIONS_FILE: &str = "transactions.json";
pub const TEMPLATES_FILE: &str = "templates.json";
pub const BUDGETS_FILE: &str = "budgets.json";
const TMP_SUFFIX: &str = "tmp";

/// One lock per canonical file path, shared by every store opened in this process.
static FILE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = FILE_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

/// The three stores backing one data directory.
#[derive(Debug)]
pub struct JsonStore {
    pub ledger: JsonLedgerStore,
    pub templates: JsonTemplateStore,
    pub budgets: JsonBudgetStore,
}

impl JsonStore {
    /// Opens (creating if needed) the store files under `dir`.
    ///
    /// Stores opened on the same directory share per-file locks, however the
    /// path was spelled.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let dir = fs::canonicalize(&dir)?;
        Ok(Self {
            ledger: JsonLedgerStore {
                file: JsonFile::new(dir.join(TRANSACTIONS_FILE)),
            },
            templates: JsonTemplateStore {
                file: JsonFile::new(dir.join(TEMPLATES_FILE)),
            },
            budgets: JsonBudgetStore {
                file: JsonFile::new(dir.join(BUDGETS_FILE)),
            },
        })
    }
}

/// On-disk shape of an id-keyed collection.
#[derive(Debug, Serialize, Deserialize)]
struct Table<T> {
    next_id: u64,
    records: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// One JSON document on disk, read and rewritten under its path's shared lock.
#[derive(Debug)]
struct JsonFile<D> {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    _doc: PhantomData<fn() -> D>,
}

impl<D> JsonFile<D>
where
    D: Default + Serialize + DeserializeOwned,
{
    fn new(path: PathBuf) -> Self {
        Self {
            lock: file_lock(&path),
            path,
            _doc: PhantomData,
        }
    }

    fn read(&self) -> Result<D, CoreError> {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }

    /// Loads the document, lets `f` change it and writes it back if `f` succeeds.
    fn modify<R>(&self, f: impl FnOnce(&mut D) -> Result<R, CoreError>) -> Result<R, CoreError> {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.load()?;
        let out = f(&mut doc)?;
        self.store(&doc)?;
        Ok(out)
    }

    fn load(&self) -> Result<D, CoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(D::default()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&data).map_err(|err| {
            CoreError::StoreUnavailable(format!("{}: {}", self.path.display(), err))
        })
    }

    fn store(&self, doc: &D) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|err| CoreError::StoreUnavailable(err.to_string()))?;
        let tmp = tmp_path(&self.path);
        let written = write_file(&tmp, &json)
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(CoreError::from));
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        debug!(path = %self.path.display(), bytes = json.len(), "store file written");
        Ok(())
    }
}

#[derive(Debug)]
pub struct JsonLedgerStore {
    file: JsonFile<Table<Transaction>>,
}

impl LedgerStore for JsonLedgerStore {
    fn append(&self, draft: TransactionDraft) -> Result<TransactionId, CoreError> {
        self.file.modify(|table| {
            let id = table.allocate_id();
            table.records.push(Transaction::from_draft(id, draft));
            Ok(id)
        })
    }

    fn list(&self) -> Result<Vec<Transaction>, CoreError> {
        Ok(self.file.read()?.records)
    }

    fn update(&self, id: TransactionId, patch: &TransactionPatch) -> Result<(), CoreError> {
        self.file.modify(|table| {
            let txn = table
                .records
                .iter_mut()
                .find(|txn| txn.id == id)
                .ok_or(CoreError::TransactionNotFound(id))?;
            patch.apply(txn);
            Ok(())
        })
    }

    fn delete(&self, id: TransactionId) -> Result<(), CoreError> {
        self.file.modify(|table| {
            let before = table.records.len();
            table.records.retain(|txn| txn.id != id);
            if table.records.len() == before {
                return Err(CoreError::TransactionNotFound(id));
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct JsonTemplateStore {
    file: JsonFile<Table<RecurringTemplate>>,
}

impl TemplateStore for JsonTemplateStore {
    fn list(&self) -> Result<Vec<RecurringTemplate>, CoreError> {
        Ok(self.file.read()?.records)
    }

    fn insert(&self, draft: TemplateDraft) -> Result<TemplateId, CoreError> {
        self.file.modify(|table| {
            let id = table.allocate_id();
            table.records.push(RecurringTemplate::from_draft(id, draft));
            Ok(id)
        })
    }

    fn save(&self, template: &RecurringTemplate) -> Result<(), CoreError> {
        self.file.modify(|table| {
            let slot = table
                .records
                .iter_mut()
                .find(|existing| existing.id == template.id)
                .ok_or(CoreError::TemplateNotFound(template.id))?;
            *slot = template.clone();
            Ok(())
        })
    }

    fn delete(&self, id: TemplateId) -> Result<(), CoreError> {
        self.file.modify(|table| {
            let before = table.records.len();
            table.records.retain(|template| template.id != id);
            if table.records.len() == before {
                return Err(CoreError::TemplateNotFound(id));
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct JsonBudgetStore {
    file: JsonFile<Vec<BudgetLimit>>,
}

impl BudgetStore for JsonBudgetStore {
    fn list(&self) -> Result<Vec<BudgetLimit>, CoreError> {
        self.file.read()
    }

    fn set(&self, limit: BudgetLimit) -> Result<(), CoreError> {
        self.file.modify(|limits| {
            match limits.iter_mut().find(|existing| existing.category == limit.category) {
                Some(existing) => *existing = limit,
                None => limits.push(limit),
            }
            Ok(())
        })
    }

    fn remove(&self, category: &str) -> Result<bool, CoreError> {
        self.file.modify(|limits| {
            let before = limits.len();
            limits.retain(|limit| limit.category != category);
            Ok(limits.len() != before)
        })
    }
}

/// Unique sibling path for one write, `<file>.<pid>.<seq>.tmp`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let unique = format!("{}.{}.{}", process::id(), seq, TMP_SUFFIX);
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, unique),
        None => unique,
    };
    tmp.set_extension(ext);
    tmp
}

fn write_file(path: &Path, data: &str) -> Result<(), CoreError> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
