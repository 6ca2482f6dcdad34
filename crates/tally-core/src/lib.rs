//! tally-core
//!
//! Services for recurring execution, budget evaluation and forecasting.
//! Depends on tally-domain. Persistence is reached only through the store traits.

pub mod budget_service;
pub mod error;
pub mod execution_service;
pub mod forecast_service;
pub mod memory_storage;
pub mod recurrence_service;
pub mod storage;
pub mod summary_service;
pub mod time;
pub mod transaction_service;

#[cfg(test)]
mod tests;

pub use budget_service::*;
pub use error::CoreError;
pub use execution_service::*;
pub use forecast_service::*;
pub use memory_storage::*;
pub use recurrence_service::*;
pub use storage::{BudgetStore, LedgerStore, TemplateStore};
pub use summary_service::*;
pub use time::{Clock, FixedClock};
pub use transaction_service::*;
