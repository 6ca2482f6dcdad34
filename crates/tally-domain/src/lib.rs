//! tally-domain
//!
//! Pure domain models (Transaction, RecurringTemplate, BudgetLimit, Alert) and the
//! calculations that only need those models: calendar arithmetic, the recurrence
//! calculator and ledger aggregation. No I/O, no storage.

pub mod aggregate;
pub mod budget;
pub mod common;
pub mod recurring;
pub mod transaction;
pub mod window;

pub use aggregate::*;
pub use budget::*;
pub use common::*;
pub use recurring::*;
pub use transaction::*;
pub use window::*;
