//! Shared-expense engine.
//!
//! Records who paid for what inside a group, splits each expense into signed
//! per-member ledger entries and reduces those entries into net balances.
//!
//! All state lives in the database; [`Engine`] only holds a connection.

pub use allocation::{PERCENT_EPSILON, SplitPolicy, SplitPolicyKind, allocate};
pub use commands::RecordExpenseCmd;
pub use error::EngineError;
pub use expenses::Expense;
pub use groups::Group;
pub use memberships::{Membership, MembershipRole};
pub use money::Money;
pub use ops::{Engine, EngineBuilder};
pub use splits::{SplitEntry, SplitKind};
pub use users::User;

mod allocation;
mod commands;
mod error;
mod expenses;
mod groups;
mod memberships;
mod money;
mod ops;
mod splits;
mod users;

type ResultEngine<T> = Result<T, EngineError>;
