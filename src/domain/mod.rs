pub mod balance;
pub mod query;
pub mod transaction;

pub use balance::{Balance, BalanceDlqEntry, DebitPolicy};
pub use query::{OrderBy, SortOrder, TransactionFilter, TransactionPage};
pub use transaction::{PayMode, Transaction, TransactionStatus, TransactionType};
