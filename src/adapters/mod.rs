pub mod in_memory;
pub mod postgres_balance_ledger;
pub mod postgres_dead_letter_queue;
pub mod postgres_transaction_repository;

pub use in_memory::{InMemoryBalanceLedger, InMemoryDeadLetterQueue, InMemoryTransactionRepository};
pub use postgres_balance_ledger::PostgresBalanceLedger;
pub use postgres_dead_letter_queue::PostgresDeadLetterQueue;
pub use postgres_transaction_repository::PostgresTransactionRepository;
