//! Core vault transaction model

pub mod transaction;

pub use transaction::{CanonicalTransaction, Operation, TransactionError, TransactionTemplate};
