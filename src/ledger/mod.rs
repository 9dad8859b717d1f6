pub mod memory;
pub mod ynab;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{AccountId, Transaction, TransactionUpsert};

pub use memory::MemoryLedger;
pub use ynab::YnabLedger;

/// counts reported back by a batch write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub created: usize,
    pub updated: usize,
}

/// the two ledger operations a run consumes
#[async_trait]
pub trait Ledger: Send + Sync {
    /// all transactions of an account, ascending by date
    async fn list_transactions(
        &self,
        budget_id: &str,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>>;

    /// create records without an id, update the rest in place
    async fn upsert_transactions(
        &self,
        budget_id: &str,
        transactions: Vec<TransactionUpsert>,
    ) -> Result<UpsertSummary>;
}
