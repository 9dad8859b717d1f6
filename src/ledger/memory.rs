use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{AccrualError, Result};
use crate::ledger::{Ledger, UpsertSummary};
use crate::types::{AccountId, Transaction, TransactionUpsert};

/// in-process ledger for tests and dry runs
#[derive(Default)]
pub struct MemoryLedger {
    accounts: Mutex<HashMap<AccountId, Vec<Transaction>>>,
    upsert_calls: Mutex<Vec<Vec<TransactionUpsert>>>,
    failing_reads: Mutex<HashSet<AccountId>>,
    fail_writes: Mutex<bool>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, transaction: Transaction) {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let entries = accounts.entry(transaction.account_id).or_default();
        entries.push(transaction);
        entries.sort_by_key(|tx| tx.date);
    }

    pub fn transactions(&self, account_id: AccountId) -> Vec<Transaction> {
        let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        accounts.get(&account_id).cloned().unwrap_or_default()
    }

    /// every batch passed to `upsert_transactions`, in call order
    pub fn upsert_calls(&self) -> Vec<Vec<TransactionUpsert>> {
        self.upsert_calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn fail_reads_for(&self, account_id: AccountId) {
        self.failing_reads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(account_id);
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    fn apply(&self, upsert: TransactionUpsert) -> Result<bool> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let entries = accounts.entry(upsert.account_id).or_default();

        let updated = match &upsert.id {
            Some(id) => {
                let existing = entries
                    .iter_mut()
                    .find(|tx| tx.id.as_deref() == Some(id.as_str()))
                    .ok_or_else(|| AccrualError::Ledger {
                        message: format!("transaction {id} not found"),
                    })?;
                overwrite(existing, &upsert);
                true
            }
            None => {
                let mut created = Transaction::new(upsert.account_id, upsert.date, upsert.amount)
                    .with_id(format!("mem-{}", Uuid::new_v4()));
                overwrite(&mut created, &upsert);
                entries.push(created);
                false
            }
        };

        entries.sort_by_key(|tx| tx.date);
        Ok(updated)
    }
}

fn overwrite(target: &mut Transaction, upsert: &TransactionUpsert) {
    target.date = upsert.date;
    target.amount = upsert.amount;
    target.payee_name = Some(upsert.payee_name.clone());
    target.memo = Some(upsert.memo.clone());
    target.cleared = upsert.cleared;
    target.approved = upsert.approved;
    target.flag_color = upsert.flag_color;
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn list_transactions(
        &self,
        _budget_id: &str,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>> {
        let failing = self.failing_reads.lock().unwrap_or_else(|e| e.into_inner());
        if failing.contains(&account_id) {
            return Err(AccrualError::Ledger {
                message: format!("read failed for account {account_id}"),
            });
        }
        drop(failing);

        Ok(self.transactions(account_id))
    }

    async fn upsert_transactions(
        &self,
        _budget_id: &str,
        transactions: Vec<TransactionUpsert>,
    ) -> Result<UpsertSummary> {
        self.upsert_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(transactions.clone());

        if *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(AccrualError::LedgerStatus {
                status: 503,
                body: "write rejected".to_string(),
            });
        }

        let mut summary = UpsertSummary::default();
        for upsert in transactions {
            if self.apply(upsert)? {
                summary.updated += 1;
            } else {
                summary.created += 1;
            }
        }
        Ok(summary)
    }
}
