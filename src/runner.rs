//! one scheduled run over every configured account
//!
//! Reads fan out per account, accrual and reconciliation are pure, and all
//! produced records go to the ledger in a single batch. One account's
//! calculation failure is reported without stopping the others.

use chrono::NaiveDate;
use futures::future::join_all;
use hourglass_rs::SafeTimeProvider;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{AccountSettings, RunSettings};
use crate::decimal::Amount;
use crate::errors::{AccrualError, Result};
use crate::ledger::{Ledger, UpsertSummary};
use crate::payout::{PayoutDecision, PayoutReconciler};
use crate::types::{AccountId, Transaction, TransactionUpsert};

/// what happened to one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccountOutcome {
    Created { amount: Amount, memo: String },
    Updated { transaction_id: String, amount: Amount, memo: String },
    SkippedNoTransactions,
    SkippedFinalized { transaction_id: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    pub account_id: AccountId,
    #[serde(flatten)]
    pub outcome: AccountOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub today: NaiveDate,
    pub accounts: Vec<AccountReport>,
    pub submitted: Vec<TransactionUpsert>,
    /// `None` when nothing was written (dry run or no records)
    pub written: Option<UpsertSummary>,
}

/// drives a run against a ledger
pub struct InterestRun<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    settings: &'a RunSettings,
    dry_run: bool,
}

impl<'a, L: Ledger + ?Sized> InterestRun<'a, L> {
    pub fn new(ledger: &'a L, settings: &'a RunSettings) -> Self {
        Self {
            ledger,
            settings,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn execute(&self, time: &SafeTimeProvider) -> Result<RunReport> {
        let today = time.now().date_naive();
        self.execute_on(today).await
    }

    pub async fn execute_on(&self, today: NaiveDate) -> Result<RunReport> {
        let budget_id = self.settings.budget_id.as_str();
        info!(budget_id, %today, accounts = self.settings.accounts.len(), "starting interest run");

        // any failed read aborts before anything is written
        let reads = join_all(
            self.settings
                .accounts
                .iter()
                .map(|account| self.ledger.list_transactions(budget_id, account.account_id)),
        )
        .await;

        let reconciler = self.settings.reconciler();
        let mut reports = Vec::with_capacity(reads.len());
        let mut submitted = Vec::new();

        for (account, read) in self.settings.accounts.iter().zip(reads) {
            let transactions = read.map_err(|err| {
                error!(
                    account_id = %account.account_id,
                    error = %err,
                    "failed to read transactions"
                );
                err
            })?;

            match process_account(account, &transactions, &reconciler, today) {
                Ok(decision) => {
                    let outcome = outcome_for(&decision);
                    if let Some(upsert) = decision.into_upsert() {
                        submitted.push(upsert);
                    }
                    reports.push(AccountReport {
                        account_id: account.account_id,
                        outcome,
                    });
                }
                Err(AccrualError::NoTransactions { account_id }) => {
                    warn!(account_id = %account_id, "account has no transactions, skipping");
                    reports.push(AccountReport {
                        account_id,
                        outcome: AccountOutcome::SkippedNoTransactions,
                    });
                }
                Err(err) if err.is_account_scoped() => {
                    error!(
                        account_id = %account.account_id,
                        error = %err,
                        "account failed, continuing with the rest"
                    );
                    reports.push(AccountReport {
                        account_id: account.account_id,
                        outcome: AccountOutcome::Failed {
                            error: err.to_string(),
                        },
                    });
                }
                Err(err) => return Err(err),
            }
        }

        let written = if submitted.is_empty() {
            info!("no payout transactions to write");
            None
        } else if self.dry_run {
            info!(count = submitted.len(), "dry run, not writing payout transactions");
            None
        } else {
            let summary = self
                .ledger
                .upsert_transactions(budget_id, submitted.clone())
                .await
                .map_err(|err| {
                    error!(
                        error = %err,
                        count = submitted.len(),
                        "failed to write payout transactions"
                    );
                    err
                })?;
            info!(
                created = summary.created,
                updated = summary.updated,
                "wrote payout transactions"
            );
            Some(summary)
        };

        Ok(RunReport {
            today,
            accounts: reports,
            submitted,
            written,
        })
    }
}

/// accrue and reconcile one account; pure apart from logging
pub fn process_account(
    account: &AccountSettings,
    transactions: &[Transaction],
    reconciler: &PayoutReconciler,
    today: NaiveDate,
) -> Result<PayoutDecision> {
    let outcome = account.engine().accrue(transactions, today)?;
    info!(
        account_id = %account.account_id,
        payout = %outcome.payout_period,
        accrued = %outcome.accrued_interest.round_dp(4),
        balance = %outcome.running_balance,
        "accrued interest"
    );

    reconciler.reconcile(
        transactions,
        &outcome.payout_period,
        outcome.accrued_interest,
        account.account_id,
        today,
    )
}

fn outcome_for(decision: &PayoutDecision) -> AccountOutcome {
    match decision {
        PayoutDecision::Create(upsert) => AccountOutcome::Created {
            amount: upsert.amount,
            memo: upsert.memo.clone(),
        },
        PayoutDecision::Update(upsert) => AccountOutcome::Updated {
            transaction_id: upsert.id.clone().unwrap_or_default(),
            amount: upsert.amount,
            memo: upsert.memo.clone(),
        },
        PayoutDecision::Finalized { transaction_id } => AccountOutcome::SkippedFinalized {
            transaction_id: transaction_id.clone(),
        },
    }
}
