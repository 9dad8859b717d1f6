use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::LedgerSettings;
use crate::errors::{AccrualError, Result};
use crate::ledger::{Ledger, UpsertSummary};
use crate::types::{AccountId, Transaction, TransactionUpsert};

pub const YNAB_BASE_URL: &str = "https://api.ynab.com/v1";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct TransactionsData {
    transactions: Vec<Transaction>,
}

#[derive(Serialize)]
struct SaveTransactions<'a> {
    transactions: &'a [TransactionUpsert],
}

/// YNAB REST client
#[derive(Clone)]
pub struct YnabLedger {
    client: Client,
    token: String,
    base_url: String,
    read_retries: u32,
    retry_backoff: Duration,
}

impl YnabLedger {
    pub fn new(token: impl Into<String>, settings: &LedgerSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            token: token.into(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            read_retries: settings.read_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        })
    }

    fn transactions_url(&self, budget_id: &str) -> String {
        format!("{}/budgets/{}/transactions", self.base_url, budget_id)
    }

    fn account_transactions_url(&self, budget_id: &str, account_id: AccountId) -> String {
        format!(
            "{}/budgets/{}/accounts/{}/transactions",
            self.base_url, budget_id, account_id
        )
    }

    async fn get_once(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        check_status(response).await
    }

    /// reads are idempotent and retried with linear backoff
    async fn get_with_retry(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            match self.get_once(url).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.read_retries && is_transient(&err) => {
                    attempt += 1;
                    warn!(url, attempt, error = %err, "ledger read failed, retrying");
                    sleep(self.retry_backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// writes are sent exactly once; a retry could double-submit a payout
    ///
    /// YNAB takes creates (POST) and updates (PATCH) on separate calls, so a
    /// mixed batch is two requests and is not atomic across them.
    async fn save(
        &self,
        budget_id: &str,
        transactions: &[TransactionUpsert],
        update: bool,
    ) -> Result<()> {
        let url = self.transactions_url(budget_id);
        let request = if update {
            self.client.patch(&url)
        } else {
            self.client.post(&url)
        };

        let response = request
            .bearer_auth(&self.token)
            .json(&SaveTransactions { transactions })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for YnabLedger {
    async fn list_transactions(
        &self,
        budget_id: &str,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>> {
        let url = self.account_transactions_url(budget_id, account_id);
        let envelope: Envelope<TransactionsData> = self.get_with_retry(&url).await?.json().await?;

        let mut transactions: Vec<Transaction> = envelope
            .data
            .transactions
            .into_iter()
            .filter(|tx| !tx.deleted)
            .collect();
        transactions.sort_by_key(|tx| tx.date);

        debug!(account_id = %account_id, count = transactions.len(), "fetched transactions");
        Ok(transactions)
    }

    async fn upsert_transactions(
        &self,
        budget_id: &str,
        transactions: Vec<TransactionUpsert>,
    ) -> Result<UpsertSummary> {
        let (updates, creates): (Vec<_>, Vec<_>) =
            transactions.into_iter().partition(TransactionUpsert::is_update);

        // updates go first: rerunning after a failed create only re-applies them
        if !updates.is_empty() {
            self.save(budget_id, &updates, true).await?;
        }
        if !creates.is_empty() {
            self.save(budget_id, &creates, false)
                .await
                .map_err(|err| after_committed(updates.len(), err))?;
        }

        Ok(UpsertSummary {
            created: creates.len(),
            updated: updates.len(),
        })
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AccrualError::LedgerStatus {
        status: status.as_u16(),
        body,
    })
}

/// a create failure that follows committed updates
fn after_committed(updated: usize, err: AccrualError) -> AccrualError {
    if updated == 0 {
        return err;
    }
    warn!(updated, error = %err, "payout updates committed, creates failed");
    AccrualError::PartialWrite {
        updated,
        source: Box::new(err),
    }
}

fn is_transient(err: &AccrualError) -> bool {
    match err {
        AccrualError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
        AccrualError::LedgerStatus { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LedgerSettings {
        LedgerSettings {
            base_url: "https://ledger.test/v1/".to_string(),
            ..LedgerSettings::default()
        }
    }

    #[test]
    fn test_urls() {
        let ledger = YnabLedger::new("token", &settings()).unwrap();
        let account = AccountId::nil();

        assert_eq!(
            ledger.transactions_url("last-used"),
            "https://ledger.test/v1/budgets/last-used/transactions"
        );
        assert_eq!(
            ledger.account_transactions_url("b1", account),
            "https://ledger.test/v1/budgets/b1/accounts/00000000-0000-0000-0000-000000000000/transactions"
        );
    }

    #[test]
    fn test_transient_errors() {
        let status = |status| AccrualError::LedgerStatus {
            status,
            body: String::new(),
        };

        assert!(is_transient(&status(503)));
        assert!(is_transient(&status(429)));
        assert!(!is_transient(&status(401)));
        assert!(!is_transient(&AccrualError::configuration("x")));
    }

    #[test]
    fn test_create_failure_reports_committed_updates() {
        let rejected = || AccrualError::LedgerStatus {
            status: 400,
            body: "bad payee".to_string(),
        };

        let err = after_committed(2, rejected());
        assert!(err.is_ledger_failure());
        assert!(matches!(err, AccrualError::PartialWrite { updated: 2, .. }));
        assert_eq!(
            err.to_string(),
            "2 payout updates committed before the write failed: ledger responded with 400: bad payee"
        );

        // nothing committed, the original error passes through
        assert!(matches!(
            after_committed(0, rejected()),
            AccrualError::LedgerStatus { status: 400, .. }
        ));
    }

    #[test]
    fn test_envelope_parsing() {
        let json = r#"{
            "data": {
                "transactions": [{
                    "id": "t1",
                    "date": "2024-01-05",
                    "amount": 150000,
                    "memo": null,
                    "cleared": "cleared",
                    "approved": true,
                    "flag_color": null,
                    "account_id": "00000000-0000-0000-0000-000000000000",
                    "payee_name": "Salary",
                    "deleted": false,
                    "subtransactions": []
                }],
                "server_knowledge": 12
            }
        }"#;

        let envelope: Envelope<TransactionsData> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.data.transactions.len(), 1);
        assert_eq!(envelope.data.transactions[0].payee_name.as_deref(), Some("Salary"));
    }
}
