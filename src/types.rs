use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Amount;

/// ledger account identifier
pub type AccountId = Uuid;

/// payee that marks a transaction as an interest payout
pub const INTEREST_PAYEE: &str = "Interest";

/// ledger reconciliation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearedState {
    Cleared,
    Uncleared,
    Reconciled,
}

impl ClearedState {
    /// cleared and reconciled entries may no longer be rewritten
    pub fn is_finalized(&self) -> bool {
        matches!(self, ClearedState::Cleared | ClearedState::Reconciled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
}

/// transaction as read from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub id: Option<String>,
    pub date: NaiveDate,
    pub amount: Amount,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    pub cleared: ClearedState,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub flag_color: Option<FlagColor>,
    pub account_id: AccountId,
    #[serde(default)]
    pub deleted: bool,
}

impl Transaction {
    pub fn new(account_id: AccountId, date: NaiveDate, amount: Amount) -> Self {
        Self {
            id: None,
            date,
            amount,
            payee_name: None,
            memo: None,
            cleared: ClearedState::Cleared,
            approved: true,
            flag_color: None,
            account_id,
            deleted: false,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.payee_name = Some(payee.into());
        self
    }

    #[must_use]
    pub fn with_cleared(mut self, cleared: ClearedState) -> Self {
        self.cleared = cleared;
        self
    }

    pub fn is_interest_payout(&self) -> bool {
        self.payee_name.as_deref() == Some(INTEREST_PAYEE)
    }

    /// interest entry written by a previous run that nobody has confirmed yet
    pub fn is_speculative_interest(&self) -> bool {
        self.is_interest_payout() && self.cleared == ClearedState::Uncleared
    }
}

/// record submitted to the ledger; no id means create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpsert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub amount: Amount,
    pub payee_name: String,
    pub memo: String,
    pub cleared: ClearedState,
    pub approved: bool,
    pub flag_color: Option<FlagColor>,
}

impl TransactionUpsert {
    pub fn is_update(&self) -> bool {
        self.id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_speculative_interest() {
        let account = Uuid::nil();
        let deposit = Transaction::new(account, date(2024, 1, 1), Amount::from_minor(1000));
        assert!(!deposit.is_interest_payout());

        let payout = deposit
            .clone()
            .with_payee(INTEREST_PAYEE)
            .with_cleared(ClearedState::Uncleared);
        assert!(payout.is_speculative_interest());
        assert!(!payout.clone().with_cleared(ClearedState::Reconciled).is_speculative_interest());
    }

    #[test]
    fn test_finalized_states() {
        assert!(ClearedState::Cleared.is_finalized());
        assert!(ClearedState::Reconciled.is_finalized());
        assert!(!ClearedState::Uncleared.is_finalized());
    }

    #[test]
    fn test_ledger_json_shape() {
        let json = r#"{
            "id": "a1",
            "date": "2024-03-05",
            "amount": -12500,
            "payee_name": "Interest",
            "memo": null,
            "cleared": "reconciled",
            "approved": true,
            "flag_color": "purple",
            "account_id": "00000000-0000-0000-0000-000000000000",
            "deleted": false,
            "import_id": null
        }"#;

        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.id.as_deref(), Some("a1"));
        assert_eq!(tx.date, date(2024, 3, 5));
        assert_eq!(tx.amount, Amount::from_minor(-12500));
        assert_eq!(tx.cleared, ClearedState::Reconciled);
        assert_eq!(tx.flag_color, Some(FlagColor::Purple));
    }

    #[test]
    fn test_upsert_omits_missing_id() {
        let upsert = TransactionUpsert {
            id: None,
            account_id: Uuid::nil(),
            date: date(2024, 3, 5),
            amount: Amount::from_minor(42),
            payee_name: INTEREST_PAYEE.to_string(),
            memo: "for 2024".to_string(),
            cleared: ClearedState::Uncleared,
            approved: false,
            flag_color: Some(FlagColor::Purple),
        };

        let value = serde_json::to_value(&upsert).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["cleared"], "uncleared");
        assert_eq!(value["date"], "2024-03-05");
        assert!(!upsert.is_update());
    }
}
