use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::decimal::Amount;
use crate::errors::Result;
use crate::interval::{Period, DEFAULT_LABEL_FORMAT};
use crate::types::{
    AccountId, ClearedState, FlagColor, Transaction, TransactionUpsert, INTEREST_PAYEE,
};

/// what to do with an account's payout transaction
#[derive(Debug, Clone, PartialEq)]
pub enum PayoutDecision {
    /// no payout exists yet for the period
    Create(TransactionUpsert),
    /// rewrite the uncleared payout in place
    Update(TransactionUpsert),
    /// payout already cleared or reconciled, leave it alone
    Finalized { transaction_id: String },
}

impl PayoutDecision {
    pub fn upsert(&self) -> Option<&TransactionUpsert> {
        match self {
            PayoutDecision::Create(upsert) | PayoutDecision::Update(upsert) => Some(upsert),
            PayoutDecision::Finalized { .. } => None,
        }
    }

    pub fn into_upsert(self) -> Option<TransactionUpsert> {
        match self {
            PayoutDecision::Create(upsert) | PayoutDecision::Update(upsert) => Some(upsert),
            PayoutDecision::Finalized { .. } => None,
        }
    }
}

/// maps an accrued total onto the account's single payout transaction
#[derive(Debug, Clone)]
pub struct PayoutReconciler {
    pub label_format: String,
    pub flag_color: Option<FlagColor>,
}

impl Default for PayoutReconciler {
    fn default() -> Self {
        Self {
            label_format: DEFAULT_LABEL_FORMAT.to_string(),
            flag_color: Some(FlagColor::Purple),
        }
    }
}

impl PayoutReconciler {
    pub fn new(label_format: impl Into<String>) -> Self {
        Self {
            label_format: label_format.into(),
            ..Self::default()
        }
    }

    /// interest payout dated inside the payout period, if any
    pub fn find_candidate<'a>(
        &self,
        transactions: &'a [Transaction],
        payout_period: &Period,
    ) -> Result<Option<&'a Transaction>> {
        let window_end = payout_period.next()?.start;
        let mut candidates = transactions.iter().filter(|tx| {
            tx.is_interest_payout() && payout_period.start <= tx.date && tx.date < window_end
        });

        let candidate = candidates.next();
        if let Some(extra) = candidates.next() {
            warn!(
                period = %payout_period,
                ignored = ?extra.id,
                "more than one interest payout in period, using the earliest"
            );
        }
        Ok(candidate)
    }

    pub fn reconcile(
        &self,
        transactions: &[Transaction],
        payout_period: &Period,
        accrued_interest: Decimal,
        account_id: AccountId,
        today: NaiveDate,
    ) -> Result<PayoutDecision> {
        let candidate = self.find_candidate(transactions, payout_period)?;
        let amount = Amount::round_from(accrued_interest)?;

        let existing_id = match candidate {
            Some(tx) if tx.cleared.is_finalized() => {
                let transaction_id = tx.id.clone().unwrap_or_default();
                warn!(
                    account_id = %account_id,
                    transaction_id = %transaction_id,
                    cleared = ?tx.cleared,
                    "payout transaction already finalized"
                );
                return Ok(PayoutDecision::Finalized { transaction_id });
            }
            Some(tx) => tx.id.clone(),
            None => None,
        };

        let upsert = TransactionUpsert {
            id: existing_id,
            account_id,
            date: payout_date(payout_period, today),
            amount,
            payee_name: INTEREST_PAYEE.to_string(),
            memo: format!("for {}", payout_period.label_with(&self.label_format)),
            cleared: ClearedState::Uncleared,
            approved: false,
            flag_color: self.flag_color,
        };

        if upsert.is_update() {
            info!(account_id = %account_id, amount = %amount, "updating payout transaction");
            Ok(PayoutDecision::Update(upsert))
        } else {
            info!(account_id = %account_id, amount = %amount, "creating payout transaction");
            Ok(PayoutDecision::Create(upsert))
        }
    }
}

/// today, or the last day of a payout period that already ended
///
/// A calculation period can run past the end of the payout period it belongs
/// to; the record must stay inside its own candidate window.
fn payout_date(payout_period: &Period, today: NaiveDate) -> NaiveDate {
    if today < payout_period.end {
        return today;
    }
    payout_period.end.pred_opt().unwrap_or(payout_period.start)
}

/// reconcile with the default label format
pub fn reconcile_payout(
    transactions: &[Transaction],
    payout_period: &Period,
    accrued_interest: Decimal,
    account_id: AccountId,
    today: NaiveDate,
) -> Result<PayoutDecision> {
    PayoutReconciler::default().reconcile(
        transactions,
        payout_period,
        accrued_interest,
        account_id,
        today,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::{compute_interval, Granularity, Unit};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn year_2023() -> Period {
        compute_interval(Granularity::new(1, Unit::Year).unwrap(), date(2023, 6, 1), true).unwrap()
    }

    fn in_2023(
        transactions: &[Transaction],
        accrued: Decimal,
        account: AccountId,
        today: NaiveDate,
    ) -> PayoutDecision {
        reconcile_payout(transactions, &year_2023(), accrued, account, today).unwrap()
    }

    fn interest(d: NaiveDate, id: &str, cleared: ClearedState) -> Transaction {
        Transaction::new(Uuid::nil(), d, Amount::from_minor(100))
            .with_id(id)
            .with_payee(INTEREST_PAYEE)
            .with_cleared(cleared)
    }

    #[test]
    fn test_creates_new_payout() {
        let account = Uuid::new_v4();
        let deposit =
            Transaction::new(account, date(2023, 1, 1), Amount::from_minor(100_000)).with_id("d1");

        let decision = in_2023(&[deposit], dec!(4999.5), account, date(2023, 12, 31));

        let PayoutDecision::Create(upsert) = decision else {
            panic!("expected a new payout");
        };
        assert_eq!(upsert.id, None);
        assert_eq!(upsert.account_id, account);
        assert_eq!(upsert.date, date(2023, 12, 31));
        assert_eq!(upsert.amount, Amount::from_minor(5000));
        assert_eq!(upsert.payee_name, "Interest");
        assert_eq!(upsert.memo, "for 01/01/2023-01/01/2024");
        assert_eq!(upsert.cleared, ClearedState::Uncleared);
        assert_eq!(upsert.flag_color, Some(FlagColor::Purple));
    }

    #[test]
    fn test_updates_uncleared_payout() {
        let transactions = vec![interest(date(2023, 7, 1), "p1", ClearedState::Uncleared)];

        let decision = in_2023(&transactions, dec!(12.2), Uuid::nil(), date(2023, 8, 1));

        let PayoutDecision::Update(upsert) = decision else {
            panic!("expected an update");
        };
        assert_eq!(upsert.id.as_deref(), Some("p1"));
        assert_eq!(upsert.amount, Amount::from_minor(12));
        assert_eq!(upsert.date, date(2023, 8, 1));
    }

    #[test]
    fn test_finalized_payout_is_left_alone() {
        for cleared in [ClearedState::Cleared, ClearedState::Reconciled] {
            let transactions = vec![interest(date(2023, 7, 1), "p1", cleared)];

            let decision = in_2023(&transactions, dec!(999), Uuid::nil(), date(2023, 8, 1));

            let expected = PayoutDecision::Finalized {
                transaction_id: "p1".to_string(),
            };
            assert_eq!(decision, expected);
            assert!(decision.upsert().is_none());
        }
    }

    #[test]
    fn test_ended_payout_period_is_dated_on_its_last_day() {
        let month = Granularity::new(1, Unit::Month).unwrap();
        let january = compute_interval(month, date(2024, 1, 15), true).unwrap();
        let account = Uuid::new_v4();

        // the week of 29 january runs into february but accrues to january
        let first =
            reconcile_payout(&[], &january, dec!(478.1), account, date(2024, 2, 2)).unwrap();
        let PayoutDecision::Create(created) = first else {
            panic!("expected a new payout");
        };
        assert_eq!(created.date, date(2024, 1, 31));

        let recorded = Transaction::new(account, created.date, created.amount)
            .with_id("p1")
            .with_payee(INTEREST_PAYEE)
            .with_cleared(ClearedState::Uncleared);
        let second = reconcile_payout(
            &[recorded],
            &january,
            dec!(478.1),
            account,
            date(2024, 2, 3),
        )
        .unwrap();
        let PayoutDecision::Update(updated) = second else {
            panic!("expected the january payout to be updated");
        };
        assert_eq!(updated.id.as_deref(), Some("p1"));
        assert_eq!(updated.date, date(2024, 1, 31));

        // inside the period the record is dated today
        let during = reconcile_payout(&[], &january, dec!(1), account, date(2024, 1, 20)).unwrap();
        assert_eq!(during.upsert().map(|u| u.date), Some(date(2024, 1, 20)));
    }

    #[test]
    fn test_candidate_window() {
        let transactions = vec![
            interest(date(2022, 12, 31), "old", ClearedState::Uncleared),
            interest(date(2024, 1, 1), "next", ClearedState::Uncleared),
        ];
        let reconciler = PayoutReconciler::default();
        assert!(reconciler.find_candidate(&transactions, &year_2023()).unwrap().is_none());

        // the first day of the period belongs to it
        let on_start = vec![interest(date(2023, 1, 1), "start", ClearedState::Uncleared)];
        let found = reconciler.find_candidate(&on_start, &year_2023()).unwrap();
        assert_eq!(found.and_then(|tx| tx.id.as_deref()), Some("start"));
    }

    #[test]
    fn test_non_interest_payee_is_not_a_candidate() {
        let salary = Transaction::new(Uuid::nil(), date(2023, 5, 1), Amount::from_minor(1))
            .with_id("x")
            .with_payee("Employer")
            .with_cleared(ClearedState::Uncleared);

        let decision = in_2023(&[salary], dec!(1), Uuid::nil(), date(2023, 8, 1));
        assert!(matches!(decision, PayoutDecision::Create(_)));
    }

    #[test]
    fn test_rounding_is_deterministic() {
        let accrued = dec!(1234.5000000001);
        let first = in_2023(&[], accrued, Uuid::nil(), date(2023, 8, 1));
        let second = in_2023(&[], accrued, Uuid::nil(), date(2023, 8, 1));

        assert_eq!(first, second);
        assert_eq!(first.into_upsert().map(|u| u.amount), Some(Amount::from_minor(1235)));
    }

    #[test]
    fn test_custom_label_format() {
        let reconciler = PayoutReconciler::new("%Y-%m-%d");
        let decision = reconciler
            .reconcile(&[], &year_2023(), dec!(1), Uuid::nil(), date(2023, 8, 1))
            .unwrap();
        assert_eq!(
            decision.upsert().map(|u| u.memo.as_str()),
            Some("for 2023-01-01-2024-01-01")
        );
    }
}
