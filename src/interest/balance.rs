use crate::decimal::Amount;
use crate::interval::Period;
use crate::types::Transaction;

/// balance contribution of the transactions dated inside `period`
///
/// Interest payouts that are still uncleared were written by an earlier run
/// and are left out, so new interest is never computed on top of them.
pub fn accumulate_balance(transactions: &[Transaction], period: &Period) -> Amount {
    transactions
        .iter()
        .filter(|tx| period.contains(tx.date))
        .filter(|tx| !tx.is_speculative_interest())
        .map(|tx| tx.amount)
        .sum()
}
