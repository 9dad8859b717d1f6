use thiserror::Error;

use crate::types::AccountId;

#[derive(Error, Debug)]
pub enum AccrualError {
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("account {account_id} has no transactions")]
    NoTransactions {
        account_id: AccountId,
    },

    #[error("ledger responded with {status}: {body}")]
    LedgerStatus {
        status: u16,
        body: String,
    },

    #[error("ledger error: {message}")]
    Ledger {
        message: String,
    },

    #[error("{updated} payout updates committed before the write failed: {source}")]
    PartialWrite {
        updated: usize,
        source: Box<AccrualError>,
    },

    #[error("ledger transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AccrualError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AccrualError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// true for conditions that only affect a single account
    pub fn is_account_scoped(&self) -> bool {
        matches!(
            self,
            AccrualError::NoTransactions { .. }
                | AccrualError::CalculationError { .. }
                | AccrualError::InvalidDate { .. }
        )
    }

    /// true for failures talking to the ledger service
    pub fn is_ledger_failure(&self) -> bool {
        matches!(
            self,
            AccrualError::LedgerStatus { .. }
                | AccrualError::Ledger { .. }
                | AccrualError::PartialWrite { .. }
                | AccrualError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AccrualError>;
