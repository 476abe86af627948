use std::sync::Arc;

use derive_new::new;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, instrument, warn};

use crate::error::SubmissionError;
use crate::ledger::Ledger;

/// 0.0005 SOL.
pub const DEFAULT_MIN_BALANCE_LAMPORTS: u64 = 500_000;

/// Advisory funds check run before anything else is touched. The ledger still has the
/// final word on fees.
#[derive(Clone, new)]
pub struct BalanceGuard {
    ledger: Arc<dyn Ledger>,
    min_balance: u64,
}

impl BalanceGuard {
    #[instrument(skip(self), fields(min_balance = self.min_balance))]
    pub async fn check(&self, identity: &Pubkey) -> Result<u64, SubmissionError> {
        let available = self
            .ledger
            .balance(identity)
            .await
            .map_err(SubmissionError::LedgerUnavailable)?;

        if available < self.min_balance {
            warn!(available, "balance below submission minimum");
            return Err(SubmissionError::InsufficientFunds {
                required: self.min_balance,
                available,
            });
        }

        debug!(available, "balance check passed");
        Ok(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::ScriptedLedger;

    #[tokio::test]
    async fn balance_at_minimum_passes() {
        let ledger = Arc::new(ScriptedLedger::funded(DEFAULT_MIN_BALANCE_LAMPORTS));
        let guard = BalanceGuard::new(ledger, DEFAULT_MIN_BALANCE_LAMPORTS);

        assert_eq!(
            guard.check(&Pubkey::new_unique()).await.unwrap(),
            DEFAULT_MIN_BALANCE_LAMPORTS
        );
    }

    #[tokio::test]
    async fn balance_below_minimum_fails() {
        let ledger = Arc::new(ScriptedLedger::funded(DEFAULT_MIN_BALANCE_LAMPORTS - 1));
        let guard = BalanceGuard::new(ledger, DEFAULT_MIN_BALANCE_LAMPORTS);

        let err = guard.check(&Pubkey::new_unique()).await.unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::InsufficientFunds { required, available }
                if required == DEFAULT_MIN_BALANCE_LAMPORTS && available == DEFAULT_MIN_BALANCE_LAMPORTS - 1
        ));
    }

    #[tokio::test]
    async fn balance_read_failure_is_ledger_unavailable() {
        let ledger = Arc::new(ScriptedLedger::funded(0));
        ledger.fail_balance("rpc down");
        let guard = BalanceGuard::new(ledger, 1);

        let err = guard.check(&Pubkey::new_unique()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LedgerUnavailable);
    }
}
