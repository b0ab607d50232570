// Teardown controller - owner-only escrow deletion and close-out

use crate::escrow::EscrowContract;
use crate::identity::{Session, SignerError};
use crate::ledger::{AppCall, LedgerClient, LedgerError, Transaction, TxnId, FEE_BUFFER, MIN_TXN_FEE};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TeardownError {
    #[error("Contract has already been deleted")]
    AlreadyDeleted,

    #[error("Signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// What the close-out returned to the owner
#[derive(Clone, Debug)]
pub struct TeardownReceipt {
    /// Microalgos held by the program account at deletion (sale proceeds
    /// plus the unspent reserve)
    pub proceeds: u64,
    /// Unsold units returned to the owner
    pub returned_units: u64,
    pub txn_id: TxnId,
    pub confirmed_round: u64,
}

/// Deletes a deployed escrow. Terminal: the program identifier becomes
/// invalid for every future operation. Residual units and the program
/// account's balance close out to the owner.
pub struct TeardownController {
    ledger: Arc<dyn LedgerClient>,
}

impl TeardownController {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    pub async fn teardown(
        &self,
        session: &Session,
        contract: &EscrowContract,
    ) -> Result<(EscrowContract, TeardownReceipt), TeardownError> {
        if !contract.is_active() {
            return Err(TeardownError::AlreadyDeleted);
        }

        // Snapshot what the close-out will return, for the receipt
        let proceeds = self.ledger.account_balance(contract.app_address()).await?;
        let returned_units = self
            .ledger
            .asset_balance(contract.app_address(), contract.asset_id())
            .await?
            .unwrap_or(0);

        let txn = Transaction::app_call(session.address(), contract.app_id(), AppCall::Delete)
            .with_fee(MIN_TXN_FEE + 2 * FEE_BUFFER);
        let signed = session.sign(txn).await?;
        let txn_id = signed.id();
        let confirmation = self.ledger.submit(vec![signed]).await?;

        tracing::info!(
            app = %contract.app_id(),
            proceeds,
            returned_units,
            "escrow deleted and closed out"
        );
        let receipt = TeardownReceipt {
            proceeds,
            returned_units,
            txn_id,
            confirmed_round: confirmation.confirmed_round,
        };
        Ok((contract.clone().into_deleted(), receipt))
    }
}
