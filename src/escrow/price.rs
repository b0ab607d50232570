// Price controller - owner-only unit-price updates

use crate::escrow::EscrowContract;
use crate::identity::{Session, SignerError};
use crate::ledger::{AppCall, LedgerClient, LedgerError, Transaction};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("Unitary price must be positive")]
    NonPositivePrice,

    #[error("Contract has been deleted")]
    ContractDeleted,

    #[error("Signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Updates the stored unit price of a deployed escrow. Ownership is enforced
/// on-ledger; a non-owner call comes back as an authoritative rejection.
pub struct PriceController {
    ledger: Arc<dyn LedgerClient>,
}

impl PriceController {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Set the unit price and return the contract carrying the price the
    /// program actually accepted (read back, not assumed).
    pub async fn set_price(
        &self,
        session: &Session,
        contract: &EscrowContract,
        new_price: u64,
    ) -> Result<EscrowContract, PriceError> {
        if new_price == 0 {
            return Err(PriceError::NonPositivePrice);
        }
        if !contract.is_active() {
            return Err(PriceError::ContractDeleted);
        }

        let txn = Transaction::app_call(
            session.address(),
            contract.app_id(),
            AppCall::SetPrice { new_price },
        );
        let signed = session.sign(txn).await?;
        self.ledger.submit(vec![signed]).await?;

        let state = self.ledger.app_state(contract.app_id()).await?;
        tracing::info!(app = %contract.app_id(), price = state.unitary_price, "unit price updated");
        Ok(contract.clone().with_price(state.unitary_price))
    }
}
