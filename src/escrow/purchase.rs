// Purchase processor - validates and executes buy orders against an escrow

use crate::escrow::EscrowContract;
use crate::identity::{Address, Session, SignerError};
use crate::ledger::{
    AppCall, LedgerClient, LedgerError, Transaction, TxnId, FEE_BUFFER, MIN_TXN_FEE,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PurchaseError {
    #[error("Quantity cannot be zero")]
    ZeroQuantity,

    #[error("Total cost overflows: {quantity} x {unit_price}")]
    CostOverflow { quantity: u64, unit_price: u64 },

    #[error("Contract has been deleted")]
    ContractDeleted,

    #[error("Insufficient units: requested {requested}, remaining {remaining}")]
    InsufficientUnits { requested: u64, remaining: u64 },

    #[error("Buyer opt-in failed: {0}")]
    OptInFailed(#[source] LedgerError),

    #[error("Signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// One buy order, priced at request time. Ephemeral: lives only for the
/// duration of the operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseOrder {
    buyer: Address,
    quantity: u64,
    unit_price: u64,
    total_cost: u64,
}

impl PurchaseOrder {
    pub fn new(buyer: Address, quantity: u64, unit_price: u64) -> Result<Self, PurchaseError> {
        if quantity == 0 {
            return Err(PurchaseError::ZeroQuantity);
        }
        let total_cost = quantity
            .checked_mul(unit_price)
            .ok_or(PurchaseError::CostOverflow {
                quantity,
                unit_price,
            })?;
        Ok(Self {
            buyer,
            quantity,
            unit_price,
            total_cost,
        })
    }

    pub fn buyer(&self) -> Address {
        self.buyer
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }
}

/// Outcome of a confirmed purchase
#[derive(Clone, Debug)]
pub struct PurchaseReceipt {
    pub order: PurchaseOrder,
    /// Authoritative remaining stock, re-read from the ledger after confirmation
    pub units_remaining: u64,
    pub txn_ids: Vec<TxnId>,
    pub confirmed_round: u64,
    pub confirmed_at: DateTime<Utc>,
}

/// Executes buy orders: advisory stock pre-check, one-shot capability
/// remediation, then an atomic payment + buy-shares group.
pub struct PurchaseProcessor {
    ledger: Arc<dyn LedgerClient>,
}

impl PurchaseProcessor {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Current stock of the escrow's custodial account
    pub async fn units_remaining(&self, contract: &EscrowContract) -> Result<u64, LedgerError> {
        Ok(self
            .ledger
            .asset_balance(contract.app_address(), contract.asset_id())
            .await?
            .unwrap_or(0))
    }

    /// Buy `quantity` units. The pre-check is best-effort: a competing buyer
    /// can still win the race, in which case the program rejects the group
    /// and that rejection is surfaced as-is.
    pub async fn buy(
        &self,
        session: &Session,
        contract: &EscrowContract,
        quantity: u64,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        if !contract.is_active() {
            return Err(PurchaseError::ContractDeleted);
        }
        let order = PurchaseOrder::new(session.address(), quantity, contract.unitary_price())?;

        // Existence check first: a torn-down escrow fails here with a
        // "does not exist" condition rather than a stale stock read
        let state = self.ledger.app_state(contract.app_id()).await?;

        // Fast-fail only; the authoritative check happens on-ledger
        let remaining = self.units_remaining(contract).await?;
        if quantity > remaining {
            return Err(PurchaseError::InsufficientUnits {
                requested: quantity,
                remaining,
            });
        }

        // Remediate a missing capability once, then proceed
        let holding = self
            .ledger
            .asset_balance(session.address(), state.asset_id)
            .await?;
        if holding.is_none() {
            let opt_in = Transaction::asset_opt_in(session.address(), state.asset_id);
            let signed = session.sign(opt_in).await?;
            self.ledger
                .submit(vec![signed])
                .await
                .map_err(PurchaseError::OptInFailed)?;
            tracing::debug!(buyer = %session.address(), asset = %contract.asset_id(), "buyer opted in");
        }

        // Payment and buy-shares call confirm atomically so the program can
        // hold the payment against the requested quantity and current price
        let payment = Transaction::payment(session.address(), contract.app_address(), order.total_cost())
            .with_fee(MIN_TXN_FEE + FEE_BUFFER);
        let call = Transaction::app_call(
            session.address(),
            contract.app_id(),
            AppCall::BuyShares { quantity },
        );
        let group = vec![session.sign(payment).await?, session.sign(call).await?];
        let confirmation = self.ledger.submit(group).await?;

        // Read back the authoritative remaining stock
        let units_remaining = self
            .ledger
            .asset_balance(contract.app_address(), state.asset_id)
            .await?
            .unwrap_or(0);

        tracing::info!(
            app = %contract.app_id(),
            quantity,
            cost = order.total_cost(),
            units_remaining,
            "purchase confirmed"
        );
        Ok(PurchaseReceipt {
            order,
            units_remaining,
            txn_ids: confirmation.txn_ids,
            confirmed_round: confirmation.confirmed_round,
            confirmed_at: Utc::now(),
        })
    }
}
