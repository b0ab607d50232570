// Marketplace orchestration - composes the escrow components into the four
// end-user actions and classifies failures for the caller

use crate::escrow::{
    AssetFactory, DeployCheckpoint, DeployError, DeploySpec, EscrowContract, EscrowDeployer,
    MintError, PriceController, PriceError, PurchaseError, PurchaseProcessor, PurchaseReceipt,
    TeardownController, TeardownError, TeardownReceipt,
};
use crate::identity::Session;
use crate::ledger::{AssetId, LedgerClient, LedgerError};
use std::sync::Arc;
use thiserror::Error;

/// How a failure should be handled by the caller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Network/submission failure; retrying the same step is safe
    Transient,
    /// Authoritative on-ledger or client-side rejection; retrying without
    /// changing inputs cannot succeed
    Rejected,
    /// The buyer's asset capability could not be established
    CapabilityMissing,
    /// A multi-step deployment stopped partway; resume or abandon it
    Interrupted,
}

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Mint failed: {0}")]
    Mint(#[from] MintError),

    #[error("Deployment failed: {0}")]
    Deploy(#[from] DeployError),

    #[error("Price update failed: {0}")]
    Price(#[from] PriceError),

    #[error("Purchase failed: {0}")]
    Purchase(#[from] PurchaseError),

    #[error("Teardown failed: {0}")]
    Teardown(#[from] TeardownError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl MarketError {
    /// Collapse the error into the caller-facing taxonomy
    pub fn class(&self) -> FailureClass {
        match self {
            MarketError::Mint(MintError::Ledger(e)) if e.is_transient() => FailureClass::Transient,
            MarketError::Mint(_) => FailureClass::Rejected,

            MarketError::Deploy(DeployError::Interrupted { .. }) => FailureClass::Interrupted,
            MarketError::Deploy(DeployError::CreateFailed(f)) if f.is_transient() => {
                FailureClass::Transient
            }
            MarketError::Deploy(_) => FailureClass::Rejected,

            MarketError::Price(PriceError::Ledger(e)) if e.is_transient() => {
                FailureClass::Transient
            }
            MarketError::Price(_) => FailureClass::Rejected,

            MarketError::Purchase(PurchaseError::OptInFailed(_)) => FailureClass::CapabilityMissing,
            MarketError::Purchase(PurchaseError::Ledger(e)) if e.is_transient() => {
                FailureClass::Transient
            }
            MarketError::Purchase(_) => FailureClass::Rejected,

            MarketError::Teardown(TeardownError::Ledger(e)) if e.is_transient() => {
                FailureClass::Transient
            }
            MarketError::Teardown(_) => FailureClass::Rejected,

            MarketError::Ledger(e) if e.is_transient() => FailureClass::Transient,
            MarketError::Ledger(_) => FailureClass::Rejected,
        }
    }

    /// The resume point, when a deployment was interrupted partway
    pub fn checkpoint(&self) -> Option<&DeployCheckpoint> {
        match self {
            MarketError::Deploy(e) => e.checkpoint(),
            _ => None,
        }
    }

    /// Human-readable notification distinguishing "try again" from
    /// "request invalid"
    pub fn user_message(&self) -> String {
        match self.class() {
            FailureClass::Transient => {
                format!("A network error interrupted the request; please try again. ({self})")
            }
            FailureClass::Rejected => {
                format!("The request was rejected and will not succeed as submitted. ({self})")
            }
            FailureClass::CapabilityMissing => {
                format!("Your account could not be registered to hold this token. ({self})")
            }
            FailureClass::Interrupted => {
                format!("Listing deployment was interrupted partway; it can be resumed. ({self})")
            }
        }
    }
}

/// Request to create a new listing
#[derive(Clone, Debug)]
pub struct CreateListing {
    /// Display name of the patent; also names the minted token
    pub name: String,
    /// Price per smallest tradable unit, in microalgos
    pub unitary_price: u64,
    /// Reuse an already-minted token instead of minting a new one
    pub existing_asset: Option<AssetId>,
    /// Units moved into escrow custody; defaults to the owner's full holding
    pub initial_units: Option<u64>,
}

impl CreateListing {
    pub fn new(name: &str, unitary_price: u64) -> Self {
        Self {
            name: name.to_string(),
            unitary_price,
            existing_asset: None,
            initial_units: None,
        }
    }

    pub fn with_existing_asset(mut self, asset_id: AssetId) -> Self {
        self.existing_asset = Some(asset_id);
        self
    }

    pub fn with_initial_units(mut self, units: u64) -> Self {
        self.initial_units = Some(units);
        self
    }
}

/// The four end-user actions over one ledger client.
///
/// Every method takes an explicit wallet `Session` and returns the updated
/// state to its caller; nothing here persists listing metadata - the caller
/// decides where the returned identifiers go.
pub struct Marketplace {
    ledger: Arc<dyn LedgerClient>,
    factory: AssetFactory,
    deployer: EscrowDeployer,
    prices: PriceController,
    purchases: PurchaseProcessor,
    teardown: TeardownController,
}

impl Marketplace {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            factory: AssetFactory::new(ledger.clone()),
            deployer: EscrowDeployer::new(ledger.clone()),
            prices: PriceController::new(ledger.clone()),
            purchases: PurchaseProcessor::new(ledger.clone()),
            teardown: TeardownController::new(ledger.clone()),
            ledger,
        }
    }

    /// Override the minted token's subdivision factor
    pub fn with_token_decimals(mut self, decimals: u32) -> Self {
        self.factory = self.factory.with_decimals(decimals);
        self
    }

    /// Create a listing: mint the fractional token (unless one is supplied),
    /// then deploy, fund, opt in, and hand custody to a fresh escrow.
    pub async fn create_listing(
        &self,
        session: &Session,
        request: &CreateListing,
    ) -> Result<EscrowContract, MarketError> {
        let asset_id = match request.existing_asset {
            Some(asset_id) => asset_id,
            None => self.factory.mint(session, &request.name).await?,
        };

        let initial_units = match request.initial_units {
            Some(units) => units,
            None => self
                .ledger
                .asset_balance(session.address(), asset_id)
                .await?
                .unwrap_or(0),
        };

        let spec = DeploySpec {
            asset_id,
            unitary_price: request.unitary_price,
            initial_units,
        };
        let contract = self.deployer.deploy(session, &spec).await?;
        Ok(contract)
    }

    /// Resume a listing whose deployment was interrupted partway
    pub async fn resume_listing(
        &self,
        session: &Session,
        spec: &DeploySpec,
        checkpoint: DeployCheckpoint,
    ) -> Result<EscrowContract, MarketError> {
        Ok(self.deployer.resume(session, spec, checkpoint).await?)
    }

    /// Update the unit price (owner-only, enforced on-ledger)
    pub async fn set_price(
        &self,
        session: &Session,
        contract: &EscrowContract,
        new_price: u64,
    ) -> Result<EscrowContract, MarketError> {
        Ok(self.prices.set_price(session, contract, new_price).await?)
    }

    /// Buy shares; returns the contract updated with the authoritative
    /// remaining stock, plus the purchase receipt
    pub async fn buy_shares(
        &self,
        session: &Session,
        contract: &EscrowContract,
        quantity: u64,
    ) -> Result<(EscrowContract, PurchaseReceipt), MarketError> {
        let receipt = self.purchases.buy(session, contract, quantity).await?;
        let updated = contract.clone().with_units_remaining(receipt.units_remaining);
        Ok((updated, receipt))
    }

    /// Delete the escrow and close residual balances out to the owner
    pub async fn close_listing(
        &self,
        session: &Session,
        contract: &EscrowContract,
    ) -> Result<(EscrowContract, TeardownReceipt), MarketError> {
        Ok(self.teardown.teardown(session, contract).await?)
    }

    /// Re-read a contract's price and remaining stock from the ledger
    pub async fn refresh(&self, contract: &EscrowContract) -> Result<EscrowContract, MarketError> {
        let state = self.ledger.app_state(contract.app_id()).await?;
        let units_remaining = self.purchases.units_remaining(contract).await?;
        Ok(contract
            .clone()
            .with_price(state.unitary_price)
            .with_units_remaining(units_remaining))
    }
}
