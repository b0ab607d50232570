// Ledger client seam - read/submit access to the network

use crate::identity::Address;
use crate::ledger::{AppId, AssetId, SignedTransaction, TxnId};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the ledger network.
///
/// Submission failures are transient (the caller may retry the whole step);
/// everything else is an authoritative rejection and is not retryable
/// without changing inputs.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Unauthorized sender: {0}")]
    Unauthorized(String),

    #[error("Insufficient units: requested {requested}, available {available}")]
    InsufficientUnits { requested: u64, available: u64 },

    #[error("Payment mismatch: expected {expected} microalgos, got {got}")]
    PaymentMismatch { expected: u64, got: u64 },

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: u64, required: u64 },

    #[error("Account {0} holds no capability for {1}")]
    MissingCapability(Address, AssetId),

    #[error("Account {0} does not exist")]
    AccountNotFound(Address),

    #[error("{0} does not exist")]
    AssetNotFound(AssetId),

    #[error("{0} does not exist")]
    ApplicationNotFound(AppId),

    #[error("Invalid signature on transaction {0}")]
    BadSignature(TxnId),

    #[error("Invalid transaction group: {0}")]
    InvalidGroup(String),
}

impl LedgerError {
    /// Whether the failure is a transient network condition worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::SubmissionFailed(_))
    }
}

/// Result of a confirmed submission
#[derive(Clone, Debug)]
pub struct Confirmation {
    /// Round in which the group confirmed
    pub confirmed_round: u64,
    /// Ids of the confirmed transactions, in group order
    pub txn_ids: Vec<TxnId>,
    /// Asset created by this group, if any
    pub created_asset: Option<AssetId>,
    /// Application created by this group, if any
    pub created_app: Option<AppId>,
}

/// Parameters of a minted asset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetParams {
    pub creator: Address,
    pub total: u64,
    pub decimals: u32,
    pub asset_name: String,
    pub unit_name: String,
}

/// Global state of a deployed escrow application
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppGlobalState {
    pub asset_id: AssetId,
    pub unitary_price: u64,
    pub owner: Address,
}

/// Read/submit access to the distributed ledger.
///
/// A signed group is atomic: it confirms as a unit or has no effect. A single
/// transaction is a group of one.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a signed group and wait for its confirmation
    async fn submit(&self, group: Vec<SignedTransaction>) -> Result<Confirmation, LedgerError>;

    /// Microalgo balance of an account
    async fn account_balance(&self, account: Address) -> Result<u64, LedgerError>;

    /// Asset holding of an account. `None` means the account has not opted in.
    async fn asset_balance(
        &self,
        account: Address,
        asset: AssetId,
    ) -> Result<Option<u64>, LedgerError>;

    /// Parameters of a minted asset
    async fn asset_params(&self, asset: AssetId) -> Result<AssetParams, LedgerError>;

    /// Global state of a deployed escrow application
    async fn app_state(&self, app: AppId) -> Result<AppGlobalState, LedgerError>;
}
