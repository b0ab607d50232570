// Asset factory - mints the fungible token representing fractional
// ownership of one patent

use crate::identity::{Session, SignerError};
use crate::ledger::{AssetId, LedgerClient, LedgerError, Transaction};
use std::sync::Arc;
use thiserror::Error;

/// Default subdivision of one whole unit of ownership
pub const DEFAULT_DECIMALS: u32 = 2;

#[derive(Error, Debug)]
pub enum MintError {
    #[error("Asset name cannot be empty")]
    EmptyName,

    #[error("Signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Confirmation did not report a created asset id")]
    MissingAssetId,
}

/// Mints fractional-ownership tokens. The supply is fixed at mint time:
/// one whole unit subdivided by the decimals factor.
pub struct AssetFactory {
    ledger: Arc<dyn LedgerClient>,
    decimals: u32,
}

impl AssetFactory {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            decimals: DEFAULT_DECIMALS,
        }
    }

    /// Override the subdivision factor
    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    /// Total supply in base units
    pub fn scaled_supply(&self) -> u64 {
        10u64.pow(self.decimals)
    }

    /// Mint a new fractional token. One irreversible ledger write; a failed
    /// submission surfaces to the caller, nothing is retried.
    pub async fn mint(&self, session: &Session, name: &str) -> Result<AssetId, MintError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MintError::EmptyName);
        }
        let unit_name = unit_symbol(name);

        let txn = Transaction::asset_create(
            session.address(),
            self.scaled_supply(),
            self.decimals,
            name,
            &unit_name,
        );
        let signed = session.sign(txn).await?;
        let confirmation = self.ledger.submit(vec![signed]).await?;
        let asset_id = confirmation.created_asset.ok_or(MintError::MissingAssetId)?;

        tracing::info!(%asset_id, name, supply = self.scaled_supply(), "minted fractional token");
        Ok(asset_id)
    }
}

/// Short unit symbol derived from the display name
fn unit_symbol(name: &str) -> String {
    name.chars().take(3).collect::<String>().to_uppercase()
}
