// Transaction model - payments, asset configuration, and escrow program calls

use crate::identity::{Address, Signature};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};
use std::fmt;

/// Flat fee charged per transaction, in microalgos
pub const MIN_TXN_FEE: u64 = 1_000;

/// Extra fee attached to transactions that trigger inner program transactions
pub const FEE_BUFFER: u64 = 1_000;

/// Balance every account must hold to exist
pub const BASE_RESERVE: u64 = 100_000;

/// Additional reserve required per asset capability an account holds
pub const ASSET_RESERVE: u64 = 100_000;

/// Identifier of a minted fungible asset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(u64);

impl AssetId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset-{}", self.0)
    }
}

/// Identifier of a deployed escrow application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppId(u64);

impl AppId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The program-controlled account address for this application
    pub fn address(&self) -> Address {
        Address::for_application(self.0)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app-{}", self.0)
    }
}

/// Unique identifier of a transaction (hash of its signing bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnId([u8; 32]);

impl TxnId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxnId({}..)", &hex::encode(self.0)[..8])
    }
}

/// Calls into the escrow program's contract-facing interface
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppCall {
    /// Deploy a new escrow instance bound to an asset
    Create { asset_id: AssetId, unitary_price: u64 },
    /// Owner-only price update
    SetPrice { new_price: u64 },
    /// Register the program account to hold the bound asset.
    /// Must be grouped with a payment covering the reserve increase.
    OptInToAsset,
    /// Purchase shares. Must be grouped with the buyer's payment.
    BuyShares { quantity: u64 },
    /// Owner-only terminal delete; residual balances close out to the owner
    Delete,
}

/// Body of a ledger transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBody {
    Payment {
        receiver: Address,
        amount: u64,
    },
    AssetCreate {
        total: u64,
        decimals: u32,
        asset_name: String,
        unit_name: String,
    },
    AssetOptIn {
        asset_id: AssetId,
    },
    AssetTransfer {
        asset_id: AssetId,
        receiver: Address,
        amount: u64,
    },
    ApplicationCall {
        /// None only when the call creates the application
        app_id: Option<AppId>,
        call: AppCall,
    },
}

/// An unsigned ledger transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    sender: Address,
    fee: u64,
    /// Random discriminator so otherwise-identical transactions get distinct ids
    nonce: u64,
    body: TransactionBody,
}

impl Transaction {
    fn new(sender: Address, body: TransactionBody) -> Self {
        Self {
            sender,
            fee: MIN_TXN_FEE,
            nonce: rand::thread_rng().gen::<u64>(),
            body,
        }
    }

    /// Build a payment transaction
    pub fn payment(sender: Address, receiver: Address, amount: u64) -> Self {
        Self::new(sender, TransactionBody::Payment { receiver, amount })
    }

    /// Build an asset-creation transaction
    pub fn asset_create(
        sender: Address,
        total: u64,
        decimals: u32,
        asset_name: &str,
        unit_name: &str,
    ) -> Self {
        Self::new(
            sender,
            TransactionBody::AssetCreate {
                total,
                decimals,
                asset_name: asset_name.to_string(),
                unit_name: unit_name.to_string(),
            },
        )
    }

    /// Build an asset opt-in (capability registration) transaction
    pub fn asset_opt_in(sender: Address, asset_id: AssetId) -> Self {
        Self::new(sender, TransactionBody::AssetOptIn { asset_id })
    }

    /// Build an asset-transfer transaction
    pub fn asset_transfer(sender: Address, asset_id: AssetId, receiver: Address, amount: u64) -> Self {
        Self::new(
            sender,
            TransactionBody::AssetTransfer {
                asset_id,
                receiver,
                amount,
            },
        )
    }

    /// Build the escrow application creation call
    pub fn app_create(sender: Address, asset_id: AssetId, unitary_price: u64) -> Self {
        Self::new(
            sender,
            TransactionBody::ApplicationCall {
                app_id: None,
                call: AppCall::Create {
                    asset_id,
                    unitary_price,
                },
            },
        )
    }

    /// Build a call against a deployed escrow application
    pub fn app_call(sender: Address, app_id: AppId, call: AppCall) -> Self {
        Self::new(
            sender,
            TransactionBody::ApplicationCall {
                app_id: Some(app_id),
                call,
            },
        )
    }

    /// Override the flat fee (e.g. to cover inner transactions)
    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    /// Canonical bytes the wallet signs
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = b"TX".to_vec();
        bytes.extend(postcard::to_allocvec(self).unwrap_or_default());
        bytes
    }

    /// Transaction id: hash of the signing bytes
    pub fn id(&self) -> TxnId {
        let mut hasher = Sha512_256::new();
        hasher.update(self.signing_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        TxnId::from_bytes(bytes)
    }
}

/// A signed, submittable transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    txn: Transaction,
    signature: Signature,
}

impl SignedTransaction {
    /// Assemble from an unsigned transaction and its signature
    pub fn from_parts(txn: Transaction, signature: Signature) -> Self {
        Self { txn, signature }
    }

    pub fn txn(&self) -> &Transaction {
        &self.txn
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn id(&self) -> TxnId {
        self.txn.id()
    }

    /// Encoded form for transport or display
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        let bytes = postcard::to_allocvec(self).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txn_id_is_stable() {
        let sender = Address::from_bytes([1u8; 32]);
        let receiver = Address::from_bytes([2u8; 32]);
        let txn = Transaction::payment(sender, receiver, 500);
        assert_eq!(txn.id(), txn.id());
    }

    #[test]
    fn test_identical_payments_get_distinct_ids() {
        let sender = Address::from_bytes([1u8; 32]);
        let receiver = Address::from_bytes([2u8; 32]);
        let a = Transaction::payment(sender, receiver, 500);
        let b = Transaction::payment(sender, receiver, 500);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_default_fee_and_override() {
        let sender = Address::from_bytes([1u8; 32]);
        let txn = Transaction::asset_opt_in(sender, AssetId::new(9));
        assert_eq!(txn.fee(), MIN_TXN_FEE);
        assert_eq!(txn.with_fee(2_500).fee(), 2_500);
    }

    #[test]
    fn test_app_address_matches_for_application() {
        let app = AppId::new(7);
        assert_eq!(app.address(), Address::for_application(7));
    }
}
