// Wallet session - the explicit {address, signer} value passed into every
// orchestration call instead of a globally selected provider

use crate::identity::{Address, Keypair, KeypairSigner, SignerError, TransactionSigner};
use crate::ledger::{SignedTransaction, Transaction};
use std::sync::Arc;

/// A connected wallet: an account address plus its signing capability
#[derive(Clone)]
pub struct Session {
    address: Address,
    signer: Arc<dyn TransactionSigner>,
}

impl Session {
    /// Create a session from a signer
    pub fn new(signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            address: signer.address(),
            signer,
        }
    }

    /// Convenience constructor for a locally-held keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self::new(Arc::new(KeypairSigner::new(keypair)))
    }

    /// The account this session acts as
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a transaction with the session's wallet
    pub async fn sign(&self, txn: Transaction) -> Result<SignedTransaction, SignerError> {
        self.signer.sign(&txn).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .finish()
    }
}
