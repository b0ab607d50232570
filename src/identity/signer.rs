// Transaction signing seam - wallets are opaque callables that turn an
// unsigned transaction into a submittable one

use crate::identity::{Address, Keypair};
use crate::ledger::{SignedTransaction, Transaction};
use async_trait::async_trait;
use ed25519_dalek::{Signature as DalekSignature, Signer as DalekSigner, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Signer does not control account {0}")]
    WrongAccount(Address),

    #[error("Signing request rejected: {0}")]
    Rejected(String),

    #[error("Invalid signature length: expected 64, got {0}")]
    InvalidLength(usize),
}

/// Ed25519 signature over a transaction's signing bytes (64 bytes)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; 64],
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.bytes)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct SignatureVisitor;

        impl<'de> Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("64 bytes for an Ed25519 signature")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Signature::from_bytes(v).map_err(|e| E::custom(e.to_string()))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut bytes = Vec::with_capacity(64);
                while let Some(byte) = seq.next_element()? {
                    bytes.push(byte);
                }
                Signature::from_bytes(&bytes).map_err(|e| de::Error::custom(e.to_string()))
            }
        }

        deserializer.deserialize_bytes(SignatureVisitor)
    }
}

impl Signature {
    /// Get the raw bytes of the signature
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// Create a signature from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| SignerError::InvalidLength(bytes.len()))?;
        Ok(Self { bytes })
    }

    /// Verify this signature against a signer address and message
    pub fn verify(&self, signer: &Address, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&self.bytes);
        key.verify(message, &sig).is_ok()
    }
}

/// Opaque signing capability bound to one account address.
///
/// Browser wallets prompt the user, hardware wallets talk to a device - the
/// orchestration layer only sees this trait.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// The account this signer controls
    fn address(&self) -> Address;

    /// Sign a transaction, producing a submittable one
    async fn sign(&self, txn: &Transaction) -> Result<SignedTransaction, SignerError>;
}

/// Signer backed by a locally-held keypair
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    /// Create a signer from a keypair
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

#[async_trait]
impl TransactionSigner for KeypairSigner {
    fn address(&self) -> Address {
        self.keypair.address()
    }

    async fn sign(&self, txn: &Transaction) -> Result<SignedTransaction, SignerError> {
        if txn.sender() != self.keypair.address() {
            return Err(SignerError::WrongAccount(txn.sender()));
        }
        let sig = self.keypair.signing_key().sign(&txn.signing_bytes());
        let signature = Signature {
            bytes: sig.to_bytes(),
        };
        Ok(SignedTransaction::from_parts(txn.clone(), signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keypair_signer_produces_valid_signature() {
        let kp = Keypair::generate();
        let signer = KeypairSigner::new(kp.clone());
        let txn = Transaction::payment(kp.address(), Keypair::generate().address(), 1_000);
        let signed = signer.sign(&txn).await.unwrap();
        assert!(signed
            .signature()
            .verify(&kp.address(), &txn.signing_bytes()));
    }

    #[tokio::test]
    async fn test_signer_refuses_foreign_sender() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let signer = KeypairSigner::new(kp);
        let txn = Transaction::payment(other.address(), Keypair::generate().address(), 1_000);
        assert!(matches!(
            signer.sign(&txn).await,
            Err(SignerError::WrongAccount(_))
        ));
    }
}
