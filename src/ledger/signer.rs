//! Transaction signing.
//!
//! The pipeline only needs an address and a way to sign transaction bytes, so
//! a remote signing relay can stand in for [`LocalSigner`] by implementing
//! [`Signer`].

use async_trait::async_trait;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

use super::types::Address;

/// Signature scheme flag for Ed25519.
pub const ED25519_FLAG: u8 = 0x00;

/// Intent prefix for transaction data (scope, version, app id).
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Signing errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// A scheme-tagged signature together with the signing public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub scheme: u8,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
}

/// Produces signatures on behalf of one address.
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<Signature, SignerError>;
}

/// Ed25519 key held in memory.
pub struct LocalSigner {
    key_pair: Ed25519KeyPair,
    address: Address,
}

impl LocalSigner {
    /// Build a signer from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, SignerError> {
        let key_pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let address = derive_address(key_pair.public_key().as_ref());
        Ok(Self { key_pair, address })
    }

    /// Build a signer from a hex-encoded seed (optionally `0x`-prefixed).
    pub fn from_hex(encoded: &str) -> Result<Self, SignerError> {
        let trimmed = encoded.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let seed = Zeroizing::new(
            hex::decode(digits).map_err(|e| SignerError::InvalidKey(e.to_string()))?,
        );
        if seed.len() != 32 {
            return Err(SignerError::InvalidKey(format!(
                "expected 32-byte seed, got {} bytes",
                seed.len()
            )));
        }
        Self::from_seed(&seed)
    }

    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }
}

/// Address of an Ed25519 public key: `SHA-256(flag || public_key)`.
pub fn derive_address(public_key: &[u8]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public_key);
    Address::from_bytes(hasher.finalize().into())
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<Signature, SignerError> {
        let mut message = Vec::with_capacity(TRANSACTION_INTENT.len() + tx_bytes.len());
        message.extend_from_slice(&TRANSACTION_INTENT);
        message.extend_from_slice(tx_bytes);

        Ok(Signature {
            scheme: ED25519_FLAG,
            signature: self.key_pair.sign(&message).as_ref().to_vec(),
            public_key: self.public_key().to_vec(),
        })
    }
}
