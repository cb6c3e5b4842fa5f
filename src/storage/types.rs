//! Value types exchanged with the storage network.
//!
//! Everything here is plain data: identifiers, encoded payloads, confirmations
//! and prices. The erasure code itself lives behind [`super::StorageClient`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::encoding::EncodingType;
use crate::ledger::ObjectId;

/// Content-derived blob identifier (a little-endian u256 on chain).
///
/// Rendered as unpadded base64url, which is also its canonical string form
/// in manifests and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobId([u8; 32]);

impl BlobId {
    pub const LENGTH: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE_NO_PAD.encode(self.0))
    }
}

/// Error returned when a string is not a valid base64url blob id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid blob id: {0}")]
pub struct InvalidBlobId(pub String);

impl FromStr for BlobId {
    type Err = InvalidBlobId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = URL_SAFE_NO_PAD
            .decode(s.trim_end_matches('='))
            .map_err(|e| InvalidBlobId(format!("{}: {}", s, e)))?;
        // Short encodings are zero-extended (high bytes of a little-endian u256)
        if decoded.len() > Self::LENGTH {
            return Err(InvalidBlobId(format!(
                "{}: expected at most 32 bytes, got {}",
                s,
                decoded.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes[..decoded.len()].copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

/// SHA-256 digest of a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a byte slice.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Hashes of one primary/secondary sliver pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliverPairHashes {
    pub primary: [u8; 32],
    pub secondary: [u8; 32],
}

/// Metadata produced by encoding; uploaded to every node with its slivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub encoding_type: EncodingType,
    pub unencoded_length: u64,
    pub hashes: Vec<SliverPairHashes>,
}

/// One sliver of encoded data for a specific shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sliver {
    pub shard_index: u16,
    pub data: Vec<u8>,
}

/// All slivers destined for one storage node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliversForNode {
    pub primary: Vec<Sliver>,
    pub secondary: Vec<Sliver>,
}

/// Result of encoding one blob against the current committee.
///
/// `slivers_by_node` is committee-sized and indexed by node position.
#[derive(Debug, Clone)]
pub struct EncodedBlob {
    pub blob_id: BlobId,
    pub metadata: BlobMetadata,
    pub root_hash: [u8; 32],
    pub slivers_by_node: Vec<SliversForNode>,
}

/// A node's signed acknowledgement that it stored its slivers of a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfirmation {
    pub serialized_message: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Aggregated confirmations ready to be submitted in a certify call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobCertificate {
    /// Committee positions whose confirmations were aggregated.
    pub signers: Vec<u16>,
    pub serialized_message: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Price of storing one blob for the requested number of epochs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCost {
    pub storage_cost: u64,
    pub write_cost: u64,
    pub total_cost: u64,
}

/// Shard assignment of one committee member, as stored on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeAssignment {
    /// Staking pool object id of the node.
    pub node_id: ObjectId,
    pub shard_indices: Vec<u16>,
}

/// Snapshot of the storage system object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    pub epoch: u32,
    pub n_shards: u16,
    pub committee: Vec<CommitteeAssignment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_id_display_is_unpadded_base64url() {
        let id = BlobId::from_bytes([0xfb; 32]);
        let shown = id.to_string();

        assert_eq!(shown.len(), 43);
        assert!(!shown.contains('='));
        assert!(!shown.contains('+'));
        assert!(!shown.contains('/'));
    }

    #[test]
    fn test_blob_id_parse_display() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8 * 7;
        }
        let id = BlobId::from_bytes(bytes);
        let parsed: BlobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_blob_id_rejects_garbage() {
        assert!("not*base64".parse::<BlobId>().is_err());
    }

    #[test]
    fn test_content_hash_is_sha256() {
        let hash = ContentHash::digest(b"abc");
        assert_eq!(
            hash.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
