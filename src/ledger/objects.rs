//! On-chain object schema and the codec that decodes it.
//!
//! ## Schema
//!
//! ```text
//! Blob          { id, registered_epoch: u32, blob_id: u256, size: u64,
//!                 encoding_type: u8, certified_epoch: Option<u32>,
//!                 storage: Storage, deletable: bool }
//! Storage       { id, start_epoch: u32, end_epoch: u32, storage_size: u64 }
//! Field<ResourcePath, Resource>
//!               { id, name: { path }, value: Resource }
//! Resource      { path, headers: Map<String, String>, blob_id: u256,
//!                 blob_hash: u256, range: Option<Range> }
//! Range         { start: Option<u64>, end: Option<u64> }
//! StakingPool   { id, node_info: { name, node_id, network_address } }
//! ```
//!
//! The byte encoding is opaque to the pipeline; it only ever goes through
//! [`ObjectCodec`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::types::ObjectId;
use crate::storage::{BlobId, ContentHash};

/// Object decoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to decode {kind}: {reason}")]
    Decode { kind: &'static str, reason: String },

    #[error("Failed to encode {kind}: {reason}")]
    Encode { kind: &'static str, reason: String },
}

/// Storage reservation attached to a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageResource {
    pub id: ObjectId,
    pub start_epoch: u32,
    pub end_epoch: u32,
    pub storage_size: u64,
}

/// A registered blob object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobObject {
    pub id: ObjectId,
    pub registered_epoch: u32,
    pub blob_id: BlobId,
    pub size: u64,
    pub encoding_type: u8,
    pub certified_epoch: Option<u32>,
    pub storage: StorageResource,
    pub deletable: bool,
}

/// Inclusive byte range of a resource inside its blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeOption {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// A site resource as stored in the site's dynamic fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub blob_id: BlobId,
    pub blob_hash: ContentHash,
    pub range: Option<RangeOption>,
}

/// Dynamic-field key of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePath {
    pub path: String,
}

/// `Field<ResourcePath, Resource>` wrapper object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceField {
    pub id: ObjectId,
    pub name: ResourcePath,
    pub value: Resource,
}

/// Public information about a storage node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNodeInfo {
    pub name: String,
    pub node_id: ObjectId,
    pub network_address: String,
}

/// Staking pool of a committee member (only the parts the publisher reads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingPool {
    pub id: ObjectId,
    pub node_info: StorageNodeInfo,
}

/// Fully-qualified type of blob objects.
pub fn blob_type(blob_package: &ObjectId) -> String {
    format!("{}::blob::Blob", blob_package)
}

/// Fully-qualified type of site objects.
pub fn site_type(site_package: &ObjectId) -> String {
    format!("{}::site::Site", site_package)
}

/// Value type of a site's resource dynamic fields.
pub fn resource_type(site_package: &ObjectId) -> String {
    format!("{}::site::Resource", site_package)
}

/// Fully-qualified type of staking pool objects.
pub fn staking_pool_type(system_package: &ObjectId) -> String {
    format!("{}::staking_pool::StakingPool", system_package)
}

/// Coin object type for `coin_type`.
pub fn coin_type(coin_type: &str) -> String {
    format!("0x2::coin::Coin<{}>", coin_type)
}

/// Decoder for ledger object contents.
pub trait ObjectCodec: Send + Sync {
    fn decode_blob(&self, bytes: &[u8]) -> Result<BlobObject, CodecError>;

    fn decode_resource_field(&self, bytes: &[u8]) -> Result<ResourceField, CodecError>;

    fn decode_staking_pool(&self, bytes: &[u8]) -> Result<StakingPool, CodecError>;
}

/// CBOR object codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl CborCodec {
    /// Encode any schema value (used by ledgers that store CBOR objects).
    pub fn encode<T: Serialize>(kind: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes).map_err(|e| CodecError::Encode {
            kind,
            reason: e.to_string(),
        })?;
        Ok(bytes)
    }

    fn decode<T: DeserializeOwned>(kind: &'static str, bytes: &[u8]) -> Result<T, CodecError> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decode {
            kind,
            reason: e.to_string(),
        })
    }
}

impl ObjectCodec for CborCodec {
    fn decode_blob(&self, bytes: &[u8]) -> Result<BlobObject, CodecError> {
        Self::decode("Blob", bytes)
    }

    fn decode_resource_field(&self, bytes: &[u8]) -> Result<ResourceField, CodecError> {
        Self::decode("Field<ResourcePath, Resource>", bytes)
    }

    fn decode_staking_pool(&self, bytes: &[u8]) -> Result<StakingPool, CodecError> {
        Self::decode("StakingPool", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blob() -> BlobObject {
        BlobObject {
            id: ObjectId::from_bytes([1; 32]),
            registered_epoch: 4,
            blob_id: BlobId::from_bytes([2; 32]),
            size: 1024,
            encoding_type: 1,
            certified_epoch: None,
            storage: StorageResource {
                id: ObjectId::from_bytes([3; 32]),
                start_epoch: 4,
                end_epoch: 34,
                storage_size: 65_536,
            },
            deletable: true,
        }
    }

    #[test]
    fn test_cbor_codec_decodes_blob() {
        let blob = sample_blob();
        let bytes = CborCodec::encode("Blob", &blob).unwrap();
        assert_eq!(CborCodec.decode_blob(&bytes).unwrap(), blob);
    }

    #[test]
    fn test_cbor_codec_rejects_wrong_schema() {
        let bytes = CborCodec::encode("Blob", &sample_blob()).unwrap();
        let err = CborCodec.decode_staking_pool(&bytes).unwrap_err();
        assert!(err.to_string().contains("StakingPool"));
    }

    #[test]
    fn test_type_tags() {
        let package: ObjectId = "0xabc".parse().unwrap();
        assert!(blob_type(&package).ends_with("0abc::blob::Blob"));
        assert!(resource_type(&package).ends_with("::site::Resource"));
        assert_eq!(coin_type("0x1::wal::WAL"), "0x2::coin::Coin<0x1::wal::WAL>");
    }
}
