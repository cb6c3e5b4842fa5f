//! Storage network integration.
//!
//! Blobs are erasure-encoded into slivers, one set per committee node, and
//! uploaded directly to the nodes. The network itself is an external
//! collaborator reached through [`StorageClient`]; this module owns the value
//! types, the committee model and the size/quorum arithmetic the pipeline
//! needs to reason about it.

pub mod committee;
pub mod encoding;
pub mod mock;
pub mod traits;
pub mod types;

pub use committee::{Committee, StorageNode};
pub use encoding::{encoded_blob_length, quorum_shards, source_symbols, EncodingType};
pub use mock::MockStorageClient;
pub use traits::{NodeWriteRequest, StorageClient, StorageError, StorageResult};
pub use types::{
    BlobCertificate, BlobId, BlobMetadata, CommitteeAssignment, ContentHash, EncodedBlob,
    SliversForNode, StorageConfirmation, StorageCost, SystemState,
};
