//! In-memory blob set shared by the pipeline stages.
//!
//! A [`Blob`] moves strictly forward through [`BlobState`]; stages only ever
//! touch blobs in the state they consume. The set is keyed by blob id and
//! keeps first-seen order, so identical payloads collapse into one entry that
//! still remembers every group mapped onto it.

use std::collections::HashMap;

use super::grouper::BlobGroup;
use crate::ledger::ObjectId;
use crate::storage::{BlobId, EncodedBlob, EncodingType, StorageConfirmation, StorageCost};

/// Lifecycle of a blob within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlobState {
    Encoded,
    Registered,
    Written,
    Certified,
}

/// Registration record, computed once per blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub group_id: usize,
    pub blob_id: BlobId,
    pub root_hash: [u8; 32],
    /// Payload length, including the marker byte of packed groups.
    pub unencoded_size: u64,
    pub encoding_type: EncodingType,
    /// Network footprint the reservation pays for.
    pub encoded_size: u64,
    pub epochs: u32,
    pub cost: StorageCost,
}

/// One content blob and everything learned about it so far.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Groups whose payload encodes to this blob; the first one is canonical.
    pub groups: Vec<BlobGroup>,
    pub encoded: EncodedBlob,
    pub registration: Registration,
    pub object_id: Option<ObjectId>,
    /// One slot per committee node, set once that node confirmed.
    pub confirmations: Vec<Option<StorageConfirmation>>,
    pub state: BlobState,
}

impl Blob {
    pub fn new(group: BlobGroup, encoded: EncodedBlob, registration: Registration) -> Self {
        let slots = encoded.slivers_by_node.len();
        Self {
            groups: vec![group],
            encoded,
            registration,
            object_id: None,
            confirmations: vec![None; slots],
            state: BlobState::Encoded,
        }
    }

    pub fn blob_id(&self) -> BlobId {
        self.registration.blob_id
    }

    /// Record the on-chain object created by registration.
    pub fn mark_registered(&mut self, object_id: ObjectId) {
        self.advance(BlobState::Encoded, BlobState::Registered);
        self.object_id = Some(object_id);
    }

    pub fn mark_written(&mut self, confirmations: Vec<Option<StorageConfirmation>>) {
        self.advance(BlobState::Registered, BlobState::Written);
        self.confirmations = confirmations;
    }

    pub fn mark_certified(&mut self) {
        self.advance(BlobState::Written, BlobState::Certified);
    }

    fn advance(&mut self, from: BlobState, to: BlobState) {
        debug_assert_eq!(
            self.state,
            from,
            "blob {} cannot move to {:?}",
            self.blob_id(),
            to
        );
        self.state = to;
    }
}

/// Blobs of one run, keyed by blob id in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct BlobSet {
    blobs: Vec<Blob>,
    index: HashMap<BlobId, usize>,
}

impl BlobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a blob, or merge its groups into the entry with the same id.
    ///
    /// Returns `false` when the blob was already known.
    pub fn insert(&mut self, blob: Blob) -> bool {
        match self.index.get(&blob.blob_id()) {
            Some(position) => {
                self.blobs[*position].groups.extend(blob.groups);
                false
            }
            None => {
                self.index.insert(blob.blob_id(), self.blobs.len());
                self.blobs.push(blob);
                true
            }
        }
    }

    /// Attach another group to a known blob.
    pub fn add_group(&mut self, blob_id: &BlobId, group: BlobGroup) -> bool {
        match self.get_mut(blob_id) {
            Some(blob) => {
                blob.groups.push(group);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, blob_id: &BlobId) -> bool {
        self.index.contains_key(blob_id)
    }

    pub fn get(&self, blob_id: &BlobId) -> Option<&Blob> {
        self.index.get(blob_id).map(|position| &self.blobs[*position])
    }

    pub fn get_mut(&mut self, blob_id: &BlobId) -> Option<&mut Blob> {
        self.index
            .get(blob_id)
            .map(|position| &mut self.blobs[*position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Blob> {
        self.blobs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Blob> {
        self.blobs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Ids of blobs currently in `state`, in set order.
    pub fn ids_in_state(&self, state: BlobState) -> Vec<BlobId> {
        self.blobs
            .iter()
            .filter(|blob| blob.state == state)
            .map(Blob::blob_id)
            .collect()
    }

    /// On-chain objects registered so far.
    pub fn registered_object_ids(&self) -> Vec<ObjectId> {
        self.blobs.iter().filter_map(|blob| blob.object_id).collect()
    }

    /// Summed cost of every blob in the set.
    pub fn total_cost(&self) -> u64 {
        self.blobs
            .iter()
            .map(|blob| blob.registration.cost.total_cost)
            .sum()
    }

    /// Number of files across every group.
    pub fn file_count(&self) -> usize {
        self.blobs
            .iter()
            .flat_map(|blob| &blob.groups)
            .map(|group| group.files.len())
            .sum()
    }
}
