//! Site publishing pipeline.
//!
//! Turns a directory into certified blobs on the storage network and a site
//! object on the ledger. See [`pipeline`] for the stage order.
//!
//! ## Stages
//!
//! - [`grouper`]: walk the tree and pack files into blob groups
//! - [`committee`]: fetch the storage committee and its shard map
//! - [`registrar`]: encode, price and register blobs
//! - [`writer`]: push slivers to the nodes until a shard quorum confirms
//! - [`certifier`]: submit the aggregated certificates
//! - [`site`]: create or update the site's resources and routes
//! - [`compensator`]: delete registered blobs when a later stage fails
//! - [`manifest`]: the `.well-known/site_manifest.json` document

pub mod blob;
pub mod certifier;
pub mod committee;
pub mod compensator;
pub mod error;
pub mod grouper;
pub mod manifest;
pub mod pipeline;
pub mod registrar;
pub mod site;
pub mod writer;

#[cfg(test)]
mod proptests;

pub use blob::{Blob, BlobSet, BlobState};
pub use error::{PublishError, PublishResult};
pub use grouper::{BlobGroup, FileRecord, GroupingError};
pub use manifest::SiteManifest;
pub use pipeline::{PublishContext, PublishOutcome, Publisher};
pub use site::{ByteRange, SiteResource};
pub use writer::{NodeState, NodeWriter, WriteError, WritePolicy};
