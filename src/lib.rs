//! Blobsite - static site publisher for decentralized blob storage
//!
//! Publishes a local directory as erasure-coded blobs on a sharded storage
//! network and records an index of them on a ledger, so the tree can be
//! served as a website.
//!
//! Key principles:
//! - Stages run in order and every transaction reaches finality first
//! - A blob is written until a shard quorum confirms it
//! - Per-transaction command limits are never exceeded
//! - Blobs registered by a failed run are deleted again
//!
//! See [`publish`] for the pipeline, [`storage`] and [`ledger`] for the two
//! external collaborators, and [`simnet`] for an in-process network.

pub mod config;
pub mod content_type;
pub mod ledger;
pub mod publish;
pub mod simnet;
pub mod storage;
