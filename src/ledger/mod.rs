//! Ledger integration.
//!
//! The ledger records blob registrations, certifications and the site index.
//! The publisher assembles typed programmable transactions
//! ([`command::TransactionBuilder`]), runs them through
//! [`executor::TransactionExecutor`] and reads objects back through the
//! paginated helpers in [`query`]. The RPC endpoint, the object encoding and
//! the signer are external collaborators behind [`LedgerClient`],
//! [`ObjectCodec`] and [`Signer`].

pub mod command;
pub mod executor;
pub mod mock;
pub mod objects;
pub mod query;
pub mod signer;
pub mod traits;
pub mod types;

pub use command::{Argument, Command, CommandKind, ProgrammableTransaction, TransactionBuilder};
pub use executor::TransactionExecutor;
pub use mock::MockLedgerClient;
pub use objects::{BlobObject, CborCodec, CodecError, ObjectCodec, Resource, StakingPool};
pub use signer::{LocalSigner, Signature, Signer, SignerError};
pub use traits::{LedgerClient, LedgerError, LedgerResult};
pub use types::{Address, ExecutionStatus, ObjectId, TransactionDigest, TransactionEffects};
