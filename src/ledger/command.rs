//! Typed programmable-transaction commands.
//!
//! Each on-chain call the publisher makes has its own [`Command`] variant, so
//! a transaction is a plain `Vec<Command>` that can be inspected in tests and
//! counted against per-transaction limits before anything is signed.
//!
//! Commands refer to earlier results through [`Argument`]s handed out by
//! [`TransactionBuilder`].

use serde::{Deserialize, Serialize};

use super::types::{Address, ObjectId};
use crate::storage::{BlobId, ContentHash};

/// Reference to a transaction input or to the result of an earlier command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Argument {
    /// An existing on-chain object.
    Object(ObjectId),
    /// The (single) result of command `n`.
    Result(u16),
    /// Result `m` of the multi-result command `n`.
    NestedResult(u16, u16),
}

/// One call in a programmable transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<u64>,
    },
    TransferObjects {
        objects: Vec<Argument>,
        recipient: Address,
    },
    /// `system::reserve_space`, or `subsidies::reserve_space` when `subsidies` is set.
    ReserveSpace {
        package: ObjectId,
        system: Argument,
        subsidies: Option<Argument>,
        encoded_size: u64,
        epochs: u32,
        payment: Argument,
    },
    RegisterBlob {
        package: ObjectId,
        system: Argument,
        storage: Argument,
        blob_id: BlobId,
        root_hash: [u8; 32],
        size: u64,
        encoding_type: u8,
        deletable: bool,
        payment: Argument,
    },
    CertifyBlob {
        package: ObjectId,
        system: Argument,
        blob: Argument,
        signature: Vec<u8>,
        signers: Vec<u16>,
        message: Vec<u8>,
    },
    DeleteBlob {
        package: ObjectId,
        system: Argument,
        blob: Argument,
    },
    NewMetadata {
        package: ObjectId,
        link: Option<String>,
        image_url: Option<String>,
        description: Option<String>,
        project_url: Option<String>,
        creator: Option<String>,
    },
    NewSite {
        package: ObjectId,
        name: String,
        metadata: Argument,
    },
    RemoveResourceIfExists {
        package: ObjectId,
        site: Argument,
        path: String,
    },
    /// Inclusive byte range understood by the site contract.
    NewRangeOption {
        package: ObjectId,
        start: Option<u64>,
        end: Option<u64>,
    },
    NewResource {
        package: ObjectId,
        path: String,
        blob_id: BlobId,
        blob_hash: ContentHash,
        range: Argument,
    },
    AddHeader {
        package: ObjectId,
        resource: Argument,
        name: String,
        value: String,
    },
    AddResource {
        package: ObjectId,
        site: Argument,
        resource: Argument,
    },
    RemoveAllRoutesIfExist {
        package: ObjectId,
        site: Argument,
    },
    CreateRoutes {
        package: ObjectId,
        site: Argument,
    },
    InsertRoute {
        package: ObjectId,
        site: Argument,
        route: String,
        path: String,
    },
}

/// Discriminant of a [`Command`], used for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    MergeCoins,
    SplitCoins,
    TransferObjects,
    ReserveSpace,
    RegisterBlob,
    CertifyBlob,
    DeleteBlob,
    NewMetadata,
    NewSite,
    RemoveResourceIfExists,
    NewRangeOption,
    NewResource,
    AddHeader,
    AddResource,
    RemoveAllRoutesIfExist,
    CreateRoutes,
    InsertRoute,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::MergeCoins { .. } => CommandKind::MergeCoins,
            Command::SplitCoins { .. } => CommandKind::SplitCoins,
            Command::TransferObjects { .. } => CommandKind::TransferObjects,
            Command::ReserveSpace { .. } => CommandKind::ReserveSpace,
            Command::RegisterBlob { .. } => CommandKind::RegisterBlob,
            Command::CertifyBlob { .. } => CommandKind::CertifyBlob,
            Command::DeleteBlob { .. } => CommandKind::DeleteBlob,
            Command::NewMetadata { .. } => CommandKind::NewMetadata,
            Command::NewSite { .. } => CommandKind::NewSite,
            Command::RemoveResourceIfExists { .. } => CommandKind::RemoveResourceIfExists,
            Command::NewRangeOption { .. } => CommandKind::NewRangeOption,
            Command::NewResource { .. } => CommandKind::NewResource,
            Command::AddHeader { .. } => CommandKind::AddHeader,
            Command::AddResource { .. } => CommandKind::AddResource,
            Command::RemoveAllRoutesIfExist { .. } => CommandKind::RemoveAllRoutesIfExist,
            Command::CreateRoutes { .. } => CommandKind::CreateRoutes,
            Command::InsertRoute { .. } => CommandKind::InsertRoute,
        }
    }
}

/// A finished list of commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableTransaction {
    pub commands: Vec<Command>,
}

impl ProgrammableTransaction {
    /// Number of commands of the given kind.
    pub fn count(&self, kind: CommandKind) -> usize {
        self.commands.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn contains(&self, kind: CommandKind) -> bool {
        self.commands.iter().any(|c| c.kind() == kind)
    }
}

/// Transaction ready for dry-run and signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub sender: Address,
    pub gas_budget: u64,
    pub kind: ProgrammableTransaction,
}

/// Incrementally assembles a [`ProgrammableTransaction`].
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    commands: Vec<Command>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference an existing object as input.
    pub fn object(&self, id: ObjectId) -> Argument {
        Argument::Object(id)
    }

    /// Append a command and return a handle to its result.
    pub fn command(&mut self, command: Command) -> Argument {
        let index = self.commands.len() as u16;
        self.commands.push(command);
        Argument::Result(index)
    }

    /// Merge `sources` into `destination`.
    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) {
        self.command(Command::MergeCoins {
            destination,
            sources,
        });
    }

    /// Split `amounts` off `coin`, returning one handle per new coin.
    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<u64>) -> Vec<Argument> {
        let count = amounts.len() as u16;
        let index = self.commands.len() as u16;
        self.commands.push(Command::SplitCoins { coin, amounts });
        (0..count)
            .map(|i| Argument::NestedResult(index, i))
            .collect()
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, recipient: Address) {
        self.command(Command::TransferObjects { objects, recipient });
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn finish(self) -> ProgrammableTransaction {
        ProgrammableTransaction {
            commands: self.commands,
        }
    }
}
