//! Mock ledger for testing.
//!
//! An in-memory interpreter for the commands in [`super::command`]. Each
//! transaction runs against a copy of the object store and is committed only
//! when every command succeeds, so a failed transaction leaves no trace
//! beyond its effects.
//!
//! Failures can be injected per [`CommandKind`]: any transaction containing
//! a failing kind passes its dry run but reports a failure status when
//! executed.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::command::{Argument, Command, CommandKind, TransactionData};
use super::objects::{
    blob_type, coin_type, resource_type, site_type, staking_pool_type, BlobObject, CborCodec,
    RangeOption, Resource, ResourceField, ResourcePath, StakingPool, StorageResource,
};
use super::signer::{derive_address, Signature};
use super::traits::{LedgerClient, LedgerError, LedgerResult};
use super::types::{
    Address, DryRunResult, DynamicFieldInfo, ExecutionStatus, LedgerObject, ObjectId, ObjectRef,
    Page, TransactionDigest, TransactionEffects,
};

/// Page size of the mock's dynamic-field index.
const DYNAMIC_FIELD_PAGE: usize = 50;

/// Mock ledger client for testing.
#[derive(Clone)]
pub struct MockLedgerClient {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    store: ObjectStore,
    coin_type: String,
    failing: HashSet<CommandKind>,
    transactions: Vec<TransactionData>,
    effects: HashMap<TransactionDigest, TransactionEffects>,
    multi_get_calls: usize,
}

#[derive(Debug, Clone, Serialize)]
struct CoinContents {
    id: ObjectId,
    balance: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
struct SiteMetadata {
    link: Option<String>,
    image_url: Option<String>,
    description: Option<String>,
    project_url: Option<String>,
    creator: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct SiteState {
    id: ObjectId,
    name: String,
    metadata: SiteMetadata,
    resources: BTreeMap<String, ObjectId>,
    routes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
enum ObjectValue {
    Coin(u64),
    Storage(StorageResource),
    Blob(BlobObject),
    Site(SiteState),
    ResourceField(ResourceField),
    StakingPool(StakingPool),
}

#[derive(Debug, Clone)]
struct StoredObject {
    owner: Option<Address>,
    type_tag: String,
    version: u64,
    value: ObjectValue,
}

#[derive(Debug, Clone, Default)]
struct ObjectStore {
    epoch: u32,
    next_id: u64,
    objects: BTreeMap<ObjectId, StoredObject>,
}

impl ObjectStore {
    fn create(&mut self, owner: Option<Address>, type_tag: String, value: ObjectValue) -> ObjectId {
        self.next_id += 1;
        let mut hasher = Sha256::new();
        hasher.update(b"mock-object");
        hasher.update(self.next_id.to_le_bytes());
        let id = ObjectId::from_bytes(hasher.finalize().into());
        self.insert(id, owner, type_tag, value);
        id
    }

    fn insert(&mut self, id: ObjectId, owner: Option<Address>, type_tag: String, value: ObjectValue) {
        let value = match value {
            ObjectValue::Storage(mut storage) => {
                storage.id = id;
                ObjectValue::Storage(storage)
            }
            ObjectValue::Blob(mut blob) => {
                blob.id = id;
                ObjectValue::Blob(blob)
            }
            ObjectValue::Site(mut site) => {
                site.id = id;
                ObjectValue::Site(site)
            }
            ObjectValue::ResourceField(mut field) => {
                field.id = id;
                ObjectValue::ResourceField(field)
            }
            other => other,
        };
        self.objects.insert(
            id,
            StoredObject {
                owner,
                type_tag,
                version: 1,
                value,
            },
        );
    }

    fn get_mut(&mut self, id: &ObjectId) -> Result<&mut StoredObject, String> {
        let object = self
            .objects
            .get_mut(id)
            .ok_or_else(|| format!("object {} does not exist", id))?;
        object.version += 1;
        Ok(object)
    }

    fn remove(&mut self, id: &ObjectId) -> Result<StoredObject, String> {
        self.objects
            .remove(id)
            .ok_or_else(|| format!("object {} does not exist", id))
    }

    fn coin_mut(&mut self, id: &ObjectId) -> Result<&mut u64, String> {
        match &mut self.get_mut(id)?.value {
            ObjectValue::Coin(balance) => Ok(balance),
            _ => Err(format!("object {} is not a coin", id)),
        }
    }

    fn site_mut(&mut self, id: &ObjectId) -> Result<&mut SiteState, String> {
        match &mut self.get_mut(id)?.value {
            ObjectValue::Site(site) => Ok(site),
            _ => Err(format!("object {} is not a site", id)),
        }
    }

    fn blob_mut(&mut self, id: &ObjectId) -> Result<&mut BlobObject, String> {
        match &mut self.get_mut(id)?.value {
            ObjectValue::Blob(blob) => Ok(blob),
            _ => Err(format!("object {} is not a blob", id)),
        }
    }

    fn contents(&self, id: &ObjectId, object: &StoredObject) -> LedgerResult<Vec<u8>> {
        let bytes = match &object.value {
            ObjectValue::Coin(balance) => CborCodec::encode(
                "Coin",
                &CoinContents {
                    id: *id,
                    balance: *balance,
                },
            )?,
            ObjectValue::Storage(storage) => CborCodec::encode("Storage", storage)?,
            ObjectValue::Blob(blob) => CborCodec::encode("Blob", blob)?,
            ObjectValue::Site(site) => CborCodec::encode("Site", site)?,
            ObjectValue::ResourceField(field) => CborCodec::encode("Resource", field)?,
            ObjectValue::StakingPool(pool) => CborCodec::encode("StakingPool", pool)?,
        };
        Ok(bytes)
    }

    fn to_ledger_object(&self, id: &ObjectId, object: &StoredObject) -> LedgerResult<LedgerObject> {
        Ok(LedgerObject {
            object_id: *id,
            version: object.version,
            type_tag: object.type_tag.clone(),
            contents: self.contents(id, object)?,
        })
    }
}

/// Result of one interpreted command.
#[derive(Debug, Clone)]
enum Value {
    Unit,
    Object(ObjectId),
    Coins(Vec<ObjectId>),
    Metadata(SiteMetadata),
    Range(Option<RangeOption>),
    Resource(Resource),
}

/// One transaction being interpreted against a scratch copy of the store.
struct Execution<'a> {
    store: &'a mut ObjectStore,
    sender: Address,
    coin_type: String,
    results: Vec<Value>,
    created: Vec<ObjectId>,
    deleted: Vec<ObjectId>,
}

impl<'a> Execution<'a> {
    fn new(store: &'a mut ObjectStore, sender: Address, coin: &str) -> Self {
        Self {
            store,
            sender,
            coin_type: coin_type(coin),
            results: Vec::new(),
            created: Vec::new(),
            deleted: Vec::new(),
        }
    }

    fn result(&self, index: u16) -> Result<&Value, String> {
        self.results
            .get(usize::from(index))
            .ok_or_else(|| format!("result {} is not available yet", index))
    }

    fn resolve(&self, argument: &Argument) -> Result<ObjectId, String> {
        match argument {
            Argument::Object(id) => Ok(*id),
            Argument::Result(index) => match self.result(*index)? {
                Value::Object(id) => Ok(*id),
                other => Err(format!("result {} is not an object: {:?}", index, other)),
            },
            Argument::NestedResult(index, nested) => match self.result(*index)? {
                Value::Coins(coins) => coins
                    .get(usize::from(*nested))
                    .copied()
                    .ok_or_else(|| format!("result {} has no element {}", index, nested)),
                other => Err(format!("result {} is not a vector: {:?}", index, other)),
            },
        }
    }

    fn create(&mut self, type_tag: String, value: ObjectValue) -> ObjectId {
        let id = self.store.create(Some(self.sender), type_tag, value);
        self.created.push(id);
        id
    }

    fn delete(&mut self, id: ObjectId) -> Result<StoredObject, String> {
        let object = self.store.remove(&id)?;
        match self.created.iter().position(|c| *c == id) {
            Some(position) => {
                self.created.remove(position);
            }
            None => self.deleted.push(id),
        }
        Ok(object)
    }

    fn drain(&mut self, payment: &Argument) -> Result<u64, String> {
        let coin = self.resolve(payment)?;
        let balance = self.store.coin_mut(&coin)?;
        Ok(std::mem::take(balance))
    }

    fn run(&mut self, command: &Command) -> Result<Value, String> {
        match command {
            Command::MergeCoins {
                destination,
                sources,
            } => {
                let destination = self.resolve(destination)?;
                let mut total = 0u64;
                for source in sources {
                    let source = self.resolve(source)?;
                    if source == destination {
                        return Err("cannot merge a coin into itself".to_string());
                    }
                    match self.delete(source)?.value {
                        ObjectValue::Coin(balance) => total += balance,
                        _ => return Err(format!("object {} is not a coin", source)),
                    }
                }
                *self.store.coin_mut(&destination)? += total;
                Ok(Value::Unit)
            }
            Command::SplitCoins { coin, amounts } => {
                let coin = self.resolve(coin)?;
                let required: u64 = amounts.iter().sum();
                let balance = self.store.coin_mut(&coin)?;
                if *balance < required {
                    return Err(format!(
                        "insufficient coin balance: {} < {}",
                        balance, required
                    ));
                }
                *balance -= required;

                let type_tag = self.coin_type.clone();
                let coins = amounts
                    .iter()
                    .map(|amount| self.create(type_tag.clone(), ObjectValue::Coin(*amount)))
                    .collect();
                Ok(Value::Coins(coins))
            }
            Command::TransferObjects { objects, recipient } => {
                for object in objects {
                    let id = self.resolve(object)?;
                    self.store.get_mut(&id)?.owner = Some(*recipient);
                }
                Ok(Value::Unit)
            }
            Command::ReserveSpace {
                package,
                encoded_size,
                epochs,
                payment,
                ..
            } => {
                self.drain(payment)?;
                let epoch = self.store.epoch;
                let id = self.create(
                    format!("{}::storage_resource::Storage", package),
                    ObjectValue::Storage(StorageResource {
                        id: ObjectId::ZERO,
                        start_epoch: epoch,
                        end_epoch: epoch + epochs,
                        storage_size: *encoded_size,
                    }),
                );
                Ok(Value::Object(id))
            }
            Command::RegisterBlob {
                package,
                storage,
                blob_id,
                size,
                encoding_type,
                deletable,
                payment,
                ..
            } => {
                let storage = self.resolve(storage)?;
                let storage = match self.delete(storage)?.value {
                    ObjectValue::Storage(storage) => storage,
                    _ => return Err(format!("object {} is not a storage resource", storage)),
                };
                self.drain(payment)?;
                let id = self.create(
                    blob_type(package),
                    ObjectValue::Blob(BlobObject {
                        id: ObjectId::ZERO,
                        registered_epoch: self.store.epoch,
                        blob_id: *blob_id,
                        size: *size,
                        encoding_type: *encoding_type,
                        certified_epoch: None,
                        storage,
                        deletable: *deletable,
                    }),
                );
                Ok(Value::Object(id))
            }
            Command::CertifyBlob { blob, signers, .. } => {
                if signers.is_empty() {
                    return Err("certificate has no signers".to_string());
                }
                let blob = self.resolve(blob)?;
                let epoch = self.store.epoch;
                self.store.blob_mut(&blob)?.certified_epoch = Some(epoch);
                Ok(Value::Unit)
            }
            Command::DeleteBlob { package, blob, .. } => {
                let blob = self.resolve(blob)?;
                let blob = match self.delete(blob)?.value {
                    ObjectValue::Blob(blob) => blob,
                    _ => return Err(format!("object {} is not a blob", blob)),
                };
                if !blob.deletable {
                    return Err(format!("blob {} is not deletable", blob.blob_id));
                }
                let id = self.create(
                    format!("{}::storage_resource::Storage", package),
                    ObjectValue::Storage(blob.storage),
                );
                Ok(Value::Object(id))
            }
            Command::NewMetadata {
                link,
                image_url,
                description,
                project_url,
                creator,
                ..
            } => Ok(Value::Metadata(SiteMetadata {
                link: link.clone(),
                image_url: image_url.clone(),
                description: description.clone(),
                project_url: project_url.clone(),
                creator: creator.clone(),
            })),
            Command::NewSite {
                package,
                name,
                metadata,
            } => {
                let metadata = match metadata {
                    Argument::Result(index) => match self.result(*index)? {
                        Value::Metadata(metadata) => metadata.clone(),
                        other => return Err(format!("result {} is not metadata: {:?}", index, other)),
                    },
                    _ => return Err("site metadata must be a command result".to_string()),
                };
                let id = self.create(
                    site_type(package),
                    ObjectValue::Site(SiteState {
                        id: ObjectId::ZERO,
                        name: name.clone(),
                        metadata,
                        resources: BTreeMap::new(),
                        routes: None,
                    }),
                );
                Ok(Value::Object(id))
            }
            Command::RemoveResourceIfExists { site, path, .. } => {
                let site = self.resolve(site)?;
                if let Some(field) = self.store.site_mut(&site)?.resources.remove(path) {
                    self.delete(field)?;
                }
                Ok(Value::Unit)
            }
            Command::NewRangeOption { start, end, .. } => {
                if start.is_none() && end.is_none() {
                    Ok(Value::Range(None))
                } else {
                    Ok(Value::Range(Some(RangeOption {
                        start: *start,
                        end: *end,
                    })))
                }
            }
            Command::NewResource {
                path,
                blob_id,
                blob_hash,
                range,
                ..
            } => {
                let range = match range {
                    Argument::Result(index) => match self.result(*index)? {
                        Value::Range(range) => *range,
                        other => return Err(format!("result {} is not a range: {:?}", index, other)),
                    },
                    _ => return Err("resource range must be a command result".to_string()),
                };
                Ok(Value::Resource(Resource {
                    path: path.clone(),
                    headers: BTreeMap::new(),
                    blob_id: *blob_id,
                    blob_hash: *blob_hash,
                    range,
                }))
            }
            Command::AddHeader {
                resource,
                name,
                value,
                ..
            } => {
                let index = match resource {
                    Argument::Result(index) => usize::from(*index),
                    _ => return Err("header target must be a command result".to_string()),
                };
                match self.results.get_mut(index) {
                    Some(Value::Resource(resource)) => {
                        resource.headers.insert(name.clone(), value.clone());
                        Ok(Value::Unit)
                    }
                    _ => Err(format!("result {} is not a resource", index)),
                }
            }
            Command::AddResource {
                package,
                site,
                resource,
            } => {
                let resource = match resource {
                    Argument::Result(index) => match self.result(*index)? {
                        Value::Resource(resource) => resource.clone(),
                        other => {
                            return Err(format!("result {} is not a resource: {:?}", index, other))
                        }
                    },
                    _ => return Err("resource must be a command result".to_string()),
                };
                let site = self.resolve(site)?;
                if self.store.site_mut(&site)?.resources.contains_key(&resource.path) {
                    return Err(format!("resource {} already exists", resource.path));
                }

                let path = resource.path.clone();
                let field = self.store.create(
                    None,
                    resource_type(package),
                    ObjectValue::ResourceField(ResourceField {
                        id: ObjectId::ZERO,
                        name: ResourcePath { path: path.clone() },
                        value: resource,
                    }),
                );
                self.created.push(field);
                self.store.site_mut(&site)?.resources.insert(path, field);
                Ok(Value::Unit)
            }
            Command::RemoveAllRoutesIfExist { site, .. } => {
                let site = self.resolve(site)?;
                self.store.site_mut(&site)?.routes = None;
                Ok(Value::Unit)
            }
            Command::CreateRoutes { site, .. } => {
                let site = self.resolve(site)?;
                let site = self.store.site_mut(&site)?;
                if site.routes.is_some() {
                    return Err("routes already exist".to_string());
                }
                site.routes = Some(BTreeMap::new());
                Ok(Value::Unit)
            }
            Command::InsertRoute {
                site, route, path, ..
            } => {
                let site = self.resolve(site)?;
                match &mut self.store.site_mut(&site)?.routes {
                    Some(routes) => {
                        routes.insert(route.clone(), path.clone());
                        Ok(Value::Unit)
                    }
                    None => Err("site has no route table".to_string()),
                }
            }
        }
    }
}

/// Outcome of interpreting a whole transaction.
struct Interpreted {
    store: ObjectStore,
    created: Vec<ObjectId>,
    deleted: Vec<ObjectId>,
}

fn interpret(store: &ObjectStore, coin: &str, tx: &TransactionData) -> Result<Interpreted, String> {
    let mut scratch = store.clone();
    let mut execution = Execution::new(&mut scratch, tx.sender, coin);
    for (index, command) in tx.kind.commands.iter().enumerate() {
        let value = execution
            .run(command)
            .map_err(|e| format!("command {} ({:?}) aborted: {}", index, command.kind(), e))?;
        execution.results.push(value);
    }
    let created = std::mem::take(&mut execution.created);
    let deleted = std::mem::take(&mut execution.deleted);
    Ok(Interpreted {
        store: scratch,
        created,
        deleted,
    })
}

impl MockLedgerClient {
    /// Create an empty ledger whose payment coins have type `coin_type`.
    pub fn new(coin_type: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                store: ObjectStore::default(),
                coin_type: coin_type.to_string(),
                failing: HashSet::new(),
                transactions: Vec::new(),
                effects: HashMap::new(),
                multi_get_calls: 0,
            })),
        }
    }

    pub fn epoch(&self) -> u32 {
        self.state.lock().unwrap().store.epoch
    }

    pub fn set_epoch(&self, epoch: u32) {
        self.state.lock().unwrap().store.epoch = epoch;
    }

    /// Give `owner` a fresh payment coin worth `amount`.
    pub fn mint_coin(&self, owner: Address, amount: u64) -> ObjectId {
        let mut s = self.state.lock().unwrap();
        let type_tag = coin_type(&s.coin_type);
        s.store
            .create(Some(owner), type_tag, ObjectValue::Coin(amount))
    }

    /// Publish a committee member's staking pool as a shared object.
    pub fn add_staking_pool(&self, system_package: &ObjectId, pool: StakingPool) {
        let mut s = self.state.lock().unwrap();
        let id = pool.id;
        s.store.insert(
            id,
            None,
            staking_pool_type(system_package),
            ObjectValue::StakingPool(pool),
        );
    }

    /// Store a blob object directly, bypassing registration.
    pub fn insert_blob(&self, owner: Address, blob_package: &ObjectId, blob: BlobObject) -> ObjectId {
        let mut s = self.state.lock().unwrap();
        s.store
            .create(Some(owner), blob_type(blob_package), ObjectValue::Blob(blob))
    }

    /// Fail every transaction that contains a command of `kind`.
    pub fn fail_command(&self, kind: CommandKind) {
        self.state.lock().unwrap().failing.insert(kind);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    /// Every transaction submitted for execution, in order.
    pub fn transactions(&self) -> Vec<TransactionData> {
        self.state.lock().unwrap().transactions.clone()
    }

    /// Effects of every executed transaction, in submission order.
    pub fn effects(&self) -> Vec<TransactionEffects> {
        let s = self.state.lock().unwrap();
        (1..=s.transactions.len())
            .filter_map(|n| {
                s.effects
                    .get(&TransactionDigest(format!("mock-tx-{}", n)))
                    .cloned()
            })
            .collect()
    }

    /// Number of `multi_get_objects` requests served.
    pub fn multi_get_calls(&self) -> usize {
        self.state.lock().unwrap().multi_get_calls
    }

    pub fn exists(&self, id: &ObjectId) -> bool {
        self.state.lock().unwrap().store.objects.contains_key(id)
    }

    pub fn blob(&self, id: &ObjectId) -> Option<BlobObject> {
        match &self.state.lock().unwrap().store.objects.get(id)?.value {
            ObjectValue::Blob(blob) => Some(blob.clone()),
            _ => None,
        }
    }

    /// Blob objects owned by `owner`, in id order.
    pub fn owned_blobs(&self, owner: &Address) -> Vec<BlobObject> {
        let s = self.state.lock().unwrap();
        s.store
            .objects
            .values()
            .filter(|object| object.owner.as_ref() == Some(owner))
            .filter_map(|object| match &object.value {
                ObjectValue::Blob(blob) => Some(blob.clone()),
                _ => None,
            })
            .collect()
    }

    /// Total payment-coin balance of `owner`.
    pub fn coin_balance(&self, owner: &Address) -> u64 {
        let s = self.state.lock().unwrap();
        s.store
            .objects
            .values()
            .filter(|object| object.owner.as_ref() == Some(owner))
            .filter_map(|object| match object.value {
                ObjectValue::Coin(balance) => Some(balance),
                _ => None,
            })
            .sum()
    }

    pub fn site_name(&self, site: &ObjectId) -> Option<String> {
        match &self.state.lock().unwrap().store.objects.get(site)?.value {
            ObjectValue::Site(state) => Some(state.name.clone()),
            _ => None,
        }
    }

    /// Resources of `site`, keyed by path.
    pub fn site_resources(&self, site: &ObjectId) -> BTreeMap<String, Resource> {
        let s = self.state.lock().unwrap();
        let fields = match s.store.objects.get(site).map(|object| &object.value) {
            Some(ObjectValue::Site(state)) => state.resources.clone(),
            _ => return BTreeMap::new(),
        };
        fields
            .into_iter()
            .filter_map(|(path, field)| match &s.store.objects.get(&field)?.value {
                ObjectValue::ResourceField(field) => Some((path, field.value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn site_routes(&self, site: &ObjectId) -> Option<BTreeMap<String, String>> {
        match &self.state.lock().unwrap().store.objects.get(site)?.value {
            ObjectValue::Site(state) => state.routes.clone(),
            _ => None,
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn dry_run(&self, tx: &TransactionData) -> LedgerResult<DryRunResult> {
        let s = self.state.lock().unwrap();
        let status = match interpret(&s.store, &s.coin_type, tx) {
            Ok(_) => ExecutionStatus::Success,
            Err(error) => ExecutionStatus::Failure { error },
        };
        Ok(DryRunResult {
            status,
            gas_budget: 1_000 + 500 * tx.kind.commands.len() as u64,
        })
    }

    async fn execute(
        &self,
        tx: &TransactionData,
        signature: &Signature,
    ) -> LedgerResult<TransactionDigest> {
        if derive_address(&signature.public_key) != tx.sender {
            return Err(LedgerError::Rpc(
                "signature does not match transaction sender".to_string(),
            ));
        }

        let mut s = self.state.lock().unwrap();
        s.transactions.push(tx.clone());
        let digest = TransactionDigest(format!("mock-tx-{}", s.transactions.len()));

        let injected = tx
            .kind
            .commands
            .iter()
            .map(Command::kind)
            .find(|kind| s.failing.contains(kind));

        let outcome = match injected {
            Some(kind) => Err(format!("injected failure in {:?}", kind)),
            None => interpret(&s.store, &s.coin_type, tx),
        };

        let effects = match outcome {
            Ok(interpreted) => {
                s.store = interpreted.store;
                let created = interpreted
                    .created
                    .iter()
                    .filter_map(|id| {
                        s.store.objects.get(id).map(|object| ObjectRef {
                            object_id: *id,
                            version: object.version,
                        })
                    })
                    .collect();
                TransactionEffects {
                    digest: digest.clone(),
                    status: ExecutionStatus::Success,
                    created,
                    deleted: interpreted.deleted,
                }
            }
            Err(error) => TransactionEffects {
                digest: digest.clone(),
                status: ExecutionStatus::Failure { error },
                created: Vec::new(),
                deleted: Vec::new(),
            },
        };
        s.effects.insert(digest.clone(), effects);
        Ok(digest)
    }

    async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> LedgerResult<TransactionEffects> {
        self.state
            .lock()
            .unwrap()
            .effects
            .get(digest)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownTransaction(digest.clone()))
    }

    async fn multi_get_objects(&self, ids: &[ObjectId]) -> LedgerResult<Vec<LedgerObject>> {
        let mut s = self.state.lock().unwrap();
        s.multi_get_calls += 1;
        ids.iter()
            .filter_map(|id| s.store.objects.get(id).map(|object| (id, object)))
            .map(|(id, object)| s.store.to_ledger_object(id, object))
            .collect()
    }

    async fn owned_objects(
        &self,
        owner: &Address,
        struct_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> LedgerResult<Page<LedgerObject>> {
        let after = match cursor {
            Some(cursor) => Some(
                cursor
                    .parse::<ObjectId>()
                    .map_err(|e| LedgerError::Rpc(e.to_string()))?,
            ),
            None => None,
        };

        let s = self.state.lock().unwrap();
        let mut matching = s
            .store
            .objects
            .iter()
            .filter(|(id, _)| after.map_or(true, |after| **id > after))
            .filter(|(_, object)| {
                object.owner.as_ref() == Some(owner) && object.type_tag == struct_type
            });

        let mut data = Vec::new();
        for (id, object) in matching.by_ref().take(limit.max(1)) {
            data.push(s.store.to_ledger_object(id, object)?);
        }
        let has_next_page = matching.next().is_some();
        let next_cursor = data.last().map(|object| object.object_id.to_string());

        Ok(Page {
            data,
            next_cursor,
            has_next_page,
        })
    }

    async fn dynamic_fields(
        &self,
        parent: &ObjectId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<DynamicFieldInfo>> {
        let start = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|e| LedgerError::Rpc(e.to_string()))?,
            None => 0,
        };

        let s = self.state.lock().unwrap();
        let site = match s.store.objects.get(parent).map(|object| &object.value) {
            Some(ObjectValue::Site(site)) => site,
            _ => return Err(LedgerError::ObjectNotFound(*parent)),
        };

        let fields: Vec<DynamicFieldInfo> = site
            .resources
            .iter()
            .filter_map(|(path, field)| {
                s.store.objects.get(field).map(|object| DynamicFieldInfo {
                    object_id: *field,
                    object_type: object.type_tag.clone(),
                    name: path.clone(),
                })
            })
            .collect();

        let end = (start + DYNAMIC_FIELD_PAGE).min(fields.len());
        let data = fields.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let has_next_page = end < fields.len();

        Ok(Page {
            data,
            next_cursor: has_next_page.then(|| end.to_string()),
            has_next_page,
        })
    }

    async fn balance(&self, owner: &Address, coin_type: &str) -> LedgerResult<u64> {
        let s = self.state.lock().unwrap();
        if coin_type != s.coin_type {
            return Ok(0);
        }
        let type_tag = super::objects::coin_type(&s.coin_type);
        Ok(s.store
            .objects
            .values()
            .filter(|object| object.owner.as_ref() == Some(owner) && object.type_tag == type_tag)
            .map(|object| match object.value {
                ObjectValue::Coin(balance) => balance,
                _ => 0,
            })
            .sum())
    }
}
