//! In-process document store
//!
//! Keeps collections in memory, keyed by URI, database and collection name,
//! so data survives a client being closed and re-dialed just like it would
//! on a real server. Filters support field equality (including dotted paths
//! and array membership), `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
//! `$nin`, `$exists`, `$and`, `$or` and `$nor`. Updates support `$set`,
//! `$unset`, `$inc` and `$setOnInsert`.
//!
//! Connection faults can be injected per URI with
//! [`MemoryStore::set_unreachable`], [`MemoryStore::break_connections`] and
//! [`MemoryStore::stall_connections`].
//!
//! # Example
//!
//! ```rust
//! use bson::doc;
//! use mgdao_conf::PoolSettings;
//! use mgdao_db::backends::memory::MemoryStore;
//! use mgdao_db::store::DocumentStore;
//! use mgdao_db::types::FindOptions;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let client = store.dial("memory://local", &PoolSettings::default()).await.unwrap();
//! let users = client.database("app").collection("users");
//!
//! users.insert_one(doc! { "name": "alice" }).await.unwrap();
//! let found = users.find(doc! { "name": "alice" }, FindOptions::new()).await.unwrap();
//! assert_eq!(found.len(), 1);
//! # }
//! ```

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use mgdao_conf::PoolSettings;
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use crate::error::{Error, Result};
use crate::store::{DocumentStore, StoreClient, StoreCollection, StoreDatabase};
use crate::types::{FindOptions, UpdateResult};

const URI_SCHEMES: [&str; 3] = ["mongodb://", "mongodb+srv://", "memory://"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Namespace {
	uri: String,
	database: String,
	collection: String,
}

#[derive(Default)]
struct MemoryInner {
	collections: RwLock<HashMap<Namespace, Vec<Document>>>,
	unreachable: RwLock<HashSet<String>>,
	clients: Mutex<Vec<Arc<ClientState>>>,
	dials: Mutex<HashMap<String, usize>>,
	next_client_id: AtomicU64,
}

struct ClientState {
	id: u64,
	uri: String,
	pool: PoolSettings,
	broken: AtomicBool,
	stalled: AtomicBool,
	closed: AtomicBool,
}

/// In-memory [`DocumentStore`]; clones share the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
	inner: Arc<MemoryInner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make dials to `uri` fail (or succeed again)
	pub fn set_unreachable(&self, uri: &str, unreachable: bool) {
		let mut set = self.inner.unreachable.write();
		if unreachable {
			set.insert(uri.to_string());
		} else {
			set.remove(uri);
		}
	}

	/// Drop every open client for `uri`: pings and operations start failing
	pub fn break_connections(&self, uri: &str) {
		for client in self.clients_for(uri) {
			client.broken.store(true, AtomicOrdering::SeqCst);
		}
	}

	/// Make pings on every open client for `uri` hang forever
	pub fn stall_connections(&self, uri: &str) {
		for client in self.clients_for(uri) {
			client.stalled.store(true, AtomicOrdering::SeqCst);
		}
	}

	/// Number of dial attempts made for `uri`, successful or not
	pub fn dial_count(&self, uri: &str) -> usize {
		self.inner.dials.lock().get(uri).copied().unwrap_or(0)
	}

	/// Number of clients for `uri` that have not been closed
	pub fn open_clients(&self, uri: &str) -> usize {
		self.clients_for(uri)
			.iter()
			.filter(|c| !c.closed.load(AtomicOrdering::SeqCst))
			.count()
	}

	/// Pool settings the most recent client for `uri` was dialed with
	pub fn last_pool_settings(&self, uri: &str) -> Option<PoolSettings> {
		self.clients_for(uri).last().map(|c| c.pool)
	}

	fn clients_for(&self, uri: &str) -> Vec<Arc<ClientState>> {
		self.inner
			.clients
			.lock()
			.iter()
			.filter(|c| c.uri == uri)
			.cloned()
			.collect()
	}
}

#[async_trait]
impl DocumentStore for MemoryStore {
	async fn dial(&self, uri: &str, pool: &PoolSettings) -> Result<Arc<dyn StoreClient>> {
		*self.inner.dials.lock().entry(uri.to_string()).or_insert(0) += 1;

		if !URI_SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
			return Err(Error::Connection(format!("invalid connection string: {:?}", uri)));
		}
		if self.inner.unreachable.read().contains(uri) {
			return Err(Error::Connection(format!("server selection timeout: {}", uri)));
		}
		pool.validate().map_err(Error::Configuration)?;

		let state = Arc::new(ClientState {
			id: self.inner.next_client_id.fetch_add(1, AtomicOrdering::SeqCst),
			uri: uri.to_string(),
			pool: *pool,
			broken: AtomicBool::new(false),
			stalled: AtomicBool::new(false),
			closed: AtomicBool::new(false),
		});
		self.inner.clients.lock().push(state.clone());

		Ok(Arc::new(MemoryClient {
			state,
			inner: self.inner.clone(),
		}))
	}
}

/// Client handed out by [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryClient {
	state: Arc<ClientState>,
	inner: Arc<MemoryInner>,
}

impl MemoryClient {
	/// Unique per dial
	pub fn id(&self) -> u64 {
		self.state.id
	}

	pub fn is_closed(&self) -> bool {
		self.state.closed.load(AtomicOrdering::SeqCst)
	}

	fn ensure_usable(&self) -> Result<()> {
		if self.is_closed() {
			return Err(Error::Connection("client is closed".to_string()));
		}
		if self.state.broken.load(AtomicOrdering::SeqCst) {
			return Err(Error::Connection(format!(
				"connection to {} reset",
				self.state.uri
			)));
		}
		Ok(())
	}
}

#[async_trait]
impl StoreClient for MemoryClient {
	async fn ping(&self) -> Result<()> {
		if self.state.stalled.load(AtomicOrdering::SeqCst) {
			std::future::pending::<()>().await;
		}
		self.ensure_usable()
	}

	async fn close(&self) {
		self.state.closed.store(true, AtomicOrdering::SeqCst);
	}

	fn database(&self, name: &str) -> Arc<dyn StoreDatabase> {
		Arc::new(MemoryDatabase {
			client: self.clone(),
			name: name.to_string(),
		})
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

pub struct MemoryDatabase {
	client: MemoryClient,
	name: String,
}

#[async_trait]
impl StoreDatabase for MemoryDatabase {
	fn name(&self) -> &str {
		&self.name
	}

	fn collection(&self, name: &str) -> Arc<dyn StoreCollection> {
		Arc::new(MemoryCollection {
			client: self.client.clone(),
			namespace: Namespace {
				uri: self.client.state.uri.clone(),
				database: self.name.clone(),
				collection: name.to_string(),
			},
		})
	}

	async fn drop_database(&self) -> Result<()> {
		self.client.ensure_usable()?;
		let uri = &self.client.state.uri;
		self.client
			.inner
			.collections
			.write()
			.retain(|ns, _| !(ns.uri == *uri && ns.database == self.name));
		Ok(())
	}

	async fn run_command(&self, command: Document) -> Result<Document> {
		self.client.ensure_usable()?;
		match command.keys().next().map(String::as_str) {
			Some("ping") => Ok(doc! { "ok": 1.0 }),
			Some(other) => Err(Error::InvalidOperation(format!(
				"unsupported command: {}",
				other
			))),
			None => Err(Error::InvalidOperation("empty command".to_string())),
		}
	}
}

pub struct MemoryCollection {
	client: MemoryClient,
	namespace: Namespace,
}

impl MemoryCollection {
	fn read<T>(&self, f: impl FnOnce(&[Document]) -> Result<T>) -> Result<T> {
		self.client.ensure_usable()?;
		let collections = self.client.inner.collections.read();
		match collections.get(&self.namespace) {
			Some(docs) => f(docs),
			None => f(&[]),
		}
	}

	fn write<T>(&self, f: impl FnOnce(&mut Vec<Document>) -> Result<T>) -> Result<T> {
		self.client.ensure_usable()?;
		let mut collections = self.client.inner.collections.write();
		f(collections.entry(self.namespace.clone()).or_default())
	}
}

#[async_trait]
impl StoreCollection for MemoryCollection {
	fn name(&self) -> &str {
		&self.namespace.collection
	}

	async fn insert_one(&self, document: Document) -> Result<Bson> {
		self.write(|docs| insert_document(docs, document))
	}

	async fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<Bson>> {
		self.write(|docs| {
			documents
				.into_iter()
				.map(|document| insert_document(docs, document))
				.collect()
		})
	}

	async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
		self.read(|docs| select(docs, &filter, &options))
	}

	async fn find_one(&self, filter: Document, options: FindOptions) -> Result<Option<Document>> {
		let options = options.limit(1);
		self.read(|docs| Ok(select(docs, &filter, &options)?.into_iter().next()))
	}

	async fn count(&self, filter: Document) -> Result<u64> {
		self.read(|docs| {
			let mut count = 0;
			for document in docs {
				if matches(document, &filter)? {
					count += 1;
				}
			}
			Ok(count)
		})
	}

	async fn update_one(
		&self,
		filter: Document,
		update: Document,
		upsert: bool,
	) -> Result<UpdateResult> {
		self.write(|docs| {
			for document in docs.iter_mut() {
				if matches(document, &filter)? {
					let modified = apply_update(document, &update)?;
					return Ok(UpdateResult::new(1, u64::from(modified), 0, None));
				}
			}
			if !upsert {
				return Ok(UpdateResult::default());
			}

			let mut seeded = seed_from_filter(&filter);
			if let Ok(on_insert) = update.get_document("$setOnInsert") {
				for (path, value) in on_insert {
					set_path(&mut seeded, path, value.clone())?;
				}
			}
			apply_update(&mut seeded, &update)?;
			let id = insert_document(docs, seeded)?;
			Ok(UpdateResult::new(0, 0, 1, Some(id)))
		})
	}

	async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateResult> {
		self.write(|docs| {
			let mut result = UpdateResult::default();
			for document in docs.iter_mut() {
				if matches(document, &filter)? {
					result.matched_count += 1;
					if apply_update(document, &update)? {
						result.modified_count += 1;
					}
				}
			}
			Ok(result)
		})
	}

	async fn delete_one(&self, filter: Document) -> Result<u64> {
		self.write(|docs| {
			for index in 0..docs.len() {
				if matches(&docs[index], &filter)? {
					docs.remove(index);
					return Ok(1);
				}
			}
			Ok(0)
		})
	}

	async fn delete_many(&self, filter: Document) -> Result<u64> {
		self.write(|docs| {
			let mut kept = Vec::with_capacity(docs.len());
			let mut deleted = 0;
			for document in docs.drain(..) {
				if matches(&document, &filter)? {
					deleted += 1;
				} else {
					kept.push(document);
				}
			}
			*docs = kept;
			Ok(deleted)
		})
	}

	async fn drop_collection(&self) -> Result<()> {
		self.client.ensure_usable()?;
		self.client
			.inner
			.collections
			.write()
			.remove(&self.namespace);
		Ok(())
	}

	// Indexes are not modelled; dropping one always succeeds
	async fn drop_index(&self, _name: &str) -> Result<()> {
		self.client.ensure_usable()
	}
}

fn insert_document(docs: &mut Vec<Document>, document: Document) -> Result<Bson> {
	let document = with_id(document);
	let id = document.get("_id").cloned().unwrap_or(Bson::Null);

	if docs
		.iter()
		.any(|existing| existing.get("_id").is_some_and(|other| bson_eq(other, &id)))
	{
		return Err(Error::Execution(format!(
			"E11000 duplicate key error: _id {}",
			id
		)));
	}

	docs.push(document);
	Ok(id)
}

fn with_id(document: Document) -> Document {
	if document.contains_key("_id") {
		return document;
	}
	let mut with_id = doc! { "_id": ObjectId::new() };
	for (key, value) in document {
		with_id.insert(key, value);
	}
	with_id
}

fn select(docs: &[Document], filter: &Document, options: &FindOptions) -> Result<Vec<Document>> {
	let mut selected = Vec::new();
	for document in docs {
		if matches(document, filter)? {
			selected.push(document.clone());
		}
	}

	if let Some(sort) = options.sort.as_ref().filter(|s| !s.is_empty()) {
		selected.sort_by(|a, b| {
			for (field, direction) in sort {
				let order = sort_order(lookup(a, field), lookup(b, field));
				let order = if numeric(direction).is_some_and(|d| d < 0.0) {
					order.reverse()
				} else {
					order
				};
				if order != Ordering::Equal {
					return order;
				}
			}
			Ordering::Equal
		});
	}

	let skip = usize::try_from(options.skip.unwrap_or(0)).unwrap_or(usize::MAX);
	let limit = match options.limit.map(i64::unsigned_abs) {
		None | Some(0) => usize::MAX,
		Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
	};
	Ok(selected.into_iter().skip(skip).take(limit).collect())
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
	match path.split_once('.') {
		None => document.get(path),
		Some((head, rest)) => match document.get(head)? {
			Bson::Document(inner) => lookup(inner, rest),
			_ => None,
		},
	}
}

fn matches(document: &Document, filter: &Document) -> Result<bool> {
	for (key, condition) in filter {
		let matched = match key.as_str() {
			"$and" => all_clauses(condition)?
				.iter()
				.try_fold(true, |acc, clause| Ok::<_, Error>(acc && matches(document, clause)?))?,
			"$or" => {
				let mut any = false;
				for clause in all_clauses(condition)? {
					if matches(document, clause)? {
						any = true;
						break;
					}
				}
				any
			}
			"$nor" => {
				let mut none = true;
				for clause in all_clauses(condition)? {
					if matches(document, clause)? {
						none = false;
						break;
					}
				}
				none
			}
			op if op.starts_with('$') => {
				return Err(Error::InvalidOperation(format!(
					"unknown top level operator: {}",
					op
				)));
			}
			path => field_matches(lookup(document, path), condition)?,
		};
		if !matched {
			return Ok(false);
		}
	}
	Ok(true)
}

fn all_clauses(condition: &Bson) -> Result<Vec<&Document>> {
	let Bson::Array(items) = condition else {
		return Err(Error::InvalidOperation(
			"logical operator needs an array".to_string(),
		));
	};
	items
		.iter()
		.map(|item| match item {
			Bson::Document(clause) => Ok(clause),
			_ => Err(Error::InvalidOperation(
				"logical operator clauses must be documents".to_string(),
			)),
		})
		.collect()
}

fn is_operator_document(condition: &Bson) -> bool {
	match condition {
		Bson::Document(ops) => ops.keys().next().is_some_and(|k| k.starts_with('$')),
		_ => false,
	}
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
	let Bson::Document(ops) = condition else {
		return Ok(equals(value, condition));
	};
	if !is_operator_document(condition) {
		return Ok(equals(value, condition));
	}

	for (op, argument) in ops {
		let matched = match op.as_str() {
			"$eq" => equals(value, argument),
			"$ne" => !equals(value, argument),
			"$gt" => compares(value, argument, |o| o == Ordering::Greater),
			"$gte" => compares(value, argument, |o| o != Ordering::Less),
			"$lt" => compares(value, argument, |o| o == Ordering::Less),
			"$lte" => compares(value, argument, |o| o != Ordering::Greater),
			"$in" => in_list(value, argument)?,
			"$nin" => !in_list(value, argument)?,
			"$exists" => value.is_some() == truthy(argument),
			other => {
				return Err(Error::InvalidOperation(format!(
					"unknown operator: {}",
					other
				)));
			}
		};
		if !matched {
			return Ok(false);
		}
	}
	Ok(true)
}

fn in_list(value: Option<&Bson>, argument: &Bson) -> Result<bool> {
	let Bson::Array(candidates) = argument else {
		return Err(Error::InvalidOperation("$in needs an array".to_string()));
	};
	Ok(candidates.iter().any(|candidate| equals(value, candidate)))
}

fn equals(value: Option<&Bson>, target: &Bson) -> bool {
	match value {
		None => matches!(target, Bson::Null),
		Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => {
			items.iter().any(|item| bson_eq(item, target))
		}
		Some(value) => bson_eq(value, target),
	}
}

fn compares(value: Option<&Bson>, target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
	match value {
		Some(Bson::Array(items)) => items
			.iter()
			.any(|item| compare(item, target).is_some_and(&accept)),
		Some(value) => compare(value, target).is_some_and(accept),
		None => false,
	}
}

fn truthy(value: &Bson) -> bool {
	match value {
		Bson::Boolean(b) => *b,
		Bson::Null => false,
		other => numeric(other).is_none_or(|n| n != 0.0),
	}
}

fn numeric(value: &Bson) -> Option<f64> {
	match value {
		Bson::Int32(n) => Some(f64::from(*n)),
		Bson::Int64(n) => Some(*n as f64),
		Bson::Double(n) => Some(*n),
		_ => None,
	}
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
	match (numeric(a), numeric(b)) {
		(Some(x), Some(y)) => x == y,
		_ => a == b,
	}
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
	if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
		return x.partial_cmp(&y);
	}
	match (a, b) {
		(Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
		(Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
		(Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
		(Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
		_ => None,
	}
}

fn type_rank(value: Option<&Bson>) -> u8 {
	match value {
		None | Some(Bson::Null) => 0,
		Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
		Some(Bson::String(_)) => 2,
		Some(Bson::Document(_)) => 3,
		Some(Bson::Array(_)) => 4,
		Some(Bson::ObjectId(_)) => 5,
		Some(Bson::Boolean(_)) => 6,
		Some(Bson::DateTime(_)) => 7,
		Some(_) => 8,
	}
}

fn sort_order(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
	type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
		(Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
		_ => Ordering::Equal,
	})
}

fn apply_update(document: &mut Document, update: &Document) -> Result<bool> {
	if update.is_empty() || update.keys().any(|k| !k.starts_with('$')) {
		return Err(Error::InvalidOperation(
			"update document requires update operators".to_string(),
		));
	}

	let before = document.clone();
	for (op, fields) in update {
		let Bson::Document(fields) = fields else {
			return Err(Error::InvalidOperation(format!(
				"{} needs a document argument",
				op
			)));
		};
		for (path, value) in fields {
			if path == "_id" && op != "$setOnInsert" && document.get("_id") != Some(value) {
				return Err(Error::InvalidOperation(
					"performing an update on the path '_id' would modify the immutable field '_id'"
						.to_string(),
				));
			}
			match op.as_str() {
				"$set" => set_path(document, path, value.clone())?,
				"$unset" => remove_path(document, path),
				"$inc" => {
					let current = lookup(document, path).cloned().unwrap_or(Bson::Int32(0));
					set_path(document, path, add(&current, value)?)?;
				}
				"$setOnInsert" => {}
				other => {
					return Err(Error::InvalidOperation(format!(
						"unknown update operator: {}",
						other
					)));
				}
			}
		}
	}
	Ok(*document != before)
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<()> {
	match path.split_once('.') {
		None => {
			document.insert(path, value);
			Ok(())
		}
		Some((head, rest)) => {
			if !document.contains_key(head) {
				document.insert(head, Document::new());
			}
			match document.get_mut(head) {
				Some(Bson::Document(inner)) => set_path(inner, rest, value),
				_ => Err(Error::InvalidOperation(format!(
					"cannot create field '{}' in non-document '{}'",
					rest, head
				))),
			}
		}
	}
}

fn remove_path(document: &mut Document, path: &str) {
	match path.split_once('.') {
		None => {
			document.remove(path);
		}
		Some((head, rest)) => {
			if let Some(Bson::Document(inner)) = document.get_mut(head) {
				remove_path(inner, rest);
			}
		}
	}
}

fn add(current: &Bson, delta: &Bson) -> Result<Bson> {
	match (current, delta) {
		(Bson::Int32(a), Bson::Int32(b)) => Ok(a
			.checked_add(*b)
			.map(Bson::Int32)
			.unwrap_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)))),
		(Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
			let a = numeric(current).unwrap_or(0.0) as i64;
			let b = numeric(delta).unwrap_or(0.0) as i64;
			Ok(Bson::Int64(a.saturating_add(b)))
		}
		_ => match (numeric(current), numeric(delta)) {
			(Some(a), Some(b)) => Ok(Bson::Double(a + b)),
			_ => Err(Error::InvalidOperation(
				"cannot apply $inc to a non-numeric value".to_string(),
			)),
		},
	}
}

fn seed_from_filter(filter: &Document) -> Document {
	let mut seeded = Document::new();
	for (key, value) in filter {
		if key.starts_with('$') {
			continue;
		}
		let value = match value {
			Bson::Document(ops) if is_operator_document(value) => match ops.get("$eq") {
				Some(eq) => eq.clone(),
				None => continue,
			},
			other => other.clone(),
		};
		// Dotted filter keys always land inside fresh sub-documents
		let _ = set_path(&mut seeded, key, value);
	}
	seeded
}
