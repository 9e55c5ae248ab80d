//! In-process [`Store`] backed by ordered maps behind one `RwLock`.
//!
//! Similarity search is a brute-force cosine scan over the chunks of the resolved collections.
//! Every mutation runs under the write lock, so readers only ever observe whole writes.

use std::{
	collections::{BTreeMap, BTreeSet},
	future,
	sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use time::OffsetDateTime;

use folio_domain::{
	Collection, CollectionConfig, CollectionPath, CollectionPattern, ExternalPrincipal,
	PrincipalId, PrincipalKind, RankedResult, StoredChunkRecord, chunk,
	similarity::{self, Scored},
};

use crate::{
	BoxFuture, CreateMode, CreateOutcome, Error, NearestQuery, Result, SchemaState, Store, error,
};

#[derive(Debug)]
pub struct MemoryStore {
	vector_dim: u32,
	state: RwLock<Option<MemoryState>>,
}
impl MemoryStore {
	/// Starts uninitialized, like an empty database.
	pub fn new(vector_dim: u32) -> Self {
		Self { vector_dim, state: RwLock::new(None) }
	}

	fn read(&self) -> RwLockReadGuard<'_, Option<MemoryState>> {
		self.state.read().unwrap_or_else(|err| err.into_inner())
	}

	fn write(&self) -> RwLockWriteGuard<'_, Option<MemoryState>> {
		self.state.write().unwrap_or_else(|err| err.into_inner())
	}

	fn with_state<T>(&self, f: impl FnOnce(&MemoryState) -> Result<T>) -> Result<T> {
		let guard = self.read();

		f(guard.as_ref().ok_or(Error::Uninitialized)?)
	}

	fn with_state_mut<T>(&self, f: impl FnOnce(&mut MemoryState) -> Result<T>) -> Result<T> {
		let mut guard = self.write();

		f(guard.as_mut().ok_or(Error::Uninitialized)?)
	}
}

#[derive(Debug)]
struct MemoryState {
	next_user: u64,
	next_group: u64,
	principal_ids: BTreeMap<String, PrincipalId>,
	principals: BTreeMap<PrincipalId, ExternalPrincipal>,
	collections: BTreeMap<CollectionPath, Collection>,
	chunks: BTreeMap<(CollectionPath, String), StoredChunk>,
	next_seq: u64,
}
impl Default for MemoryState {
	fn default() -> Self {
		Self {
			next_user: 1,
			next_group: 1,
			principal_ids: BTreeMap::new(),
			principals: BTreeMap::new(),
			collections: BTreeMap::new(),
			chunks: BTreeMap::new(),
			next_seq: 1,
		}
	}
}
impl MemoryState {
	fn allocate_principal(&mut self, kind: PrincipalKind) -> Result<PrincipalId> {
		let counter = match kind {
			PrincipalKind::User => &mut self.next_user,
			PrincipalKind::Group => &mut self.next_group,
		};
		let id = PrincipalId::new(kind, *counter).ok_or_else(|| {
			Error::InvalidArgument(format!("Principal id space for {kind} is exhausted."))
		})?;

		*counter += 1;

		Ok(id)
	}

	fn create_collection(
		&mut self,
		config: &CollectionConfig,
		mode: CreateMode,
	) -> Result<CreateOutcome> {
		let path = &config.path;

		if let Some(existing) = self.collections.get(path) {
			return match mode {
				CreateMode::ReturnExisting => Ok(CreateOutcome {
					collection: existing.clone(),
					created: false,
					parent_flipped: false,
				}),
				CreateMode::FailIfExists =>
					Err(Error::Conflict(format!("Collection {path} already exists."))),
			};
		}

		let has_children = self.collections.keys().any(|other| other.is_child_of(path));
		let collection = Collection {
			path: path.clone(),
			queryable_by: config.queryable_by.clone(),
			is_leaf: !has_children,
			created_at: OffsetDateTime::now_utc(),
		};
		let parent = path.parent().and_then(|parent| self.collections.get_mut(&parent));
		let parent_flipped = match parent {
			Some(parent) if parent.is_leaf => {
				parent.is_leaf = false;

				true
			},
			_ => false,
		};

		self.collections.insert(path.clone(), collection.clone());

		Ok(CreateOutcome { collection, created: true, parent_flipped })
	}

	fn insert_chunks(
		&mut self,
		path: &CollectionPath,
		records: &[StoredChunkRecord],
	) -> Result<u64> {
		let Some(collection) = self.collections.get(path) else {
			return Err(Error::NotFound(format!("Collection {path} does not exist.")));
		};

		if !collection.is_leaf {
			return Err(error::not_a_leaf(path));
		}

		let mut batch = BTreeSet::new();

		// Check the whole batch before touching the map so a conflict writes nothing.
		for record in records {
			let key = (record.collection_path.clone(), record.id.clone());

			if !self.collections.contains_key(&record.collection_path) {
				return Err(Error::NotFound(format!(
					"Collection {} does not exist.",
					record.collection_path
				)));
			}
			if record.chunk_index > chunk::MAX_CHUNK_INDEX {
				return Err(Error::InvalidArgument(format!(
					"Chunk {} has index {}, above the storable maximum {}.",
					record.id,
					record.chunk_index,
					chunk::MAX_CHUNK_INDEX
				)));
			}
			if self.chunks.contains_key(&key) || !batch.insert(key) {
				return Err(Error::Conflict(format!(
					"Chunk {} already exists in collection {}.",
					record.id, record.collection_path
				)));
			}
		}

		for record in records {
			let seq = self.next_seq;

			self.next_seq += 1;
			self.chunks.insert(
				(record.collection_path.clone(), record.id.clone()),
				StoredChunk { record: record.clone(), seq },
			);
		}

		Ok(records.len() as u64)
	}

	fn nearest_chunks(&self, query: NearestQuery<'_>) -> Vec<RankedResult> {
		let collections = query.collections.iter().collect::<BTreeSet<_>>();
		let candidates = self
			.chunks
			.values()
			.filter(|chunk| collections.contains(&chunk.record.collection_path))
			.filter(|chunk| query.auth.can_read(&chunk.record.readable_by))
			.map(|chunk| Scored {
				item: &chunk.record,
				score: similarity::cosine_similarity(query.vector, &chunk.record.embedding),
				seq: chunk.seq,
			})
			.collect::<Vec<_>>();

		similarity::top_k(candidates, query.top_k as usize)
			.into_iter()
			.map(|scored| RankedResult { record: scored.item.clone(), score: scored.score })
			.collect()
	}

	fn delete_collection(&mut self, path: &CollectionPath) -> u64 {
		let doomed =
			|candidate: &CollectionPath| candidate == path || candidate.is_descendant_of(path);
		let before = self.collections.len();

		self.collections.retain(|candidate, _| !doomed(candidate));
		self.chunks.retain(|(candidate, _), _| !doomed(candidate));

		(before - self.collections.len()) as u64
	}

	fn document_chunks(&self, path: &CollectionPath, document_id: &str) -> Vec<&StoredChunk> {
		let mut matched = self
			.chunks
			.values()
			.filter(|chunk| {
				&chunk.record.collection_path == path && chunk.record.document_id == document_id
			})
			.collect::<Vec<_>>();

		matched.sort_by_key(|chunk| (chunk.record.chunk_index, chunk.seq));

		matched
	}
}

#[derive(Debug)]
struct StoredChunk {
	record: StoredChunkRecord,
	seq: u64,
}

impl Store for MemoryStore {
	fn vector_dim(&self) -> u32 {
		self.vector_dim
	}

	fn initialize_schema(&self) -> BoxFuture<'_, Result<()>> {
		let mut guard = self.write();

		if guard.is_none() {
			*guard = Some(MemoryState::default());
		}

		Box::pin(future::ready(Ok(())))
	}

	fn drop_schema(&self) -> BoxFuture<'_, Result<()>> {
		*self.write() = None;

		Box::pin(future::ready(Ok(())))
	}

	fn schema_state(&self) -> BoxFuture<'_, Result<SchemaState>> {
		let state =
			if self.read().is_some() { SchemaState::Ready } else { SchemaState::Uninitialized };

		Box::pin(future::ready(Ok(state)))
	}

	fn get_or_create_principal<'a>(
		&'a self,
		external: &'a ExternalPrincipal,
	) -> BoxFuture<'a, Result<PrincipalId>> {
		let result = self.with_state_mut(|state| {
			let key = external.external_key();

			if let Some(id) = state.principal_ids.get(&key) {
				return Ok(*id);
			}

			let id = state.allocate_principal(external.kind())?;

			state.principal_ids.insert(key, id);
			state.principals.insert(id, external.clone());

			Ok(id)
		});

		Box::pin(future::ready(result))
	}

	fn lookup_principal<'a>(
		&'a self,
		external: &'a ExternalPrincipal,
	) -> BoxFuture<'a, Result<Option<PrincipalId>>> {
		let result =
			self.with_state(|state| Ok(state.principal_ids.get(&external.external_key()).copied()));

		Box::pin(future::ready(result))
	}

	fn describe_principal(
		&self,
		id: PrincipalId,
	) -> BoxFuture<'_, Result<Option<ExternalPrincipal>>> {
		let result = self.with_state(|state| Ok(state.principals.get(&id).cloned()));

		Box::pin(future::ready(result))
	}

	fn create_collection<'a>(
		&'a self,
		config: &'a CollectionConfig,
		mode: CreateMode,
	) -> BoxFuture<'a, Result<CreateOutcome>> {
		let result = self.with_state_mut(|state| state.create_collection(config, mode));

		Box::pin(future::ready(result))
	}

	fn get_collection<'a>(
		&'a self,
		path: &'a CollectionPath,
	) -> BoxFuture<'a, Result<Option<Collection>>> {
		let result = self.with_state(|state| Ok(state.collections.get(path).cloned()));

		Box::pin(future::ready(result))
	}

	fn list_collections<'a>(
		&'a self,
		pattern: &'a CollectionPattern,
	) -> BoxFuture<'a, Result<Vec<Collection>>> {
		// `CollectionPath` orders by its string, which is byte-lexical like `COLLATE "C"`.
		let result = self.with_state(|state| {
			Ok(state
				.collections
				.values()
				.filter(|collection| pattern.matches(&collection.path))
				.cloned()
				.collect())
		});

		Box::pin(future::ready(result))
	}

	fn set_collection_acl<'a>(
		&'a self,
		path: &'a CollectionPath,
		queryable_by: &'a BTreeSet<PrincipalId>,
	) -> BoxFuture<'a, Result<Option<Collection>>> {
		let result = self.with_state_mut(|state| {
			Ok(state.collections.get_mut(path).map(|collection| {
				collection.queryable_by = queryable_by.clone();

				collection.clone()
			}))
		});

		Box::pin(future::ready(result))
	}

	fn delete_collection<'a>(&'a self, path: &'a CollectionPath) -> BoxFuture<'a, Result<u64>> {
		let result = self.with_state_mut(|state| Ok(state.delete_collection(path)));

		Box::pin(future::ready(result))
	}

	fn insert_chunks<'a>(
		&'a self,
		path: &'a CollectionPath,
		records: &'a [StoredChunkRecord],
	) -> BoxFuture<'a, Result<u64>> {
		let result = self.with_state_mut(|state| state.insert_chunks(path, records));

		Box::pin(future::ready(result))
	}

	fn nearest_chunks<'a>(
		&'a self,
		query: NearestQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<RankedResult>>> {
		let result = self.with_state(|state| Ok(state.nearest_chunks(query)));

		Box::pin(future::ready(result))
	}

	fn delete_document<'a>(
		&'a self,
		path: &'a CollectionPath,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<u64>> {
		let result = self.with_state_mut(|state| {
			let before = state.chunks.len();

			state.chunks.retain(|(candidate, _), chunk| {
				candidate != path || chunk.record.document_id != document_id
			});

			Ok((before - state.chunks.len()) as u64)
		});

		Box::pin(future::ready(result))
	}

	fn document_chunks<'a>(
		&'a self,
		path: &'a CollectionPath,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<StoredChunkRecord>>> {
		let result = self.with_state(|state| {
			Ok(state
				.document_chunks(path, document_id)
				.into_iter()
				.map(|chunk| chunk.record.clone())
				.collect())
		});

		Box::pin(future::ready(result))
	}
}
