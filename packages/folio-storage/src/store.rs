use std::{collections::BTreeSet, future::Future, pin::Pin};

use folio_domain::{
	Collection, CollectionConfig, CollectionPath, CollectionPattern, ExternalPrincipal,
	PrincipalId, RankedResult, StoredChunkRecord, UserAuthorization,
};

use crate::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
	Uninitialized,
	Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateMode {
	/// An existing path is a conflict.
	FailIfExists,
	/// An existing path is returned unchanged.
	ReturnExisting,
}

#[derive(Clone, Debug)]
pub struct CreateOutcome {
	pub collection: Collection,
	pub created: bool,
	/// The parent existed as a leaf and was turned into an interior collection.
	pub parent_flipped: bool,
}

/// Similarity search restricted to a resolved collection set and to the chunks the caller may
/// read.
#[derive(Clone, Copy, Debug)]
pub struct NearestQuery<'a> {
	pub collections: &'a [CollectionPath],
	pub auth: &'a UserAuthorization,
	pub vector: &'a [f32],
	pub top_k: u32,
}

/// Vector-capable persistence behind the principal directory, collection catalog, and chunk
/// store.
///
/// Inputs reaching a store are already validated. Implementations must provide:
/// - one transaction per `insert_chunks` call, so a document is never visible half-written;
/// - serialized parent leaf flips when siblings are created concurrently;
/// - nearest-neighbor ranking by cosine similarity, ties broken by insertion order.
pub trait Store
where
	Self: Send + Sync,
{
	fn vector_dim(&self) -> u32;

	fn initialize_schema(&self) -> BoxFuture<'_, Result<()>>;

	fn drop_schema(&self) -> BoxFuture<'_, Result<()>>;

	fn schema_state(&self) -> BoxFuture<'_, Result<SchemaState>>;

	fn get_or_create_principal<'a>(
		&'a self,
		external: &'a ExternalPrincipal,
	) -> BoxFuture<'a, Result<PrincipalId>>;

	fn lookup_principal<'a>(
		&'a self,
		external: &'a ExternalPrincipal,
	) -> BoxFuture<'a, Result<Option<PrincipalId>>>;

	fn describe_principal(
		&self,
		id: PrincipalId,
	) -> BoxFuture<'_, Result<Option<ExternalPrincipal>>>;

	fn create_collection<'a>(
		&'a self,
		config: &'a CollectionConfig,
		mode: CreateMode,
	) -> BoxFuture<'a, Result<CreateOutcome>>;

	fn get_collection<'a>(
		&'a self,
		path: &'a CollectionPath,
	) -> BoxFuture<'a, Result<Option<Collection>>>;

	/// Ordered by path, byte-lexically.
	fn list_collections<'a>(
		&'a self,
		pattern: &'a CollectionPattern,
	) -> BoxFuture<'a, Result<Vec<Collection>>>;

	fn set_collection_acl<'a>(
		&'a self,
		path: &'a CollectionPath,
		queryable_by: &'a BTreeSet<PrincipalId>,
	) -> BoxFuture<'a, Result<Option<Collection>>>;

	/// Removes the collection, its descendants, and their chunks.
	fn delete_collection<'a>(&'a self, path: &'a CollectionPath) -> BoxFuture<'a, Result<u64>>;

	fn insert_chunks<'a>(
		&'a self,
		path: &'a CollectionPath,
		records: &'a [StoredChunkRecord],
	) -> BoxFuture<'a, Result<u64>>;

	fn nearest_chunks<'a>(
		&'a self,
		query: NearestQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<RankedResult>>>;

	fn delete_document<'a>(
		&'a self,
		path: &'a CollectionPath,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<u64>>;

	/// Ordered by chunk index.
	fn document_chunks<'a>(
		&'a self,
		path: &'a CollectionPath,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<StoredChunkRecord>>>;
}
