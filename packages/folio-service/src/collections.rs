use std::collections::BTreeSet;

use folio_domain::{
	Collection, CollectionConfig, CollectionPath, CollectionPattern, PrincipalId,
	UserAuthorization,
};
use folio_storage::{CreateMode, CreateOutcome};

use crate::{Error, FolioService, Result};

impl FolioService {
	/// Fails with `Conflict` when the path is taken. A leaf parent becomes interior in the same
	/// write.
	pub async fn create_collection(&self, config: &CollectionConfig) -> Result<Collection> {
		let outcome = self.store.create_collection(config, CreateMode::FailIfExists).await?;

		Ok(log_outcome(outcome))
	}

	/// Create-if-absent. An existing collection is returned as stored, ACL included.
	pub async fn ensure_collection(&self, config: &CollectionConfig) -> Result<Collection> {
		let outcome = self.store.create_collection(config, CreateMode::ReturnExisting).await?;

		Ok(log_outcome(outcome))
	}

	pub async fn get_collection(&self, path: &CollectionPath) -> Result<Option<Collection>> {
		Ok(self.store.get_collection(path).await?)
	}

	pub async fn list_collections(&self, pattern: &CollectionPattern) -> Result<Vec<Collection>> {
		Ok(self.store.list_collections(pattern).await?)
	}

	/// Collections matched by `pattern` that `auth` may query, in path order.
	pub async fn find_accessible_collections(
		&self,
		auth: &UserAuthorization,
		pattern: &CollectionPattern,
	) -> Result<Vec<Collection>> {
		let mut collections = self.store.list_collections(pattern).await?;

		collections.retain(|collection| auth.can_query(collection));

		Ok(collections)
	}

	/// Replaces the query ACL. An empty set makes the collection public.
	pub async fn set_queryable_by(
		&self,
		path: &CollectionPath,
		queryable_by: &BTreeSet<PrincipalId>,
	) -> Result<Collection> {
		let collection =
			self.store.set_collection_acl(path, queryable_by).await?.ok_or_else(|| {
				Error::NotFound { message: format!("Collection {path} does not exist.") }
			})?;

		tracing::info!(
			collection = %path,
			principals = queryable_by.len(),
			"Collection ACL replaced."
		);

		Ok(collection)
	}

	/// Removes the collection, every descendant, and their chunks. Returns the number of
	/// collections removed.
	pub async fn delete_collection(&self, path: &CollectionPath) -> Result<u64> {
		let removed = self.store.delete_collection(path).await?;

		if removed > 0 {
			tracing::info!(collection = %path, removed, "Collection tree deleted.");
		}

		Ok(removed)
	}
}

fn log_outcome(outcome: CreateOutcome) -> Collection {
	let collection = outcome.collection;

	if outcome.created {
		tracing::info!(
			collection = %collection.path,
			is_leaf = collection.is_leaf,
			public = collection.is_public(),
			"Collection created."
		);
	}
	if outcome.parent_flipped
		&& let Some(parent) = collection.parent_path()
	{
		tracing::info!(collection = %parent, "Parent collection is no longer a leaf.");
	}

	collection
}
