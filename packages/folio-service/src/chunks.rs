use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use folio_domain::{
	ChunkWithEmbedding, CollectionPath, PrincipalId, StoredChunkRecord, UserAuthorization, chunk,
	similarity,
};

use crate::{Error, FolioService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestRequest {
	pub collection_path: CollectionPath,
	pub document_id: String,
	pub chunks: Vec<ChunkWithEmbedding>,
	#[serde(default)]
	pub metadata: BTreeMap<String, String>,
	/// Empty means every caller who may query the collection may read the document.
	#[serde(default)]
	pub readable_by: BTreeSet<PrincipalId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestResponse {
	pub written: u64,
}

impl FolioService {
	/// Writes one record per chunk in a single transaction and returns the count written.
	///
	/// The collection must already exist and be a leaf; interior collections only hold
	/// sub-collections. Chunk ids that are already present fail the whole call with `Conflict`;
	/// replacing a document means deleting it first.
	pub async fn ingest(&self, req: IngestRequest) -> Result<u64> {
		chunk::validate_document_id(&req.document_id)?;

		let vector_dim = self.store.vector_dim();
		let mut indexes = BTreeSet::new();

		for input in &req.chunks {
			if !indexes.insert(input.chunk_index) {
				return Err(Error::InvalidRequest {
					message: format!(
						"chunk_index {} appears more than once in document {}.",
						input.chunk_index, req.document_id
					),
				});
			}

			chunk::validate_chunk_index(input.chunk_index)?;
			similarity::validate_vector(
				&input.embedding,
				vector_dim,
				&format!("Embedding of chunk {}", input.chunk_index),
			)?;
		}

		let now = OffsetDateTime::now_utc();
		let records = req
			.chunks
			.into_iter()
			.map(|input| StoredChunkRecord {
				id: chunk::chunk_id(&req.document_id, input.chunk_index),
				collection_path: req.collection_path.clone(),
				document_id: req.document_id.clone(),
				chunk_index: input.chunk_index,
				content: input.content,
				embedding: input.embedding,
				metadata: req.metadata.clone(),
				readable_by: req.readable_by.clone(),
				created_at: now,
			})
			.collect::<Vec<_>>();
		let written = self.store.insert_chunks(&req.collection_path, &records).await?;

		tracing::info!(
			collection = %req.collection_path,
			document_id = %req.document_id,
			written,
			restricted = !req.readable_by.is_empty(),
			"Chunks ingested."
		);

		Ok(written)
	}

	/// Removes every chunk of the document in that collection. Nothing matched is 0, not an error.
	pub async fn delete_document(
		&self,
		collection_path: &CollectionPath,
		document_id: &str,
	) -> Result<u64> {
		chunk::validate_document_id(document_id)?;

		let removed = self.store.delete_document(collection_path, document_id).await?;

		tracing::info!(collection = %collection_path, document_id, removed, "Document deleted.");

		Ok(removed)
	}

	/// The document's chunks in `chunk_index` order, limited to what `auth` may read.
	///
	/// An inaccessible or missing collection yields an empty list, like an empty query.
	pub async fn document_chunks(
		&self,
		auth: &UserAuthorization,
		collection_path: &CollectionPath,
		document_id: &str,
	) -> Result<Vec<StoredChunkRecord>> {
		chunk::validate_document_id(document_id)?;

		let Some(collection) = self.store.get_collection(collection_path).await? else {
			return Ok(Vec::new());
		};

		if !auth.can_query(&collection) {
			return Ok(Vec::new());
		}

		let mut records = self.store.document_chunks(collection_path, document_id).await?;

		records.retain(|record| auth.can_read(&record.readable_by));

		Ok(records)
	}
}
