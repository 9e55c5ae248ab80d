use sqlx::{PgExecutor, Postgres, Transaction, types::Json};

use folio_domain::{CollectionPath, RankedResult, StoredChunkRecord, UserAuthorization, acl};

use crate::{
	Error, NearestQuery, Result, error,
	models::{ChunkRow, RankedChunkRow},
	vector,
};

const CHUNK_COLUMNS: &str = "\
collection_path,
\tchunk_id,
\tdocument_id,
\tchunk_index,
\tcontent,
\tembedding::text AS embedding_text,
\tmetadata,
\treadable_by,
\tcreated_at";

/// Writes every record inside `tx`. The collection row is share-locked first so it cannot be
/// deleted or flipped to interior while the document is being written.
pub async fn insert_chunks_tx(
	tx: &mut Transaction<'_, Postgres>,
	path: &CollectionPath,
	records: &[StoredChunkRecord],
) -> Result<u64> {
	let is_leaf: Option<bool> =
		sqlx::query_scalar("SELECT is_leaf FROM collections WHERE path = $1 FOR SHARE")
			.bind(path.as_str())
			.fetch_optional(&mut **tx)
			.await?;

	let Some(is_leaf) = is_leaf else {
		return Err(Error::NotFound(format!("Collection {path} does not exist.")));
	};

	if !is_leaf {
		return Err(error::not_a_leaf(path));
	}

	for record in records {
		insert_chunk(&mut **tx, record).await?;
	}

	Ok(records.len() as u64)
}

pub async fn insert_chunk<'e, E>(executor: E, record: &StoredChunkRecord) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let chunk_index = i32::try_from(record.chunk_index).map_err(|_| {
		Error::InvalidArgument(format!(
			"Chunk {} has index {}, above the storable maximum {}.",
			record.id,
			record.chunk_index,
			i32::MAX
		))
	})?;

	sqlx::query(
		"\
INSERT INTO chunks (
\tcollection_path,
\tchunk_id,
\tdocument_id,
\tchunk_index,
\tcontent,
\tembedding,
\tmetadata,
\treadable_by,
\tcreated_at
)
VALUES ($1, $2, $3, $4, $5, $6::text::vector, $7, $8, $9)",
	)
	.bind(record.collection_path.as_str())
	.bind(record.id.as_str())
	.bind(record.document_id.as_str())
	.bind(chunk_index)
	.bind(record.content.as_str())
	.bind(vector::format_vector_text(&record.embedding))
	.bind(Json(&record.metadata))
	.bind(acl::signed_ids(&record.readable_by))
	.bind(record.created_at)
	.execute(executor)
	.await
	.map_err(|err| {
		if error::is_unique_violation(&err) {
			Error::Conflict(format!(
				"Chunk {} already exists in collection {}.",
				record.id, record.collection_path
			))
		} else if error::is_foreign_key_violation(&err) {
			Error::NotFound(format!("Collection {} does not exist.", record.collection_path))
		} else {
			Error::Sqlx(err)
		}
	})?;

	Ok(())
}

/// Ranks readable chunks in `query.collections` by cosine similarity.
///
/// Ordering by distance and then `seq` keeps ties in insertion order. The access filter runs in
/// the same statement, so chunks the caller cannot read never compete for a `top_k` slot.
///
/// The scan is exact. An HNSW index scan stops after `hnsw.ef_search` candidates and filters
/// afterwards, which can drop readable chunks that rank below unreadable ones.
pub async fn nearest_chunks_tx(
	tx: &mut Transaction<'_, Postgres>,
	query: NearestQuery<'_>,
) -> Result<Vec<RankedResult>> {
	sqlx::query("SET LOCAL enable_indexscan = off").execute(&mut **tx).await?;

	nearest_chunks(&mut **tx, query).await
}

pub async fn nearest_chunks<'e, E>(
	executor: E,
	query: NearestQuery<'_>,
) -> Result<Vec<RankedResult>>
where
	E: PgExecutor<'e>,
{
	let paths = query.collections.iter().map(|path| path.as_str()).collect::<Vec<_>>();
	let (is_admin, held) = match query.auth {
		UserAuthorization::Admin => (true, Vec::new()),
		UserAuthorization::Principals(ids) => (false, acl::signed_ids(ids)),
	};
	let rows = sqlx::query_as::<_, RankedChunkRow>(&format!(
		"\
SELECT
\t{CHUNK_COLUMNS},
\t(1 - (embedding <=> $1::text::vector))::float8 AS score
FROM chunks
WHERE collection_path = ANY($2)
\tAND ($3 OR cardinality(readable_by) = 0 OR readable_by && $4)
ORDER BY embedding <=> $1::text::vector ASC, seq ASC
LIMIT $5"
	))
	.bind(vector::format_vector_text(query.vector))
	.bind(paths)
	.bind(is_admin)
	.bind(held)
	.bind(i64::from(query.top_k))
	.fetch_all(executor)
	.await?;

	rows.into_iter().map(RankedResult::try_from).collect()
}

pub async fn delete_document<'e, E>(
	executor: E,
	path: &CollectionPath,
	document_id: &str,
) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM chunks WHERE collection_path = $1 AND document_id = $2")
		.bind(path.as_str())
		.bind(document_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn list_document_chunks<'e, E>(
	executor: E,
	path: &CollectionPath,
	document_id: &str,
) -> Result<Vec<StoredChunkRecord>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, ChunkRow>(&format!(
		"\
SELECT
\t{CHUNK_COLUMNS}
FROM chunks
WHERE collection_path = $1 AND document_id = $2
ORDER BY chunk_index ASC, seq ASC"
	))
	.bind(path.as_str())
	.bind(document_id)
	.fetch_all(executor)
	.await?;

	rows.into_iter().map(StoredChunkRecord::try_from).collect()
}
