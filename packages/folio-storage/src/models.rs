use std::collections::{BTreeMap, BTreeSet};

use sqlx::types::Json;
use time::OffsetDateTime;

use folio_domain::{
	Collection, CollectionPath, ExternalPrincipal, PrincipalId, RankedResult, StoredChunkRecord,
};

use crate::{Error, Result, vector};

#[derive(Debug, sqlx::FromRow)]
pub struct PrincipalRow {
	pub principal_id: i64,
	pub kind: String,
	pub external_key: String,
}
impl PrincipalRow {
	pub fn into_principal(self) -> Result<(PrincipalId, ExternalPrincipal)> {
		let id = decode_principal_id(self.principal_id)?;
		let external = ExternalPrincipal::from_external_key(&self.external_key)?;

		if id.kind().as_str() != self.kind || external.kind() != id.kind() {
			return Err(Error::Decode(format!(
				"Principal {} has kind {} but key {}.",
				self.principal_id, self.kind, self.external_key
			)));
		}

		Ok((id, external))
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct CollectionRow {
	pub path: String,
	pub parent_path: Option<String>,
	pub is_leaf: bool,
	pub queryable_by: Vec<i64>,
	pub created_at: OffsetDateTime,
}
impl TryFrom<CollectionRow> for Collection {
	type Error = Error;

	fn try_from(row: CollectionRow) -> Result<Self> {
		let path = CollectionPath::parse(&row.path)?;

		if path.parent().as_ref().map(CollectionPath::as_str) != row.parent_path.as_deref() {
			return Err(Error::Decode(format!(
				"Collection {} has a stale parent_path {:?}.",
				row.path, row.parent_path
			)));
		}

		Ok(Self {
			path,
			queryable_by: decode_principal_ids(&row.queryable_by)?,
			is_leaf: row.is_leaf,
			created_at: row.created_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct ChunkRow {
	pub collection_path: String,
	pub chunk_id: String,
	pub document_id: String,
	pub chunk_index: i32,
	pub content: String,
	pub embedding_text: String,
	pub metadata: Json<BTreeMap<String, String>>,
	pub readable_by: Vec<i64>,
	pub created_at: OffsetDateTime,
}
impl TryFrom<ChunkRow> for StoredChunkRecord {
	type Error = Error;

	fn try_from(row: ChunkRow) -> Result<Self> {
		let chunk_index = u32::try_from(row.chunk_index).map_err(|_| {
			Error::Decode(format!("Chunk {} has a negative index.", row.chunk_id))
		})?;

		Ok(Self {
			id: row.chunk_id,
			collection_path: CollectionPath::parse(&row.collection_path)?,
			document_id: row.document_id,
			chunk_index,
			content: row.content,
			embedding: vector::parse_vector_text(&row.embedding_text)?,
			metadata: row.metadata.0,
			readable_by: decode_principal_ids(&row.readable_by)?,
			created_at: row.created_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct RankedChunkRow {
	#[sqlx(flatten)]
	pub chunk: ChunkRow,
	pub score: f64,
}
impl TryFrom<RankedChunkRow> for RankedResult {
	type Error = Error;

	fn try_from(row: RankedChunkRow) -> Result<Self> {
		Ok(Self { record: row.chunk.try_into()?, score: row.score as f32 })
	}
}

pub fn decode_principal_id(value: i64) -> Result<PrincipalId> {
	PrincipalId::from_signed(value)
		.ok_or_else(|| Error::Decode(format!("Principal id {value} is not a valid id.")))
}

pub fn decode_principal_ids(values: &[i64]) -> Result<BTreeSet<PrincipalId>> {
	values.iter().map(|value| decode_principal_id(*value)).collect()
}
