use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{CollectionPath, Error, PrincipalId, Result};

pub const MAX_DOCUMENT_ID_CHARS: usize = 512;
/// Largest index the `INTEGER` chunk column holds.
pub const MAX_CHUNK_INDEX: u32 = i32::MAX as u32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkWithEmbedding {
	pub content: String,
	pub embedding: Vec<f32>,
	pub chunk_index: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredChunkRecord {
	pub id: String,
	pub collection_path: CollectionPath,
	pub document_id: String,
	pub chunk_index: u32,
	pub content: String,
	pub embedding: Vec<f32>,
	pub metadata: BTreeMap<String, String>,
	/// Empty means anyone who may query the collection may read the chunk.
	pub readable_by: BTreeSet<PrincipalId>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
	pub record: StoredChunkRecord,
	pub score: f32,
}

pub fn chunk_id(document_id: &str, chunk_index: u32) -> String {
	format!("{document_id}-chunk-{chunk_index}")
}

pub fn validate_document_id(document_id: &str) -> Result<()> {
	let invalid = |reason| Error::InvalidDocumentId { document_id: document_id.to_string(), reason };

	if document_id.trim().is_empty() {
		return Err(invalid("document id must be non-empty"));
	}
	if document_id.chars().count() > MAX_DOCUMENT_ID_CHARS {
		return Err(invalid("document id is too long"));
	}
	if document_id.chars().any(char::is_control) {
		return Err(invalid("document id must not contain control characters"));
	}

	Ok(())
}

pub fn validate_chunk_index(chunk_index: u32) -> Result<()> {
	if chunk_index > MAX_CHUNK_INDEX {
		return Err(Error::InvalidChunkIndex { chunk_index, max: MAX_CHUNK_INDEX });
	}

	Ok(())
}
