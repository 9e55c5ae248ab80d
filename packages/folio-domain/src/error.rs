pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Invalid collection path {path:?}: {reason}.")]
	InvalidCollectionPath { path: String, reason: &'static str },
	#[error("Invalid principal: {message}")]
	InvalidPrincipal { message: String },
	#[error("Invalid principal id {value}.")]
	InvalidPrincipalId { value: i64 },
	#[error("Invalid document id {document_id:?}: {reason}.")]
	InvalidDocumentId { document_id: String, reason: &'static str },
	#[error("Invalid chunk index {chunk_index}: must be at most {max}.")]
	InvalidChunkIndex { chunk_index: u32, max: u32 },
	#[error("Invalid embedding: {message}")]
	InvalidEmbedding { message: String },
}
