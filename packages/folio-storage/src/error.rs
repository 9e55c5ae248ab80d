#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Schema is not initialized.")]
	Uninitialized,
	#[error("Corrupt row: {0}")]
	Decode(String),
}
impl From<folio_domain::Error> for Error {
	fn from(err: folio_domain::Error) -> Self {
		Self::Decode(err.to_string())
	}
}

pub(crate) fn not_a_leaf(path: &folio_domain::CollectionPath) -> Error {
	Error::InvalidArgument(format!(
		"Collection {path} has sub-collections and cannot hold documents."
	))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
