pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid base DSN: {0}")]
	InvalidDsn(String),
	#[error("No admin database (postgres, template1) accepted a connection: {0}")]
	NoAdminDatabase(String),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Storage(#[from] folio_storage::Error),
}
