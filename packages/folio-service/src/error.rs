pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<folio_storage::Error> for Error {
	fn from(err: folio_storage::Error) -> Self {
		match err {
			folio_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			folio_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			folio_storage::Error::NotFound(message) => Self::NotFound { message },
			folio_storage::Error::Conflict(message) => Self::Conflict { message },
			err @ folio_storage::Error::Uninitialized =>
				Self::Storage { message: err.to_string() },
			folio_storage::Error::Decode(message) => Self::Storage { message },
		}
	}
}

impl From<folio_domain::Error> for Error {
	fn from(err: folio_domain::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
