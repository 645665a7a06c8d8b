pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Retrieval unavailable: {message}")]
	RetrievalUnavailable { message: String },
	#[error("Timed out: {operation}")]
	Timeout { operation: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<chapter_storage::Error> for Error {
	fn from(err: chapter_storage::Error) -> Self {
		match err {
			chapter_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			chapter_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			chapter_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}

impl From<chapter_providers::Error> for Error {
	fn from(err: chapter_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
