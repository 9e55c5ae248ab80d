use folio_storage::SchemaState;

use crate::{FolioService, Result};

impl FolioService {
	/// Creates the principal, collection, and chunk structures when absent. Safe to call
	/// repeatedly and from concurrent processes.
	pub async fn initialize_schema(&self) -> Result<()> {
		self.store.initialize_schema().await?;

		tracing::info!(vector_dim = self.store.vector_dim(), "Schema initialized.");

		Ok(())
	}

	/// Destroys every stored principal, collection, and chunk.
	pub async fn drop_schema(&self) -> Result<()> {
		self.store.drop_schema().await?;

		tracing::info!("Schema dropped.");

		Ok(())
	}

	pub async fn schema_state(&self) -> Result<SchemaState> {
		Ok(self.store.schema_state().await?)
	}
}
