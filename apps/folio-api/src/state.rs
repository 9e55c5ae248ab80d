use std::sync::Arc;

use color_eyre::eyre;

use folio_config::{Config, StorageBackend};
use folio_service::FolioService;
use folio_storage::{Store, db::Db, memory::MemoryStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<FolioService>,
}
impl AppState {
	/// Opens the configured backend and makes sure its schema exists before serving.
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let vector_dim = config.storage.vector_dim;
		let store: Arc<dyn Store> = match config.storage.backend {
			StorageBackend::Postgres => {
				let postgres = config.storage.postgres.as_ref().ok_or_else(|| {
					eyre::eyre!("storage.postgres is required when storage.backend is postgres.")
				})?;

				Arc::new(Db::connect(postgres, vector_dim).await?)
			},
			StorageBackend::Memory => Arc::new(MemoryStore::new(vector_dim)),
		};
		let service = FolioService::new(config, store);

		service.initialize_schema().await?;

		Ok(Self { service: Arc::new(service) })
	}

	pub fn api_auth_token(&self) -> Option<&str> {
		self.service.cfg.security.api_auth_token.as_deref()
	}
}
