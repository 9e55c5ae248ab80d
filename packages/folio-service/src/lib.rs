pub mod chunks;
pub mod collections;
pub mod principals;
pub mod query;
pub mod schema;

mod error;

pub use chunks::{IngestRequest, IngestResponse};
pub use error::{Error, Result};
pub use principals::ResolvedPrincipal;
pub use query::{QueryRequest, QueryResponse};

use std::sync::Arc;

use folio_config::Config;
use folio_storage::Store;

/// Principal directory, collection catalog, chunk store, and schema manager over one backend.
///
/// Stateless apart from the shared store handle, so one instance serves every request.
#[derive(Clone)]
pub struct FolioService {
	pub cfg: Config,
	pub store: Arc<dyn Store>,
}
impl FolioService {
	pub fn new(cfg: Config, store: Arc<dyn Store>) -> Self {
		Self { cfg, store }
	}
}
