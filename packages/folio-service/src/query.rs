use serde::{Deserialize, Serialize};

use folio_domain::{CollectionPattern, RankedResult, UserAuthorization, similarity};
use folio_storage::NearestQuery;

use crate::{Error, FolioService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRequest {
	pub auth: UserAuthorization,
	pub pattern: CollectionPattern,
	pub vector: Vec<f32>,
	pub top_k: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResponse {
	pub results: Vec<RankedResult>,
}

impl FolioService {
	/// Permission-filtered nearest-neighbor search.
	///
	/// Collections are resolved through `find_accessible_collections` first. Chunk-level ACLs
	/// are applied before ranking, so hidden chunks never take a `top_k` slot. Results are
	/// ordered by cosine similarity descending, with ties kept in insertion order. No accessible
	/// collection is an empty result, not an error.
	pub async fn query(&self, req: QueryRequest) -> Result<Vec<RankedResult>> {
		let max_top_k = self.cfg.query.max_top_k;

		if req.top_k == 0 || req.top_k > max_top_k {
			return Err(Error::InvalidRequest {
				message: format!("top_k must be between 1 and {max_top_k}, got {}.", req.top_k),
			});
		}

		similarity::validate_vector(&req.vector, self.store.vector_dim(), "Query vector")?;

		let collections = self.find_accessible_collections(&req.auth, &req.pattern).await?;

		if collections.is_empty() {
			tracing::debug!(pattern = ?req.pattern, "No accessible collections for query.");

			return Ok(Vec::new());
		}

		let paths = collections.into_iter().map(|collection| collection.path).collect::<Vec<_>>();
		let results = self
			.store
			.nearest_chunks(NearestQuery {
				collections: &paths,
				auth: &req.auth,
				vector: &req.vector,
				top_k: req.top_k,
			})
			.await?;

		tracing::debug!(
			collections = paths.len(),
			results = results.len(),
			top_k = req.top_k,
			"Query ranked."
		);

		Ok(results)
	}
}
