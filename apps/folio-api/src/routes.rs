use std::collections::BTreeSet;

use axum::{
	Json, Router,
	extract::{Request, State, rejection::JsonRejection},
	http::{HeaderMap, StatusCode, header},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use cmov::Cmov;
use serde::{Deserialize, Serialize};

use folio_domain::{
	Collection, CollectionConfig, CollectionPath, CollectionPattern, ExternalPrincipal,
	PrincipalId, StoredChunkRecord, UserAuthorization,
};
use folio_service::{
	Error as ServiceError, IngestRequest, IngestResponse, QueryRequest, QueryResponse,
	ResolvedPrincipal,
};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolvePrincipalsRequest {
	pub principals: Vec<ExternalPrincipal>,
}

#[derive(Debug, Serialize)]
pub struct ResolvePrincipalsResponse {
	/// One entry per input item, in input order.
	pub principals: Vec<ResolvedPrincipal>,
}

#[derive(Debug, Deserialize)]
pub struct LookupPrincipalRequest {
	pub principal: ExternalPrincipal,
}

#[derive(Debug, Serialize)]
pub struct LookupPrincipalResponse {
	pub principal_id: Option<PrincipalId>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionPathRequest {
	pub path: CollectionPath,
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
	pub collection: Collection,
}

#[derive(Debug, Serialize)]
pub struct MaybeCollectionResponse {
	pub collection: Option<Collection>,
}

#[derive(Debug, Deserialize)]
pub struct ListCollectionsRequest {
	pub pattern: CollectionPattern,
}

#[derive(Debug, Deserialize)]
pub struct AccessibleCollectionsRequest {
	pub auth: UserAuthorization,
	pub pattern: CollectionPattern,
}

#[derive(Debug, Serialize)]
pub struct CollectionsResponse {
	pub collections: Vec<Collection>,
}

#[derive(Debug, Deserialize)]
pub struct SetAclRequest {
	pub path: CollectionPath,
	#[serde(default)]
	pub queryable_by: BTreeSet<PrincipalId>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
	pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDocumentRequest {
	pub collection_path: CollectionPath,
	pub document_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentChunksRequest {
	pub auth: UserAuthorization,
	pub collection_path: CollectionPath,
	pub document_id: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentChunksResponse {
	pub chunks: Vec<StoredChunkRecord>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message),
			ServiceError::Conflict { message } =>
				json_error(StatusCode::CONFLICT, "conflict", message),
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage operation failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
			},
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/v1/principals/resolve", post(resolve_principals))
		.route("/v1/principals/lookup", post(lookup_principal))
		.route("/v1/collections", post(create_collection))
		.route("/v1/collections/ensure", post(ensure_collection))
		.route("/v1/collections/get", post(get_collection))
		.route("/v1/collections/list", post(list_collections))
		.route("/v1/collections/accessible", post(accessible_collections))
		.route("/v1/collections/acl", post(set_collection_acl))
		.route("/v1/collections/delete", post(delete_collection))
		.route("/v1/chunks/ingest", post(ingest))
		.route("/v1/chunks/query", post(query))
		.route("/v1/documents/delete", post(delete_document))
		.route("/v1/documents/chunks", post(document_chunks))
		.route_layer(middleware::from_fn_with_state(state.clone(), require_bearer))
		.route("/health", get(health))
		.with_state(state)
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn resolve_principals(
	State(state): State<AppState>,
	payload: Result<Json<ResolvePrincipalsRequest>, JsonRejection>,
) -> Result<Json<ResolvePrincipalsResponse>, ApiError> {
	let Json(payload) = payload?;
	let resolved = state.service.get_or_create_principals(&payload.principals).await?;
	let mut principals = Vec::with_capacity(payload.principals.len());

	for principal in payload.principals {
		let Some(principal_id) = resolved.get(&principal).copied() else {
			return Err(json_error(
				StatusCode::INTERNAL_SERVER_ERROR,
				"storage_error",
				format!("Principal {principal} was not resolved."),
			));
		};

		principals.push(ResolvedPrincipal { principal, principal_id });
	}

	Ok(Json(ResolvePrincipalsResponse { principals }))
}

async fn lookup_principal(
	State(state): State<AppState>,
	payload: Result<Json<LookupPrincipalRequest>, JsonRejection>,
) -> Result<Json<LookupPrincipalResponse>, ApiError> {
	let Json(payload) = payload?;
	let principal_id = state.service.lookup_principal(&payload.principal).await?;

	Ok(Json(LookupPrincipalResponse { principal_id }))
}

async fn create_collection(
	State(state): State<AppState>,
	payload: Result<Json<CollectionConfig>, JsonRejection>,
) -> Result<Json<CollectionResponse>, ApiError> {
	let Json(config) = payload?;
	let collection = state.service.create_collection(&config).await?;

	Ok(Json(CollectionResponse { collection }))
}

async fn ensure_collection(
	State(state): State<AppState>,
	payload: Result<Json<CollectionConfig>, JsonRejection>,
) -> Result<Json<CollectionResponse>, ApiError> {
	let Json(config) = payload?;
	let collection = state.service.ensure_collection(&config).await?;

	Ok(Json(CollectionResponse { collection }))
}

async fn get_collection(
	State(state): State<AppState>,
	payload: Result<Json<CollectionPathRequest>, JsonRejection>,
) -> Result<Json<MaybeCollectionResponse>, ApiError> {
	let Json(payload) = payload?;
	let collection = state.service.get_collection(&payload.path).await?;

	Ok(Json(MaybeCollectionResponse { collection }))
}

async fn list_collections(
	State(state): State<AppState>,
	payload: Result<Json<ListCollectionsRequest>, JsonRejection>,
) -> Result<Json<CollectionsResponse>, ApiError> {
	let Json(payload) = payload?;
	let collections = state.service.list_collections(&payload.pattern).await?;

	Ok(Json(CollectionsResponse { collections }))
}

async fn accessible_collections(
	State(state): State<AppState>,
	payload: Result<Json<AccessibleCollectionsRequest>, JsonRejection>,
) -> Result<Json<CollectionsResponse>, ApiError> {
	let Json(payload) = payload?;
	let collections =
		state.service.find_accessible_collections(&payload.auth, &payload.pattern).await?;

	Ok(Json(CollectionsResponse { collections }))
}

async fn set_collection_acl(
	State(state): State<AppState>,
	payload: Result<Json<SetAclRequest>, JsonRejection>,
) -> Result<Json<CollectionResponse>, ApiError> {
	let Json(payload) = payload?;
	let collection = state.service.set_queryable_by(&payload.path, &payload.queryable_by).await?;

	Ok(Json(CollectionResponse { collection }))
}

async fn delete_collection(
	State(state): State<AppState>,
	payload: Result<Json<CollectionPathRequest>, JsonRejection>,
) -> Result<Json<RemovedResponse>, ApiError> {
	let Json(payload) = payload?;
	let removed = state.service.delete_collection(&payload.path).await?;

	Ok(Json(RemovedResponse { removed }))
}

async fn ingest(
	State(state): State<AppState>,
	payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
	let Json(payload) = payload?;
	let written = state.service.ingest(payload).await?;

	Ok(Json(IngestResponse { written }))
}

async fn query(
	State(state): State<AppState>,
	payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
	let Json(payload) = payload?;
	let results = state.service.query(payload).await?;

	Ok(Json(QueryResponse { results }))
}

async fn delete_document(
	State(state): State<AppState>,
	payload: Result<Json<DeleteDocumentRequest>, JsonRejection>,
) -> Result<Json<RemovedResponse>, ApiError> {
	let Json(payload) = payload?;
	let removed =
		state.service.delete_document(&payload.collection_path, &payload.document_id).await?;

	Ok(Json(RemovedResponse { removed }))
}

async fn document_chunks(
	State(state): State<AppState>,
	payload: Result<Json<DocumentChunksRequest>, JsonRejection>,
) -> Result<Json<DocumentChunksResponse>, ApiError> {
	let Json(payload) = payload?;
	let chunks = state
		.service
		.document_chunks(&payload.auth, &payload.collection_path, &payload.document_id)
		.await?;

	Ok(Json(DocumentChunksResponse { chunks }))
}

async fn require_bearer(State(state): State<AppState>, req: Request, next: Next) -> Response {
	let Some(expected) = state.api_auth_token() else {
		return next.run(req).await;
	};

	if !read_bearer_token(req.headers()).is_some_and(|token| tokens_match(token, expected)) {
		return json_error(
			StatusCode::UNAUTHORIZED,
			"unauthorized",
			"A valid Authorization: Bearer token is required.",
		)
		.into_response();
	}

	next.run(req).await
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(header::AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

/// Compares every byte regardless of where the first mismatch sits. Only the length leaks.
fn tokens_match(candidate: &str, expected: &str) -> bool {
	let (candidate, expected) = (candidate.as_bytes(), expected.as_bytes());

	if candidate.len() != expected.len() {
		return false;
	}

	let mut equal = 1u8;

	candidate.iter().zip(expected).for_each(|(a, b)| equal.cmovnz(&0u8, a ^ b));

	equal != 0
}
