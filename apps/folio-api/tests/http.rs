use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use folio_api::{routes, state::AppState};
use folio_config::{Config, Query, Security, Service, Storage, StorageBackend};

fn test_config(api_auth_token: Option<&str>) -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage { backend: StorageBackend::Memory, vector_dim: 3, postgres: None },
		query: Query { max_top_k: 20 },
		security: Security {
			bind_localhost_only: true,
			api_auth_token: api_auth_token.map(str::to_string),
		},
	}
}

async fn app(api_auth_token: Option<&str>) -> Router {
	let state =
		AppState::new(test_config(api_auth_token)).await.expect("Failed to initialize app state.");

	routes::router(state)
}

fn post(uri: &str, payload: &Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.clone().oneshot(request).await.expect("Failed to call route.");
	let status = response.status();
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");
	let json = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Failed to parse response body.")
	};

	(status, json)
}

#[tokio::test]
async fn health_ok() {
	let app = app(None).await;
	let request =
		Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request.");
	let (status, _) = call(&app, request).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn resolve_keeps_input_order_and_reuses_ids() {
	let app = app(None).await;
	let payload = json!({
		"principals": [
			{ "user": "alice@example.com" },
			{ "group": "staff" },
			{ "user": "alice@example.com" }
		]
	});
	let (status, body) = call(&app, post("/v1/principals/resolve", &payload)).await;

	assert_eq!(status, StatusCode::OK);

	let principals = body["principals"].as_array().expect("Expected an array.");

	assert_eq!(principals.len(), 3);
	assert_eq!(principals[0]["principal_id"], principals[2]["principal_id"]);
	assert!(principals[0]["principal_id"].as_i64().expect("Expected an id.") > 0);
	assert!(principals[1]["principal_id"].as_i64().expect("Expected an id.") < 0);

	let (status, body) = call(
		&app,
		post("/v1/principals/lookup", &json!({ "principal": { "group": "nobody" } })),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["principal_id"], Value::Null);
}

#[tokio::test]
async fn create_ingest_and_query_flow() {
	let app = app(None).await;
	let (status, body) = call(&app, post("/v1/collections", &json!({ "path": "docs" }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["collection"]["path"], "docs");
	assert_eq!(body["collection"]["is_leaf"], true);

	let (status, _) =
		call(&app, post("/v1/collections", &json!({ "path": "docs/guides" }))).await;

	assert_eq!(status, StatusCode::OK);

	let (_, body) = call(&app, post("/v1/collections/get", &json!({ "path": "docs" }))).await;

	assert_eq!(body["collection"]["is_leaf"], false);

	let ingest = json!({
		"collection_path": "docs/guides",
		"document_id": "intro",
		"chunks": [
			{ "content": "north", "embedding": [1.0, 0.0, 0.0], "chunk_index": 0 },
			{ "content": "east", "embedding": [0.0, 1.0, 0.0], "chunk_index": 1 }
		]
	});
	let (status, body) = call(&app, post("/v1/chunks/ingest", &ingest)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["written"], 2);

	let query = json!({
		"auth": "admin",
		"pattern": { "kind": "all_descendants", "path": "docs" },
		"vector": [1.0, 0.1, 0.0],
		"top_k": 1
	});
	let (status, body) = call(&app, post("/v1/chunks/query", &query)).await;

	assert_eq!(status, StatusCode::OK);

	let results = body["results"].as_array().expect("Expected an array.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0]["record"]["id"], "intro-chunk-0");

	let (status, body) = call(
		&app,
		post(
			"/v1/documents/chunks",
			&json!({ "auth": "admin", "collection_path": "docs/guides", "document_id": "intro" }),
		),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["chunks"].as_array().map(Vec::len), Some(2));

	let (status, body) = call(
		&app,
		post(
			"/v1/documents/delete",
			&json!({ "collection_path": "docs/guides", "document_id": "intro" }),
		),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["removed"], 2);

	let (status, body) =
		call(&app, post("/v1/collections/delete", &json!({ "path": "docs" }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["removed"], 2);
}

#[tokio::test]
async fn restricted_collection_is_hidden_from_outsiders() {
	let app = app(None).await;
	let resolve = json!({
		"principals": [{ "user": "member@example.com" }, { "user": "outsider@example.com" }]
	});
	let (_, body) = call(&app, post("/v1/principals/resolve", &resolve)).await;
	let member = body["principals"][0]["principal_id"].clone();
	let outsider = body["principals"][1]["principal_id"].clone();
	let (status, _) = call(
		&app,
		post("/v1/collections", &json!({ "path": "private", "queryable_by": [member] })),
	)
	.await;

	assert_eq!(status, StatusCode::OK);

	let accessible = |id: Value| {
		json!({ "auth": { "principals": [id] }, "pattern": { "kind": "all" } })
	};
	let (_, body) = call(&app, post("/v1/collections/accessible", &accessible(member))).await;

	assert_eq!(body["collections"].as_array().map(Vec::len), Some(1));

	let (_, body) =
		call(&app, post("/v1/collections/accessible", &accessible(outsider.clone()))).await;

	assert_eq!(body["collections"].as_array().map(Vec::len), Some(0));

	let (status, _) = call(
		&app,
		post("/v1/collections/acl", &json!({ "path": "private", "queryable_by": [] })),
	)
	.await;

	assert_eq!(status, StatusCode::OK);

	let (_, body) = call(&app, post("/v1/collections/accessible", &accessible(outsider))).await;

	assert_eq!(body["collections"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn errors_map_to_status_and_code() {
	let app = app(None).await;
	let (status, _) = call(&app, post("/v1/collections", &json!({ "path": "docs" }))).await;

	assert_eq!(status, StatusCode::OK);

	let (status, body) = call(&app, post("/v1/collections", &json!({ "path": "docs" }))).await;

	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(body["error_code"], "conflict");

	let (status, _) =
		call(&app, post("/v1/collections/ensure", &json!({ "path": "docs" }))).await;

	assert_eq!(status, StatusCode::OK);

	let ingest = json!({
		"collection_path": "missing",
		"document_id": "d",
		"chunks": [{ "content": "x", "embedding": [1.0, 0.0, 0.0], "chunk_index": 0 }]
	});
	let (status, body) = call(&app, post("/v1/chunks/ingest", &ingest)).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error_code"], "not_found");

	let query = json!({
		"auth": "admin",
		"pattern": { "kind": "all" },
		"vector": [1.0, 0.0, 0.0],
		"top_k": 0
	});
	let (status, body) = call(&app, post("/v1/chunks/query", &query)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");

	let (status, body) =
		call(&app, post("/v1/collections", &json!({ "path": "/bad//path" }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");

	let malformed = Request::builder()
		.method("POST")
		.uri("/v1/collections")
		.header("content-type", "application/json")
		.body(Body::from("{"))
		.expect("Failed to build request.");
	let (status, body) = call(&app, malformed).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn bearer_token_guards_v1_routes() {
	let app = app(Some("secret")).await;
	let request =
		Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request.");
	let (status, _) = call(&app, request).await;

	assert_eq!(status, StatusCode::OK);

	let (status, body) = call(&app, post("/v1/collections", &json!({ "path": "docs" }))).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["error_code"], "unauthorized");

	let mut request = post("/v1/collections", &json!({ "path": "docs" }));

	request.headers_mut().insert(
		"authorization",
		"Bearer wrong".parse().expect("Failed to build header value."),
	);

	let (status, _) = call(&app, request).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let mut request = post("/v1/collections", &json!({ "path": "docs" }));

	request.headers_mut().insert(
		"authorization",
		"Bearer secret".parse().expect("Failed to build header value."),
	);

	let (status, _) = call(&app, request).await;

	assert_eq!(status, StatusCode::OK);
}
