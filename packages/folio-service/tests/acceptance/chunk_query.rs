use std::collections::{BTreeMap, BTreeSet};

use folio_domain::{
	ChunkWithEmbedding, CollectionConfig, CollectionPath, CollectionPattern, ExternalPrincipal,
	UserAuthorization,
};
use folio_service::{Error, IngestRequest, QueryRequest};

use super::{build_service, test_db};

fn path(raw: &str) -> CollectionPath {
	CollectionPath::parse(raw).expect("Invalid collection path.")
}

fn chunk(index: u32, embedding: [f32; 3]) -> ChunkWithEmbedding {
	ChunkWithEmbedding {
		content: format!("chunk {index}"),
		embedding: embedding.to_vec(),
		chunk_index: index,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FOLIO_PG_DSN to run."]
async fn document_acl_filters_query_results() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping document_acl_filters_query_results; set FOLIO_PG_DSN to run this test.");

		return;
	};
	let service = build_service(&test_db).await;
	let reader = service
		.get_or_create_principal(&ExternalPrincipal::user("reader@example.com"))
		.await
		.expect("Failed to create user.");
	let stranger = service
		.get_or_create_principal(&ExternalPrincipal::user("stranger@example.com"))
		.await
		.expect("Failed to create user.");
	let docs = path("docs");

	service
		.create_collection(&CollectionConfig::public(docs.clone()))
		.await
		.expect("Failed to create collection.");
	service
		.ingest(IngestRequest {
			collection_path: docs.clone(),
			document_id: "open".to_string(),
			chunks: vec![chunk(0, [1.0, 0.0, 0.0])],
			metadata: BTreeMap::new(),
			readable_by: BTreeSet::new(),
		})
		.await
		.expect("Failed to ingest.");
	service
		.ingest(IngestRequest {
			collection_path: docs.clone(),
			document_id: "secret".to_string(),
			chunks: vec![chunk(0, [0.8, 0.2, 0.0])],
			metadata: BTreeMap::from([("owner".to_string(), "reader".to_string())]),
			readable_by: BTreeSet::from([reader]),
		})
		.await
		.expect("Failed to ingest.");

	let run = |auth: UserAuthorization| {
		let service = service.clone();

		async move {
			service
				.query(QueryRequest {
					auth,
					pattern: CollectionPattern::All,
					vector: vec![1.0, 0.0, 0.0],
					top_k: 10,
				})
				.await
				.expect("Failed to query.")
				.into_iter()
				.map(|result| result.record.id)
				.collect::<Vec<_>>()
		}
	};

	let as_reader = run(UserAuthorization::principals([reader])).await;
	let as_stranger = run(UserAuthorization::principals([stranger])).await;

	assert_eq!(as_reader, vec!["open-chunk-0", "secret-chunk-0"]);
	assert_eq!(as_stranger, vec!["open-chunk-0"]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FOLIO_PG_DSN to run."]
async fn delete_document_removes_only_its_chunks() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping delete_document_removes_only_its_chunks; set FOLIO_PG_DSN to run.");

		return;
	};
	let service = build_service(&test_db).await;
	let docs = path("docs");

	service
		.create_collection(&CollectionConfig::public(docs.clone()))
		.await
		.expect("Failed to create collection.");

	for (document_id, chunks) in [
		("d", vec![chunk(0, [1.0, 0.0, 0.0]), chunk(1, [0.9, 0.1, 0.0])]),
		("keep", vec![chunk(0, [0.5, 0.5, 0.0])]),
	] {
		service
			.ingest(IngestRequest {
				collection_path: docs.clone(),
				document_id: document_id.to_string(),
				chunks,
				metadata: BTreeMap::new(),
				readable_by: BTreeSet::new(),
			})
			.await
			.expect("Failed to ingest.");
	}

	let err = service
		.ingest(IngestRequest {
			collection_path: docs.clone(),
			document_id: "d".to_string(),
			chunks: vec![chunk(0, [1.0, 0.0, 0.0])],
			metadata: BTreeMap::new(),
			readable_by: BTreeSet::new(),
		})
		.await
		.expect_err("Expected a duplicate chunk conflict.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");
	assert_eq!(service.delete_document(&docs, "d").await.expect("Failed to delete."), 2);

	let remaining = service
		.query(QueryRequest {
			auth: UserAuthorization::Admin,
			pattern: CollectionPattern::Exact(docs.clone()),
			vector: vec![1.0, 0.0, 0.0],
			top_k: 10,
		})
		.await
		.expect("Failed to query.");

	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0].record.id, "keep-chunk-0");

	let err = service
		.ingest(IngestRequest {
			collection_path: path("missing"),
			document_id: "d".to_string(),
			chunks: vec![chunk(0, [1.0, 0.0, 0.0])],
			metadata: BTreeMap::new(),
			readable_by: BTreeSet::new(),
		})
		.await
		.expect_err("Expected not found.");

	assert!(matches!(err, Error::NotFound { .. }), "Unexpected error: {err:?}");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
