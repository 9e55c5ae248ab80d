use folio_domain::{CollectionConfig, CollectionPath};
use folio_service::Error;
use folio_storage::SchemaState;

use super::{build_service, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres. Set FOLIO_PG_DSN to run."]
async fn initialize_is_idempotent_and_drop_resets() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping initialize_is_idempotent_and_drop_resets; set FOLIO_PG_DSN to run.");

		return;
	};
	let service = build_service(&test_db).await;
	let path = CollectionPath::parse("kept").expect("Invalid collection path.");

	service
		.create_collection(&CollectionConfig::public(path.clone()))
		.await
		.expect("Failed to create collection.");

	for _ in 0..3 {
		service.initialize_schema().await.expect("Failed to initialize schema.");
	}

	assert_eq!(service.schema_state().await.expect("Failed to read state."), SchemaState::Ready);
	assert!(service.get_collection(&path).await.expect("Failed to get.").is_some());

	service.drop_schema().await.expect("Failed to drop schema.");

	assert_eq!(
		service.schema_state().await.expect("Failed to read state."),
		SchemaState::Uninitialized
	);

	let err = service.get_collection(&path).await.expect_err("Expected a storage error.");

	assert!(matches!(err, Error::Storage { .. }), "Unexpected error: {err:?}");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
