use std::collections::BTreeSet;

use folio_domain::{
	CollectionConfig, CollectionPath, CollectionPattern, ExternalPrincipal, UserAuthorization,
};
use folio_service::Error;

use super::{build_service, test_db};

fn path(raw: &str) -> CollectionPath {
	CollectionPath::parse(raw).expect("Invalid collection path.")
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FOLIO_PG_DSN to run."]
async fn principals_resolve_idempotently() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping principals_resolve_idempotently; set FOLIO_PG_DSN to run this test.");

		return;
	};
	let service = build_service(&test_db).await;
	let externals = [
		ExternalPrincipal::user("alice@example.com"),
		ExternalPrincipal::group("staff"),
		ExternalPrincipal::user("alice@example.com"),
	];
	let first = service.get_or_create_principals(&externals).await.expect("Failed to resolve.");
	let second = service.get_or_create_principals(&externals).await.expect("Failed to resolve.");

	assert_eq!(first, second);
	assert_eq!(first.len(), 2);
	assert!(first[&externals[0]].is_user());
	assert!(first[&externals[1]].is_group());
	assert_eq!(
		service
			.lookup_principal(&ExternalPrincipal::group("nobody"))
			.await
			.expect("Failed to look up."),
		None
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FOLIO_PG_DSN to run."]
async fn hierarchy_flips_leaves_and_lists_in_path_order() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping hierarchy_flips_leaves_and_lists_in_path_order; set FOLIO_PG_DSN to run.");

		return;
	};
	let service = build_service(&test_db).await;

	for raw in ["p", "p/b", "p/a", "p/a/nested", "p_x", "p%"] {
		service
			.create_collection(&CollectionConfig::public(path(raw)))
			.await
			.expect("Failed to create collection.");
	}

	let parent = service.get_collection(&path("p")).await.expect("get").expect("missing");

	assert!(!parent.is_leaf);

	let names = |collections: Vec<folio_domain::Collection>| {
		collections.into_iter().map(|collection| collection.path.to_string()).collect::<Vec<_>>()
	};
	let children = service
		.list_collections(&CollectionPattern::ImmediateChildren(path("p")))
		.await
		.expect("Failed to list.");
	let subtree = service
		.list_collections(&CollectionPattern::AllDescendants(path("p")))
		.await
		.expect("Failed to list.");

	assert_eq!(names(children), vec!["p/a", "p/b"]);
	assert_eq!(names(subtree), vec!["p", "p/a", "p/a/nested", "p/b"]);

	let err = service
		.create_collection(&CollectionConfig::public(path("p/a")))
		.await
		.expect_err("Expected a conflict.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FOLIO_PG_DSN to run."]
async fn accessible_collections_follow_acl() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping accessible_collections_follow_acl; set FOLIO_PG_DSN to run this test.");

		return;
	};
	let service = build_service(&test_db).await;
	let group = service
		.get_or_create_principal(&ExternalPrincipal::group("g"))
		.await
		.expect("Failed to create group.");
	let other = service
		.get_or_create_principal(&ExternalPrincipal::user("other@example.com"))
		.await
		.expect("Failed to create user.");

	service
		.create_collection(&CollectionConfig::restricted(path("private"), [group]))
		.await
		.expect("Failed to create.");
	service
		.create_collection(&CollectionConfig::public(path("public")))
		.await
		.expect("Failed to create.");

	let count = |auth: UserAuthorization| {
		let service = service.clone();

		async move {
			service
				.find_accessible_collections(&auth, &CollectionPattern::All)
				.await
				.expect("Failed to resolve.")
				.len()
		}
	};

	assert_eq!(count(UserAuthorization::Admin).await, 2);
	assert_eq!(count(UserAuthorization::principals([group])).await, 2);
	assert_eq!(count(UserAuthorization::principals([other])).await, 1);

	service
		.set_queryable_by(&path("private"), &BTreeSet::new())
		.await
		.expect("Failed to open collection.");

	assert_eq!(count(UserAuthorization::principals([other])).await, 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
