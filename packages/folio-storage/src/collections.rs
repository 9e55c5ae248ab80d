use std::collections::BTreeSet;

use sqlx::{PgExecutor, Postgres, Transaction};
use time::OffsetDateTime;

use folio_domain::{
	Collection, CollectionConfig, CollectionPath, CollectionPattern, PrincipalId, acl,
};

use crate::{CreateMode, CreateOutcome, Error, Result, error, models::CollectionRow};

/// Advisory lock class for per-path catalog locks. Keys within the class are `hashtext(path)`.
const COLLECTION_LOCK_CLASS: i32 = 7_120_115;
const COLLECTION_COLUMNS: &str = "path, parent_path, is_leaf, queryable_by, created_at";

/// Serializes catalog writes that touch `path` or its parent.
///
/// Ancestors are always locked before descendants, so two writers never wait on each other in
/// opposite orders.
pub async fn lock_for_create(
	tx: &mut Transaction<'_, Postgres>,
	path: &CollectionPath,
) -> Result<()> {
	if let Some(parent) = path.parent() {
		lock_path(tx, &parent).await?;
	}

	lock_path(tx, path).await
}

pub async fn lock_path(tx: &mut Transaction<'_, Postgres>, path: &CollectionPath) -> Result<()> {
	sqlx::query("SELECT pg_advisory_xact_lock($1, hashtext($2))")
		.bind(COLLECTION_LOCK_CLASS)
		.bind(path.as_str())
		.execute(&mut **tx)
		.await?;

	Ok(())
}

/// Runs the whole create inside `tx`: lock, look for descendants, insert, then flip a leaf
/// parent.
pub async fn create_collection_tx(
	tx: &mut Transaction<'_, Postgres>,
	config: &CollectionConfig,
	mode: CreateMode,
) -> Result<CreateOutcome> {
	let path = &config.path;

	lock_for_create(tx, path).await?;

	if let Some(existing) = get_collection(&mut **tx, path).await? {
		return match mode {
			CreateMode::ReturnExisting =>
				Ok(CreateOutcome { collection: existing, created: false, parent_flipped: false }),
			CreateMode::FailIfExists =>
				Err(Error::Conflict(format!("Collection {path} already exists."))),
		};
	}

	let has_children: bool =
		sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM collections WHERE parent_path = $1)")
			.bind(path.as_str())
			.fetch_one(&mut **tx)
			.await?;
	let parent = path.parent();
	let row = sqlx::query_as::<_, CollectionRow>(&format!(
		"\
INSERT INTO collections (path, parent_path, is_leaf, queryable_by, created_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING {COLLECTION_COLUMNS}"
	))
	.bind(path.as_str())
	.bind(parent.as_ref().map(CollectionPath::as_str))
	.bind(!has_children)
	.bind(acl::signed_ids(&config.queryable_by))
	.bind(OffsetDateTime::now_utc())
	.fetch_one(&mut **tx)
	.await
	.map_err(|err| {
		if error::is_unique_violation(&err) {
			Error::Conflict(format!("Collection {path} already exists."))
		} else {
			Error::Sqlx(err)
		}
	})?;
	let parent_flipped = match parent.as_ref() {
		Some(parent) => mark_interior(&mut **tx, parent).await?,
		None => false,
	};

	Ok(CreateOutcome { collection: row.try_into()?, created: true, parent_flipped })
}

/// Flips a leaf collection to interior. Returns whether a flip happened.
pub async fn mark_interior<'e, E>(executor: E, path: &CollectionPath) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let flipped: Option<String> = sqlx::query_scalar(
		"\
UPDATE collections
SET is_leaf = FALSE
WHERE path = $1 AND is_leaf
RETURNING path",
	)
	.bind(path.as_str())
	.fetch_optional(executor)
	.await?;

	Ok(flipped.is_some())
}

pub async fn get_collection<'e, E>(
	executor: E,
	path: &CollectionPath,
) -> Result<Option<Collection>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, CollectionRow>(&format!(
		"SELECT {COLLECTION_COLUMNS} FROM collections WHERE path = $1"
	))
	.bind(path.as_str())
	.fetch_optional(executor)
	.await?;

	row.map(Collection::try_from).transpose()
}

pub async fn list_collections<'e, E>(
	executor: E,
	pattern: &CollectionPattern,
) -> Result<Vec<Collection>>
where
	E: PgExecutor<'e>,
{
	let select = format!("SELECT {COLLECTION_COLUMNS} FROM collections");
	let order = "ORDER BY path COLLATE \"C\" ASC";
	let rows = match pattern {
		CollectionPattern::Exact(path) =>
			sqlx::query_as::<_, CollectionRow>(&format!("{select} WHERE path = $1 {order}"))
				.bind(path.as_str())
				.fetch_all(executor)
				.await?,
		CollectionPattern::ImmediateChildren(path) =>
			sqlx::query_as::<_, CollectionRow>(&format!(
				"{select} WHERE parent_path = $1 {order}"
			))
			.bind(path.as_str())
			.fetch_all(executor)
			.await?,
		CollectionPattern::AllDescendants(path) =>
			sqlx::query_as::<_, CollectionRow>(&format!(
				"{select} WHERE path = $1 OR path LIKE $2 ESCAPE '\\' {order}"
			))
			.bind(path.as_str())
			.bind(descendant_like_pattern(path))
			.fetch_all(executor)
			.await?,
		CollectionPattern::All =>
			sqlx::query_as::<_, CollectionRow>(&format!("{select} {order}"))
				.fetch_all(executor)
				.await?,
	};

	rows.into_iter().map(Collection::try_from).collect()
}

pub async fn set_collection_acl<'e, E>(
	executor: E,
	path: &CollectionPath,
	queryable_by: &BTreeSet<PrincipalId>,
) -> Result<Option<Collection>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, CollectionRow>(&format!(
		"\
UPDATE collections
SET queryable_by = $2
WHERE path = $1
RETURNING {COLLECTION_COLUMNS}"
	))
	.bind(path.as_str())
	.bind(acl::signed_ids(queryable_by))
	.fetch_optional(executor)
	.await?;

	row.map(Collection::try_from).transpose()
}

/// Deletes `path` and every descendant. Chunks go with them through the foreign key cascade.
pub async fn delete_collection_tree<'e, E>(executor: E, path: &CollectionPath) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
DELETE FROM collections
WHERE path = $1 OR path LIKE $2 ESCAPE '\\'",
	)
	.bind(path.as_str())
	.bind(descendant_like_pattern(path))
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

/// `LIKE` pattern matching strict descendants of `path`, with wildcards in the path escaped.
pub fn descendant_like_pattern(path: &CollectionPath) -> String {
	let mut out = String::with_capacity(path.as_str().len() + 2);

	for ch in path.descendant_prefix().chars() {
		if matches!(ch, '\\' | '%' | '_') {
			out.push('\\');
		}

		out.push(ch);
	}

	out.push('%');

	out
}
