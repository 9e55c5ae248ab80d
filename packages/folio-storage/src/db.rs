use std::collections::BTreeSet;

use sqlx::{PgPool, Postgres, Transaction, postgres::PgPoolOptions};

use folio_domain::{
	Collection, CollectionConfig, CollectionPath, CollectionPattern, ExternalPrincipal,
	PrincipalId, RankedResult, StoredChunkRecord,
};

use crate::{
	BoxFuture, CreateMode, CreateOutcome, Error, NearestQuery, Result, SchemaState, Store, chunks,
	collections, principals, schema,
};

/// Transaction-scoped advisory lock key shared by every schema create/drop.
const SCHEMA_LOCK_ID: i64 = 7_120_114;

pub struct Db {
	pub pool: PgPool,
	pub vector_dim: u32,
}
impl Db {
	pub async fn connect(cfg: &folio_config::Postgres, vector_dim: u32) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool, vector_dim })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema(self.vector_dim);
		// Advisory locks are held per connection. Use a single transaction so the lock is scoped to
		// one connection and automatically released when the transaction ends.
		let mut tx = self.pool.begin().await?;

		lock_schema(&mut tx).await?;

		for statement in schema::statements(&sql) {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		check_vector_dim(&mut tx, self.vector_dim).await?;

		tx.commit().await?;

		tracing::info!(vector_dim = self.vector_dim, "Schema ensured.");

		Ok(())
	}

	pub async fn drop_schema(&self) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		lock_schema(&mut tx).await?;

		for statement in schema::statements(schema::DROP_SCHEMA_SQL) {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		tracing::info!("Schema dropped.");

		Ok(())
	}

	pub async fn schema_state(&self) -> Result<SchemaState> {
		let present: i64 = sqlx::query_scalar(
			"\
SELECT count(*)
FROM unnest($1::text[]) AS t(name)
WHERE to_regclass(t.name) IS NOT NULL",
		)
		.bind(schema::SCHEMA_TABLES.as_slice())
		.fetch_one(&self.pool)
		.await?;

		if present as usize == schema::SCHEMA_TABLES.len() {
			Ok(SchemaState::Ready)
		} else {
			Ok(SchemaState::Uninitialized)
		}
	}
}

impl Store for Db {
	fn vector_dim(&self) -> u32 {
		self.vector_dim
	}

	fn initialize_schema(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.ensure_schema())
	}

	fn drop_schema(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(Db::drop_schema(self))
	}

	fn schema_state(&self) -> BoxFuture<'_, Result<SchemaState>> {
		Box::pin(Db::schema_state(self))
	}

	fn get_or_create_principal<'a>(
		&'a self,
		external: &'a ExternalPrincipal,
	) -> BoxFuture<'a, Result<PrincipalId>> {
		Box::pin(async move {
			if let Some(id) = principals::find_principal_id(&self.pool, external).await? {
				return Ok(id);
			}
			if let Some(id) = principals::insert_principal_if_absent(&self.pool, external).await? {
				return Ok(id);
			}

			// Lost the insert race; the winner's row is committed by now.
			principals::find_principal_id(&self.pool, external).await?.ok_or_else(|| {
				Error::NotFound(format!("Principal {external} vanished after creation."))
			})
		})
	}

	fn lookup_principal<'a>(
		&'a self,
		external: &'a ExternalPrincipal,
	) -> BoxFuture<'a, Result<Option<PrincipalId>>> {
		Box::pin(principals::find_principal_id(&self.pool, external))
	}

	fn describe_principal(
		&self,
		id: PrincipalId,
	) -> BoxFuture<'_, Result<Option<ExternalPrincipal>>> {
		Box::pin(principals::get_principal(&self.pool, id))
	}

	fn create_collection<'a>(
		&'a self,
		config: &'a CollectionConfig,
		mode: CreateMode,
	) -> BoxFuture<'a, Result<CreateOutcome>> {
		Box::pin(async move {
			let mut tx = self.pool.begin().await?;
			let outcome = collections::create_collection_tx(&mut tx, config, mode).await?;

			tx.commit().await?;

			Ok(outcome)
		})
	}

	fn get_collection<'a>(
		&'a self,
		path: &'a CollectionPath,
	) -> BoxFuture<'a, Result<Option<Collection>>> {
		Box::pin(collections::get_collection(&self.pool, path))
	}

	fn list_collections<'a>(
		&'a self,
		pattern: &'a CollectionPattern,
	) -> BoxFuture<'a, Result<Vec<Collection>>> {
		Box::pin(collections::list_collections(&self.pool, pattern))
	}

	fn set_collection_acl<'a>(
		&'a self,
		path: &'a CollectionPath,
		queryable_by: &'a BTreeSet<PrincipalId>,
	) -> BoxFuture<'a, Result<Option<Collection>>> {
		Box::pin(collections::set_collection_acl(&self.pool, path, queryable_by))
	}

	fn delete_collection<'a>(&'a self, path: &'a CollectionPath) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let mut tx = self.pool.begin().await?;

			collections::lock_for_create(&mut tx, path).await?;

			let removed = collections::delete_collection_tree(&mut *tx, path).await?;

			tx.commit().await?;

			Ok(removed)
		})
	}

	fn insert_chunks<'a>(
		&'a self,
		path: &'a CollectionPath,
		records: &'a [StoredChunkRecord],
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let mut tx = self.pool.begin().await?;
			let written = chunks::insert_chunks_tx(&mut tx, path, records).await?;

			tx.commit().await?;

			Ok(written)
		})
	}

	fn nearest_chunks<'a>(
		&'a self,
		query: NearestQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<RankedResult>>> {
		Box::pin(async move {
			let mut tx = self.pool.begin().await?;
			let ranked = chunks::nearest_chunks_tx(&mut tx, query).await?;

			tx.commit().await?;

			Ok(ranked)
		})
	}

	fn delete_document<'a>(
		&'a self,
		path: &'a CollectionPath,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(chunks::delete_document(&self.pool, path, document_id))
	}

	fn document_chunks<'a>(
		&'a self,
		path: &'a CollectionPath,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<StoredChunkRecord>>> {
		Box::pin(chunks::list_document_chunks(&self.pool, path, document_id))
	}
}

async fn lock_schema(tx: &mut Transaction<'_, Postgres>) -> Result<()> {
	sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_ID).execute(&mut **tx).await?;

	Ok(())
}

/// `CREATE TABLE IF NOT EXISTS` keeps an existing table as-is, so a store reopened with a
/// different `vector_dim` has to be caught here rather than on the first insert.
async fn check_vector_dim(tx: &mut Transaction<'_, Postgres>, expected: u32) -> Result<()> {
	let typmod: i32 = sqlx::query_scalar(
		"\
SELECT atttypmod
FROM pg_attribute
WHERE attrelid = 'chunks'::regclass AND attname = 'embedding'",
	)
	.fetch_one(&mut **tx)
	.await?;

	if typmod != expected as i32 {
		return Err(Error::InvalidArgument(format!(
			"chunks.embedding has dimension {typmod}, but storage.vector_dim is {expected}."
		)));
	}

	Ok(())
}
