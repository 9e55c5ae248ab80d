//! Disposable Postgres databases for Folio's storage and service suites.
//!
//! Each [`TestDatabase`] is a uniquely named database on the server behind `FOLIO_PG_DSN`.
//! It hands out [`Db`] stores at any vector dimension and is dropped on [`TestDatabase::cleanup`]
//! or, as a fallback, when the value goes out of scope.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

use folio_config::{Config, Postgres, Query, Security, Service, Storage, StorageBackend};
use folio_storage::db::Db;

pub const DSN_ENV: &str = "FOLIO_PG_DSN";

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];
const POOL_MAX_CONNS: u32 = 4;
const MAX_TOP_K: u32 = 20;

pub struct TestDatabase {
	name: String,
	dsn: String,
	admin: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	/// Creates a database when `FOLIO_PG_DSN` is set. `None` means the suite should skip.
	pub async fn from_env() -> Result<Option<Self>> {
		match env_dsn() {
			Some(base_dsn) => Ok(Some(Self::create(&base_dsn).await?)),
			None => Ok(None),
		}
	}

	pub async fn create(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::InvalidDsn(err.to_string()))?;
		let (admin, mut conn) = connect_admin(&base).await?;
		let name = format!("folio_test_{}", Uuid::new_v4().simple());

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str()).await?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin, dropped: false })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn postgres(&self) -> Postgres {
		Postgres { dsn: self.dsn.clone(), pool_max_conns: POOL_MAX_CONNS }
	}

	/// A loopback Postgres-backed configuration pointing at this database.
	pub fn config(&self, vector_dim: u32) -> Config {
		Config {
			service: Service {
				http_bind: "127.0.0.1:0".to_string(),
				log_level: "info".to_string(),
			},
			storage: Storage {
				backend: StorageBackend::Postgres,
				vector_dim,
				postgres: Some(self.postgres()),
			},
			query: Query { max_top_k: MAX_TOP_K },
			security: Security { bind_localhost_only: true, api_auth_token: None },
		}
	}

	/// Connects without touching the schema.
	pub async fn connect(&self, vector_dim: u32) -> Result<Db> {
		Ok(Db::connect(&self.postgres(), vector_dim).await?)
	}

	/// Connects and makes sure the principal, collection, and chunk tables exist.
	pub async fn open_store(&self, vector_dim: u32) -> Result<Db> {
		let db = self.connect(vector_dim).await?;

		db.ensure_schema().await?;

		Ok(db)
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.name, &self.admin).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let admin = self.admin.clone();
		// The caller may be inside a runtime already, so blocking happens on a fresh thread.
		let worker = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| err.to_string())
				.and_then(|runtime| {
					runtime.block_on(drop_database(&name, &admin)).map_err(|err| err.to_string())
				});

			if let Err(err) = result {
				eprintln!("Failed to drop test database {name}: {err}.");
			}
		});

		let _ = worker.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(DSN_ENV).ok().filter(|dsn| !dsn.trim().is_empty())
}

async fn connect_admin(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut errors = Vec::with_capacity(ADMIN_DATABASES.len());

	for database in ADMIN_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => errors.push(format!("{database}: {err}")),
		}
	}

	Err(Error::NoAdminDatabase(errors.join("; ")))
}

async fn drop_database(name: &str, admin: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin).await?;

	// Pools opened by the suite may still hold sessions on the database.
	sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await?;
	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str()).await?;

	Ok(())
}
