use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use folio_config::{Config, Error, StorageBackend};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_with(edit: impl FnOnce(&mut toml::Table)) -> String {
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	edit(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn table<'a>(root: &'a mut toml::Table, key: &str) -> &'a mut toml::Table {
	root.get_mut(key)
		.and_then(Value::as_table_mut)
		.unwrap_or_else(|| panic!("Template config must include [{key}]."))
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("Clock before epoch.").as_nanos();
	let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
	let path = env::temp_dir().join(format!("folio_config_test_{nanos}_{seq}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn parse_err(payload: String) -> String {
	match folio_config::parse(&payload) {
		Err(Error::Validation { message }) => message,
		other => panic!("Expected a validation error, got {other:?}."),
	}
}

#[test]
fn sample_config_loads_from_disk() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let cfg: Config = folio_config::load(&path).expect("Sample config must load.");

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
	assert_eq!(cfg.storage.vector_dim, 384);
	assert_eq!(cfg.query.max_top_k, 100);
	assert_eq!(cfg.storage.postgres.as_ref().map(|pg| pg.pool_max_conns), Some(8));
}

#[test]
fn blank_api_token_normalizes_to_none() {
	let cfg = folio_config::parse(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Sample config must parse.");

	assert!(cfg.security.api_auth_token.is_none());
}

#[test]
fn missing_file_reports_path() {
	let path = env::temp_dir().join("folio_config_test_missing.toml");
	let err = folio_config::load(&path).expect_err("Missing file must fail.");

	assert!(matches!(err, Error::ReadConfig { path: reported, .. } if reported == path));
}

#[test]
fn zero_vector_dim_is_rejected() {
	let payload = sample_with(|root| {
		table(root, "storage").insert("vector_dim".to_string(), Value::Integer(0));
	});

	assert_eq!(parse_err(payload), "storage.vector_dim must be greater than zero.");
}

#[test]
fn oversized_vector_dim_is_rejected() {
	let payload = sample_with(|root| {
		table(root, "storage").insert("vector_dim".to_string(), Value::Integer(2_001));
	});

	assert!(parse_err(payload).starts_with("storage.vector_dim must be"));
}

#[test]
fn zero_max_top_k_is_rejected() {
	let payload = sample_with(|root| {
		table(root, "query").insert("max_top_k".to_string(), Value::Integer(0));
	});

	assert_eq!(parse_err(payload), "query.max_top_k must be greater than zero.");
}

#[test]
fn postgres_backend_requires_postgres_section() {
	let payload = sample_with(|root| {
		table(root, "storage").remove("postgres");
	});

	assert_eq!(
		parse_err(payload),
		"storage.postgres is required when storage.backend is postgres."
	);
}

#[test]
fn memory_backend_does_not_need_postgres() {
	let payload = sample_with(|root| {
		let storage = table(root, "storage");

		storage.insert("backend".to_string(), Value::String("memory".to_string()));
		storage.remove("postgres");
	});
	let cfg = folio_config::parse(&payload).expect("Memory config must parse.");

	assert_eq!(cfg.storage.backend, StorageBackend::Memory);
}

#[test]
fn unknown_backend_fails_to_parse() {
	let payload = sample_with(|root| {
		table(root, "storage").insert("backend".to_string(), Value::String("redis".to_string()));
	});

	assert!(matches!(folio_config::parse(&payload), Err(Error::ParseConfig { .. })));
}

#[test]
fn zero_pool_size_is_rejected() {
	let payload = sample_with(|root| {
		table(table(root, "storage"), "postgres")
			.insert("pool_max_conns".to_string(), Value::Integer(0));
	});

	assert_eq!(parse_err(payload), "storage.postgres.pool_max_conns must be greater than zero.");
}
