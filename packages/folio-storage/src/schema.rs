pub const DROP_SCHEMA_SQL: &str = include_str!("../../../sql/drop.sql");
pub const SCHEMA_TABLES: [&str; 3] = ["principals", "collections", "chunks"];

pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

/// Splits a rendered script into executable statements.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_principals.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_principals.sql")),
				"tables/002_collections.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_collections.sql")),
				"tables/003_chunks.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_chunks.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
