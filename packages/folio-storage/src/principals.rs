use sqlx::PgExecutor;

use folio_domain::{ExternalPrincipal, PrincipalId, PrincipalKind};

use crate::{
	Error, Result,
	models::{self, PrincipalRow},
};

pub async fn find_principal_id<'e, E>(
	executor: E,
	external: &ExternalPrincipal,
) -> Result<Option<PrincipalId>>
where
	E: PgExecutor<'e>,
{
	let id: Option<i64> =
		sqlx::query_scalar("SELECT principal_id FROM principals WHERE external_key = $1")
			.bind(external.external_key())
			.fetch_optional(executor)
			.await?;

	id.map(|value| decode_for(external, value)).transpose()
}

/// Inserts the principal unless its external key is already taken. Returns `None` when another
/// writer got there first.
pub async fn insert_principal_if_absent<'e, E>(
	executor: E,
	external: &ExternalPrincipal,
) -> Result<Option<PrincipalId>>
where
	E: PgExecutor<'e>,
{
	let id: Option<i64> = sqlx::query_scalar(
		"\
INSERT INTO principals (principal_id, kind, external_key)
VALUES (
\tCASE
\t\tWHEN $1 = 'user' THEN nextval('principal_user_id_seq')
\t\tELSE -nextval('principal_group_id_seq')
\tEND,
\t$1,
\t$2
)
ON CONFLICT (external_key) DO NOTHING
RETURNING principal_id",
	)
	.bind(external.kind().as_str())
	.bind(external.external_key())
	.fetch_optional(executor)
	.await?;

	id.map(|value| decode_for(external, value)).transpose()
}

pub async fn get_principal<'e, E>(
	executor: E,
	id: PrincipalId,
) -> Result<Option<ExternalPrincipal>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, PrincipalRow>(
		"\
SELECT principal_id, kind, external_key
FROM principals
WHERE principal_id = $1",
	)
	.bind(id.to_signed())
	.fetch_optional(executor)
	.await?;

	row.map(|row| row.into_principal().map(|(_, external)| external)).transpose()
}

fn decode_for(external: &ExternalPrincipal, value: i64) -> Result<PrincipalId> {
	let id = models::decode_principal_id(value)?;
	let expected: PrincipalKind = external.kind();

	if id.kind() != expected {
		return Err(Error::Decode(format!(
			"Principal {external} resolved to {id}, which is not a {expected}."
		)));
	}

	Ok(id)
}
