use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use folio_domain::{ExternalPrincipal, PrincipalId};

use crate::{FolioService, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrincipal {
	pub principal: ExternalPrincipal,
	pub principal_id: PrincipalId,
}

impl FolioService {
	/// Same identity, same id. Users draw from the positive sequence, groups from the negative one.
	pub async fn get_or_create_principal(
		&self,
		external: &ExternalPrincipal,
	) -> Result<PrincipalId> {
		external.validate()?;

		let id = self.store.get_or_create_principal(external).await?;

		tracing::debug!(principal = %external, principal_id = %id, "Principal resolved.");

		Ok(id)
	}

	/// Resolves each distinct identity once, in input order.
	///
	/// Every item commits on its own. The first failure is returned and entries resolved before it
	/// stay created.
	pub async fn get_or_create_principals(
		&self,
		externals: &[ExternalPrincipal],
	) -> Result<HashMap<ExternalPrincipal, PrincipalId>> {
		let mut resolved = HashMap::with_capacity(externals.len());

		for external in externals {
			if resolved.contains_key(external) {
				continue;
			}

			let id = self.get_or_create_principal(external).await?;

			resolved.insert(external.clone(), id);
		}

		Ok(resolved)
	}

	pub async fn lookup_principal(
		&self,
		external: &ExternalPrincipal,
	) -> Result<Option<PrincipalId>> {
		external.validate()?;

		Ok(self.store.lookup_principal(external).await?)
	}

	pub async fn describe_principal(&self, id: PrincipalId) -> Result<Option<ExternalPrincipal>> {
		Ok(self.store.describe_principal(id).await?)
	}
}
