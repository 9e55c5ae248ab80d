use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Collection, PrincipalId};

/// What a caller holds when reading: either everything, or its own user id plus groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAuthorization {
	Admin,
	Principals(BTreeSet<PrincipalId>),
}
impl UserAuthorization {
	pub fn principals(ids: impl IntoIterator<Item = PrincipalId>) -> Self {
		Self::Principals(ids.into_iter().collect())
	}

	pub fn is_admin(&self) -> bool {
		matches!(self, Self::Admin)
	}

	/// Held principals; `None` for admin, which is not bound to any set.
	pub fn principal_set(&self) -> Option<&BTreeSet<PrincipalId>> {
		match self {
			Self::Admin => None,
			Self::Principals(ids) => Some(ids),
		}
	}

	pub fn can_query(&self, collection: &Collection) -> bool {
		acl_allows(&collection.queryable_by, self)
	}

	pub fn can_read(&self, readable_by: &BTreeSet<PrincipalId>) -> bool {
		acl_allows(readable_by, self)
	}
}

/// Shared rule for collection and chunk access lists. An empty list is public.
pub fn acl_allows(acl: &BTreeSet<PrincipalId>, auth: &UserAuthorization) -> bool {
	match auth {
		UserAuthorization::Admin => true,
		UserAuthorization::Principals(held) => acl.is_empty() || !acl.is_disjoint(held),
	}
}

pub fn signed_ids(ids: &BTreeSet<PrincipalId>) -> Vec<i64> {
	ids.iter().map(|id| id.to_signed()).collect()
}
