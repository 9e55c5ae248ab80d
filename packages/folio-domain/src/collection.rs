use std::{
	collections::BTreeSet,
	fmt::{Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, PrincipalId, Result};

pub const PATH_SEPARATOR: char = '/';

/// Slash-delimited location of a collection in the namespace, e.g. `docs/policies`.
///
/// Construction validates the input and never rewrites it, so a path that parses is already in
/// canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionPath(String);
impl CollectionPath {
	pub fn parse(raw: &str) -> Result<Self> {
		let invalid = |reason| Error::InvalidCollectionPath { path: raw.to_string(), reason };

		if raw.is_empty() {
			return Err(invalid("path must be non-empty"));
		}
		if raw.starts_with(PATH_SEPARATOR) {
			return Err(invalid("path must not start with a separator"));
		}
		if raw.ends_with(PATH_SEPARATOR) {
			return Err(invalid("path must not end with a separator"));
		}

		for segment in raw.split(PATH_SEPARATOR) {
			if segment.is_empty() {
				return Err(invalid("path must not contain empty segments"));
			}
			if segment.trim().is_empty() {
				return Err(invalid("path segments must not be whitespace only"));
			}
			if segment == "." || segment == ".." {
				return Err(invalid("path segments must not be relative references"));
			}
			if segment.chars().any(char::is_control) {
				return Err(invalid("path must not contain control characters"));
			}
		}

		Ok(Self(raw.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn segments(&self) -> impl Iterator<Item = &str> {
		self.0.split(PATH_SEPARATOR)
	}

	pub fn depth(&self) -> usize {
		self.segments().count()
	}

	pub fn name(&self) -> &str {
		self.0.rsplit(PATH_SEPARATOR).next().unwrap_or(&self.0)
	}

	pub fn parent(&self) -> Option<Self> {
		self.0.rsplit_once(PATH_SEPARATOR).map(|(parent, _)| Self(parent.to_string()))
	}

	pub fn join(&self, segment: &str) -> Result<Self> {
		Self::parse(&format!("{}{PATH_SEPARATOR}{segment}", self.0))
	}

	/// Prefix shared by every strict descendant, i.e. the path followed by a separator.
	pub fn descendant_prefix(&self) -> String {
		format!("{}{PATH_SEPARATOR}", self.0)
	}

	/// True when `self` lies strictly below `ancestor`.
	pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
		self.0.starts_with(&ancestor.descendant_prefix())
	}

	pub fn is_child_of(&self, parent: &Self) -> bool {
		self.parent().as_ref() == Some(parent)
	}
}

impl FromStr for CollectionPath {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

impl TryFrom<String> for CollectionPath {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		Self::parse(&value)
	}
}

impl From<CollectionPath> for String {
	fn from(path: CollectionPath) -> Self {
		path.0
	}
}

impl AsRef<str> for CollectionPath {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Display for CollectionPath {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
	pub path: CollectionPath,
	#[serde(default)]
	pub queryable_by: BTreeSet<PrincipalId>,
}
impl CollectionConfig {
	pub fn public(path: CollectionPath) -> Self {
		Self { path, queryable_by: BTreeSet::new() }
	}

	pub fn restricted(
		path: CollectionPath,
		queryable_by: impl IntoIterator<Item = PrincipalId>,
	) -> Self {
		Self { path, queryable_by: queryable_by.into_iter().collect() }
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
	pub path: CollectionPath,
	/// Empty means anyone may query the collection.
	pub queryable_by: BTreeSet<PrincipalId>,
	pub is_leaf: bool,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl Collection {
	pub fn is_public(&self) -> bool {
		self.queryable_by.is_empty()
	}

	pub fn parent_path(&self) -> Option<CollectionPath> {
		self.path.parent()
	}
}

/// Selector used to list or resolve collections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum CollectionPattern {
	Exact(CollectionPath),
	ImmediateChildren(CollectionPath),
	/// The path itself plus everything below it at any depth.
	AllDescendants(CollectionPath),
	All,
}
impl CollectionPattern {
	pub fn matches(&self, path: &CollectionPath) -> bool {
		match self {
			Self::Exact(exact) => path == exact,
			Self::ImmediateChildren(parent) => path.is_child_of(parent),
			Self::AllDescendants(root) => path == root || path.is_descendant_of(root),
			Self::All => true,
		}
	}

	pub fn anchor(&self) -> Option<&CollectionPath> {
		match self {
			Self::Exact(path) | Self::ImmediateChildren(path) | Self::AllDescendants(path) =>
				Some(path),
			Self::All => None,
		}
	}
}
