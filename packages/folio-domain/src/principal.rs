use std::{
	fmt::{Display, Formatter},
	num::NonZeroU64,
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const USER_KEY_PREFIX: &str = "user:";
const GROUP_KEY_PREFIX: &str = "group:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
	User,
	Group,
}
impl PrincipalKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Group => "group",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"user" => Some(Self::User),
			"group" => Some(Self::Group),
			_ => None,
		}
	}
}

impl Display for PrincipalKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

/// Compact identifier an access list can name.
///
/// The kind travels with the id. At the storage boundary the pair is encoded as one signed
/// integer: users are positive, groups are negative, zero is never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PrincipalId {
	kind: PrincipalKind,
	raw: NonZeroU64,
}
impl PrincipalId {
	/// Largest raw value a user id may carry and still fit the signed encoding.
	pub const MAX_USER_RAW: u64 = i64::MAX as u64;
	/// Largest raw value a group id may carry; `i64::MIN` is a valid group encoding.
	pub const MAX_GROUP_RAW: u64 = i64::MAX as u64 + 1;

	pub fn new(kind: PrincipalKind, raw: u64) -> Option<Self> {
		let limit = match kind {
			PrincipalKind::User => Self::MAX_USER_RAW,
			PrincipalKind::Group => Self::MAX_GROUP_RAW,
		};

		if raw > limit {
			return None;
		}

		NonZeroU64::new(raw).map(|raw| Self { kind, raw })
	}

	pub fn user(raw: u64) -> Option<Self> {
		Self::new(PrincipalKind::User, raw)
	}

	pub fn group(raw: u64) -> Option<Self> {
		Self::new(PrincipalKind::Group, raw)
	}

	pub fn from_signed(value: i64) -> Option<Self> {
		match value {
			0 => None,
			v if v > 0 => Self::new(PrincipalKind::User, v.unsigned_abs()),
			v => Self::new(PrincipalKind::Group, v.unsigned_abs()),
		}
	}

	pub fn to_signed(self) -> i64 {
		match self.kind {
			PrincipalKind::User => self.raw.get() as i64,
			// `raw` may be 2^63, which only has a representation as `i64::MIN`.
			PrincipalKind::Group => (self.raw.get() as i64).wrapping_neg(),
		}
	}

	pub fn kind(&self) -> PrincipalKind {
		self.kind
	}

	pub fn raw(&self) -> u64 {
		self.raw.get()
	}

	pub fn is_user(&self) -> bool {
		self.kind == PrincipalKind::User
	}

	pub fn is_group(&self) -> bool {
		self.kind == PrincipalKind::Group
	}
}

impl TryFrom<i64> for PrincipalId {
	type Error = Error;

	fn try_from(value: i64) -> Result<Self> {
		Self::from_signed(value).ok_or(Error::InvalidPrincipalId { value })
	}
}

impl From<PrincipalId> for i64 {
	fn from(id: PrincipalId) -> Self {
		id.to_signed()
	}
}

impl Display for PrincipalId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.kind, self.raw)
	}
}

/// Caller-facing identity resolved to a [`PrincipalId`] by the principal directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalPrincipal {
	User { email: String },
	Group { name: String },
}
impl ExternalPrincipal {
	pub fn user(email: impl Into<String>) -> Self {
		Self::User { email: email.into() }
	}

	pub fn group(name: impl Into<String>) -> Self {
		Self::Group { name: name.into() }
	}

	pub fn kind(&self) -> PrincipalKind {
		match self {
			Self::User { .. } => PrincipalKind::User,
			Self::Group { .. } => PrincipalKind::Group,
		}
	}

	pub fn value(&self) -> &str {
		match self {
			Self::User { email } => email.as_str(),
			Self::Group { name } => name.as_str(),
		}
	}

	/// Rejects identities that would not round-trip through their external key unchanged.
	pub fn validate(&self) -> Result<()> {
		let value = self.value();

		if value.is_empty() {
			return Err(Error::InvalidPrincipal {
				message: format!("{} identity must be non-empty.", self.kind()),
			});
		}
		if value.trim() != value {
			return Err(Error::InvalidPrincipal {
				message: format!(
					"{} identity must not have leading or trailing whitespace.",
					self.kind()
				),
			});
		}
		if value.chars().any(char::is_control) {
			return Err(Error::InvalidPrincipal {
				message: format!("{} identity must not contain control characters.", self.kind()),
			});
		}

		Ok(())
	}

	pub fn external_key(&self) -> String {
		match self {
			Self::User { email } => format!("{USER_KEY_PREFIX}{email}"),
			Self::Group { name } => format!("{GROUP_KEY_PREFIX}{name}"),
		}
	}

	pub fn from_external_key(key: &str) -> Result<Self> {
		let principal = if let Some(email) = key.strip_prefix(USER_KEY_PREFIX) {
			Self::user(email)
		} else if let Some(name) = key.strip_prefix(GROUP_KEY_PREFIX) {
			Self::group(name)
		} else {
			return Err(Error::InvalidPrincipal {
				message: format!("External key {key:?} has no known kind prefix."),
			});
		};

		principal.validate()?;

		Ok(principal)
	}
}

impl Display for ExternalPrincipal {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.external_key())
	}
}
