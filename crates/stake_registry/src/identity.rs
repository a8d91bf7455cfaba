use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Public address of one network participant.
///
/// Opaque to the registry: only signature verification interprets the bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Arc<str>);

impl Identity {
	pub fn new(value: impl Into<Arc<str>>) -> Self {
		Self(value.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for Identity {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for Identity {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for Identity {
	fn from(value: &str) -> Self {
		Self(Arc::from(value))
	}
}

impl From<String> for Identity {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}

impl fmt::Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl fmt::Debug for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Identity({:?})", &*self.0)
	}
}

impl Serialize for Identity {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for Identity {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(Self::from)
	}
}

/// Stake amount reported by the upstream source.
///
/// Always finite and non-negative. Fractional amounts are kept exactly as
/// parsed and compared numerically, so `9999.9` stays below a `10000`
/// threshold. Whole amounts above 2^53 lose precision.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(transparent)]
pub struct Stake(f64);

/// A stake amount that is negative, NaN or infinite.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("stake must be a finite, non-negative number, got {0}")]
pub struct InvalidStake(pub f64);

impl Stake {
	pub const ZERO: Self = Self(0.0);

	pub const fn new(whole: u64) -> Self {
		Self(whole as f64)
	}

	pub fn from_amount(amount: f64) -> Result<Self, InvalidStake> {
		if amount.is_finite() && amount >= 0.0 {
			// Folds -0.0 into 0.0 so equal stakes hash alike.
			Ok(Self(amount + 0.0))
		} else {
			Err(InvalidStake(amount))
		}
	}

	pub const fn amount(self) -> f64 {
		self.0
	}
}

impl PartialEq for Stake {
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}

impl Eq for Stake {}

impl PartialOrd for Stake {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Stake {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.0.total_cmp(&other.0)
	}
}

impl std::hash::Hash for Stake {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.0.to_bits().hash(state);
	}
}

impl std::iter::Sum for Stake {
	fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
		Self(iter.fold(0.0, |acc, s| acc + s.0).min(f64::MAX))
	}
}

impl From<u64> for Stake {
	fn from(whole: u64) -> Self {
		Self::new(whole)
	}
}

impl TryFrom<f64> for Stake {
	type Error = InvalidStake;

	fn try_from(amount: f64) -> Result<Self, Self::Error> {
		Self::from_amount(amount)
	}
}

impl std::str::FromStr for Stake {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let amount: f64 = s.trim().parse().map_err(|e| format!("{e}"))?;
		Self::from_amount(amount).map_err(|e| e.to_string())
	}
}

impl<'de> Deserialize<'de> for Stake {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let amount = f64::deserialize(deserializer)?;
		Self::from_amount(amount).map_err(serde::de::Error::custom)
	}
}

impl fmt::Display for Stake {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
