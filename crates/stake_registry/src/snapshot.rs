//! Immutable point-in-time view of the participant registry.
//!
//! A snapshot is built once from an upstream listing and never mutated. The
//! position of an identity in the listing is its index; indices only mean
//! something relative to the snapshot they came from.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{Identity, Stake};

/// One `{identity, stake}` row as delivered by an upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
	pub identity: Identity,
	pub stake: Stake,
}

impl Participant {
	pub fn new(identity: impl Into<Identity>, stake: impl Into<Stake>) -> Self {
		Self {
			identity: identity.into(),
			stake: stake.into(),
		}
	}
}

/// Rejection reasons for an upstream listing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
	#[error("duplicate identity {identity} at indices {first} and {second}")]
	DuplicateIdentity { identity: Identity, first: usize, second: usize },

	#[error("empty identity at index {index}")]
	EmptyIdentity { index: usize },
}

/// Membership and stake of one identity within a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry<'a> {
	pub identity: &'a Identity,
	pub index: usize,
	pub stake: Stake,
}

#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
	identities: Vec<Identity>,
	stakes: Vec<Stake>,
	by_identity: FxHashMap<Identity, usize>,
	fetched_at: DateTime<Utc>,
}

impl RegistrySnapshot {
	/// Builds a snapshot, assigning indices in listing order.
	pub fn new(participants: impl IntoIterator<Item = Participant>, fetched_at: DateTime<Utc>) -> Result<Self, SnapshotError> {
		let participants = participants.into_iter();
		let (lower, _) = participants.size_hint();
		let mut identities = Vec::with_capacity(lower);
		let mut stakes = Vec::with_capacity(lower);
		let mut by_identity = FxHashMap::with_capacity_and_hasher(lower, Default::default());

		for (index, Participant { identity, stake }) in participants.enumerate() {
			if identity.as_str().is_empty() {
				return Err(SnapshotError::EmptyIdentity { index });
			}
			if let Some(&first) = by_identity.get(identity.as_str()) {
				return Err(SnapshotError::DuplicateIdentity {
					identity,
					first,
					second: index,
				});
			}
			by_identity.insert(identity.clone(), index);
			identities.push(identity);
			stakes.push(stake);
		}

		Ok(Self {
			identities,
			stakes,
			by_identity,
			fetched_at,
		})
	}

	pub fn identities(&self) -> &[Identity] {
		&self.identities
	}

	pub fn len(&self) -> usize {
		self.identities.len()
	}

	pub fn is_empty(&self) -> bool {
		self.identities.is_empty()
	}

	pub fn fetched_at(&self) -> DateTime<Utc> {
		self.fetched_at
	}

	pub fn contains(&self, identity: &str) -> bool {
		self.by_identity.contains_key(identity)
	}

	pub fn index_of(&self, identity: &str) -> Option<usize> {
		self.by_identity.get(identity).copied()
	}

	pub fn stake_of(&self, identity: &str) -> Option<Stake> {
		self.index_of(identity).map(|index| self.stakes[index])
	}

	/// Resolves index and stake in one lookup.
	pub fn entry(&self, identity: &str) -> Option<SnapshotEntry<'_>> {
		let index = self.index_of(identity)?;
		Some(SnapshotEntry {
			identity: &self.identities[index],
			index,
			stake: self.stakes[index],
		})
	}

	pub fn get(&self, index: usize) -> Option<SnapshotEntry<'_>> {
		let identity = self.identities.get(index)?;
		Some(SnapshotEntry {
			identity,
			index,
			stake: self.stakes[index],
		})
	}

	pub fn iter(&self) -> impl Iterator<Item = SnapshotEntry<'_>> + '_ {
		self.identities
			.iter()
			.zip(self.stakes.iter())
			.enumerate()
			.map(|(index, (identity, &stake))| SnapshotEntry { identity, index, stake })
	}

	/// Sum of all stakes, saturating.
	pub fn total_stake(&self) -> Stake {
		self.stakes.iter().copied().sum()
	}
}
