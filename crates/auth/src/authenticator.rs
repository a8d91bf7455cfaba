use std::sync::Arc;

use stakegate_registry::{RegistryStore, Stake};

use crate::{AuthError, AuthenticatedCaller, Ed25519Verifier, SignatureVerifier, SignedRequest};

/// Admission threshold used when none is configured.
pub const DEFAULT_MIN_STAKE: Stake = Stake::new(10_000);

/// Decides whether a signed request comes from a registered, sufficiently
/// staked participant.
///
/// Checks run in a fixed order: registry readiness, signature, membership,
/// stake. The signature is checked before membership so that an unsigned
/// request cannot learn which identities are registered.
///
/// Each decision reads the store exactly once and is made against that one
/// snapshot. The authenticator never blocks on I/O and never triggers a
/// refresh.
pub struct Authenticator<V = Ed25519Verifier> {
	store: Arc<RegistryStore>,
	verifier: V,
	min_stake: Stake,
}

impl Authenticator {
	pub fn new(store: Arc<RegistryStore>, min_stake: Stake) -> Self {
		Self::with_verifier(store, Ed25519Verifier, min_stake)
	}
}

impl<V: SignatureVerifier> Authenticator<V> {
	pub fn with_verifier(store: Arc<RegistryStore>, verifier: V, min_stake: Stake) -> Self {
		Self { store, verifier, min_stake }
	}

	pub fn store(&self) -> &Arc<RegistryStore> {
		&self.store
	}

	/// Authenticates against the configured threshold.
	pub fn authenticate_default(&self, request: &SignedRequest) -> Result<AuthenticatedCaller, AuthError> {
		self.authenticate(request, self.min_stake)
	}

	/// Authenticates `request`, requiring `stake >= min_stake`.
	pub fn authenticate(&self, request: &SignedRequest, min_stake: Stake) -> Result<AuthenticatedCaller, AuthError> {
		let result = self.decide(request, min_stake);
		match &result {
			Ok(caller) => {
				tracing::debug!(identity = %caller.identity, index = caller.index, stake = %caller.stake, "auth.accepted");
			}
			Err(err) => {
				tracing::info!(claimed = %request.claimed_identity, kind = err.kind().as_str(), "auth.rejected");
			}
		}
		result
	}

	fn decide(&self, request: &SignedRequest, min_stake: Stake) -> Result<AuthenticatedCaller, AuthError> {
		let snapshot = self.store.current()?;

		if !self.verifier.verify(&request.claimed_identity, request.message.as_bytes(), &request.signature) {
			return Err(AuthError::InvalidSignature);
		}

		let Some(entry) = snapshot.entry(&request.claimed_identity) else {
			return Err(AuthError::NotRegistered {
				identity: request.claimed_identity.as_str().into(),
			});
		};

		if entry.stake < min_stake {
			return Err(AuthError::InsufficientStake {
				identity: entry.identity.clone(),
				stake: entry.stake,
				required: min_stake,
			});
		}

		Ok(AuthenticatedCaller {
			identity: entry.identity.clone(),
			index: entry.index,
			stake: entry.stake,
		})
	}
}

impl<V> std::fmt::Debug for Authenticator<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Authenticator")
			.field("min_stake", &self.min_stake)
			.field("generation", &self.store.generation())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests;
