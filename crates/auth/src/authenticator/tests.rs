use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use stakegate_registry::{Participant, RegistrySnapshot};

use super::*;
use crate::AuthErrorKind;

/// Accepts exactly the signature `"ok"` and counts calls.
#[derive(Default)]
struct StubVerifier {
	calls: AtomicUsize,
}

impl SignatureVerifier for StubVerifier {
	fn verify(&self, _identity: &str, _message: &[u8], signature: &str) -> bool {
		self.calls.fetch_add(1, Ordering::Relaxed);
		signature == "ok"
	}
}

impl StubVerifier {
	fn calls(&self) -> usize {
		self.calls.load(Ordering::Relaxed)
	}
}

fn store_with(rows: &[(&str, u64)]) -> Arc<RegistryStore> {
	let store = Arc::new(RegistryStore::new());
	let participants = rows.iter().map(|&(id, stake)| Participant::new(id, stake));
	store.install(RegistrySnapshot::new(participants, Utc::now()).unwrap());
	store
}

fn stub_auth(store: Arc<RegistryStore>) -> Authenticator<StubVerifier> {
	Authenticator::with_verifier(store, StubVerifier::default(), DEFAULT_MIN_STAKE)
}

#[test]
fn unready_store_short_circuits_before_verification() {
	let auth = stub_auth(Arc::new(RegistryStore::new()));
	let err = auth.authenticate(&SignedRequest::new("A", "m", "ok"), Stake::new(0)).unwrap_err();
	assert_eq!(err, AuthError::RegistryUnavailable);
	assert_eq!(auth.verifier.calls(), 0);
}

#[test]
fn signature_is_checked_before_membership() {
	let auth = stub_auth(store_with(&[("A", 50_000)]));
	let err = auth.authenticate_default(&SignedRequest::new("nobody", "m", "bad")).unwrap_err();
	assert_eq!(err, AuthError::InvalidSignature);
}

#[test]
fn signature_is_checked_before_stake() {
	let auth = stub_auth(store_with(&[("A", 1)]));
	let err = auth.authenticate_default(&SignedRequest::new("A", "m", "bad")).unwrap_err();
	assert_eq!(err.kind(), AuthErrorKind::InvalidSignature);
}

#[test]
fn membership_is_checked_before_stake() {
	let auth = stub_auth(store_with(&[("A", 1)]));
	let err = auth.authenticate_default(&SignedRequest::new("B", "m", "ok")).unwrap_err();
	assert_eq!(err, AuthError::NotRegistered { identity: "B".into() });
}

#[test]
fn accepted_caller_carries_index_and_stake() {
	let auth = stub_auth(store_with(&[("A", 1), ("B", 20_000), ("C", 3)]));
	let caller = auth.authenticate_default(&SignedRequest::new("B", "m", "ok")).unwrap();
	assert_eq!(
		caller,
		AuthenticatedCaller {
			identity: "B".into(),
			index: 1,
			stake: Stake::new(20_000),
		}
	);
	assert_eq!(auth.verifier.calls(), 1);
}

#[test]
fn explicit_threshold_overrides_default() {
	let auth = stub_auth(store_with(&[("A", 500)]));
	let request = SignedRequest::new("A", "m", "ok");
	assert!(auth.authenticate_default(&request).is_err());
	assert!(auth.authenticate(&request, Stake::new(500)).is_ok());
	assert_eq!(
		auth.authenticate(&request, Stake::new(501)).unwrap_err(),
		AuthError::InsufficientStake {
			identity: "A".into(),
			stake: Stake::new(500),
			required: Stake::new(501),
		}
	);
}

#[test]
fn decision_follows_latest_install() {
	let store = store_with(&[("A", 1)]);
	let auth = stub_auth(Arc::clone(&store));
	let request = SignedRequest::new("A", "m", "ok");
	assert!(matches!(auth.authenticate_default(&request), Err(AuthError::InsufficientStake { .. })));

	store.install(RegistrySnapshot::new([Participant::new("Z", 1), Participant::new("A", 10_000)], Utc::now()).unwrap());
	let caller = auth.authenticate_default(&request).unwrap();
	assert_eq!((caller.index, caller.stake), (1, Stake::new(10_000)));
}

proptest! {
	#[test]
	fn stake_gate_matches_threshold(stake in 0u64..100_000, threshold in 0u64..100_000) {
		let auth = stub_auth(store_with(&[("A", stake)]));
		let result = auth.authenticate(&SignedRequest::new("A", "m", "ok"), Stake::new(threshold));
		prop_assert_eq!(result.is_ok(), stake >= threshold);
		if let Err(err) = result {
			prop_assert_eq!(err.kind(), AuthErrorKind::InsufficientStake);
		}
	}

	#[test]
	fn garbage_credentials_only_ever_yield_invalid_signature(identity in ".{0,80}", signature in ".{0,140}", message in ".{0,40}") {
		let auth = Authenticator::new(store_with(&[("A", 50_000)]), DEFAULT_MIN_STAKE);
		let err = auth.authenticate_default(&SignedRequest::new(identity, message, signature)).unwrap_err();
		prop_assert_eq!(err, AuthError::InvalidSignature);
	}
}
