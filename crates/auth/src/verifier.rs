//! Signature verification.
//!
//! Verification is pure and total: any input, however malformed, yields a
//! plain `bool`. Callers cannot tell a bad encoding from a bad signature.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

/// Checks that `signature` over `message` was produced by the key behind `identity`.
pub trait SignatureVerifier: Send + Sync {
	fn verify(&self, identity: &str, message: &[u8], signature: &str) -> bool;
}

/// Ed25519 verifier for hex-encoded identities and signatures.
///
/// Identities are the 32-byte public key, signatures the 64-byte signature,
/// both hex with an optional `0x` prefix. Uses strict verification, which
/// rejects small-order keys and non-canonical signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
	fn verify(&self, identity: &str, message: &[u8], signature: &str) -> bool {
		let Some(key_bytes) = decode_hex::<32>(identity) else {
			return false;
		};
		let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
			return false;
		};
		let Some(sig_bytes) = decode_hex::<64>(signature) else {
			return false;
		};
		key.verify_strict(message, &Signature::from_bytes(&sig_bytes)).is_ok()
	}
}

/// Encodes a public key as an identity string (`0x` + 64 hex chars).
pub fn identity_hex(key: &VerifyingKey) -> String {
	format!("0x{}", hex::encode(key.as_bytes()))
}

/// Signs `message` and returns the signature as `0x` + 128 hex chars.
pub fn sign_hex(key: &SigningKey, message: &[u8]) -> String {
	format!("0x{}", hex::encode(key.sign(message).to_bytes()))
}

fn decode_hex<const N: usize>(value: &str) -> Option<[u8; N]> {
	let value = value.trim();
	let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
	let mut out = [0u8; N];
	hex::decode_to_slice(digits, &mut out).ok()?;
	Some(out)
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn key(seed: u8) -> SigningKey {
		SigningKey::from_bytes(&[seed; 32])
	}

	#[test]
	fn accepts_valid_signature() {
		let key = key(1);
		let identity = identity_hex(&key.verifying_key());
		let signature = sign_hex(&key, b"hello");
		assert!(Ed25519Verifier.verify(&identity, b"hello", &signature));
	}

	#[test]
	fn accepts_unprefixed_and_uppercase_hex() {
		let key = key(2);
		let identity = hex::encode_upper(key.verifying_key().as_bytes());
		let signature = hex::encode(key.sign(b"m").to_bytes());
		assert!(Ed25519Verifier.verify(&identity, b"m", &signature));
		assert!(Ed25519Verifier.verify(&format!("0X{identity}"), b"m", &format!(" {signature} ")));
	}

	#[test]
	fn rejects_wrong_message() {
		let key = key(1);
		let identity = identity_hex(&key.verifying_key());
		let signature = sign_hex(&key, b"hello");
		assert!(!Ed25519Verifier.verify(&identity, b"hellp", &signature));
	}

	#[test]
	fn rejects_signature_from_other_key() {
		let signer = key(1);
		let claimed = identity_hex(&key(2).verifying_key());
		let signature = sign_hex(&signer, b"hello");
		assert!(!Ed25519Verifier.verify(&claimed, b"hello", &signature));
	}

	#[test]
	fn rejects_flipped_signature_byte() {
		let key = key(3);
		let identity = identity_hex(&key.verifying_key());
		let mut raw = key.sign(b"payload").to_bytes();
		raw[10] ^= 0x01;
		assert!(!Ed25519Verifier.verify(&identity, b"payload", &hex::encode(raw)));
	}

	#[test]
	fn malformed_inputs_are_plain_false() {
		let key = key(4);
		let identity = identity_hex(&key.verifying_key());
		let signature = sign_hex(&key, b"x");
		let id = identity.as_str();
		let sig = signature.as_str();
		let cases: [(&str, &str); 7] = [
			("", sig),
			(id, ""),
			("0x", sig),
			("not-hex", sig),
			(&id[..id.len() - 2], sig),
			(id, &sig[..sig.len() - 2]),
			(id, "zz"),
		];
		for (id, sig) in cases {
			assert!(!Ed25519Verifier.verify(id, b"x", sig), "id={id:?} sig={sig:?}");
		}
	}

	proptest! {
		#[test]
		fn verification_is_deterministic(identity in ".{0,80}", message in proptest::collection::vec(any::<u8>(), 0..64), signature in ".{0,140}") {
			let first = Ed25519Verifier.verify(&identity, &message, &signature);
			let second = Ed25519Verifier.verify(&identity, &message, &signature);
			prop_assert_eq!(first, second);
		}

		#[test]
		fn arbitrary_hex_never_verifies(identity in "[0-9a-f]{64}", signature in "[0-9a-f]{128}", message in ".{0,32}") {
			prop_assert!(!Ed25519Verifier.verify(&identity, message.as_bytes(), &signature));
		}
	}
}
