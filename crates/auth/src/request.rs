use stakegate_registry::{Identity, Stake};

/// Credentials presented with an inbound request.
///
/// Fields are taken verbatim from the transport. Absent values are empty
/// strings, which never verify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedRequest {
	pub claimed_identity: String,
	/// Exact bytes the signature covers.
	pub message: String,
	pub signature: String,
}

impl SignedRequest {
	pub fn new(claimed_identity: impl Into<String>, message: impl Into<String>, signature: impl Into<String>) -> Self {
		Self {
			claimed_identity: claimed_identity.into(),
			message: message.into(),
			signature: signature.into(),
		}
	}
}

/// A caller admitted by [`crate::Authenticator`].
///
/// `index` and `stake` come from the snapshot the decision was made against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCaller {
	pub identity: Identity,
	pub index: usize,
	pub stake: Stake,
}
