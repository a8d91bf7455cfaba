use stakegate_registry::{Identity, NotReady, Stake};

/// Why a request was refused.
///
/// Variants are listed in check order. A request that would fail several
/// checks always reports the first one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
	/// No registry snapshot has been installed yet.
	#[error("registry not yet available")]
	RegistryUnavailable,

	/// The signature does not verify for the claimed identity. Also covers
	/// missing or malformed credentials.
	#[error("invalid signature")]
	InvalidSignature,

	#[error("identity {identity} is not registered")]
	NotRegistered { identity: Identity },

	#[error("stake {stake} of {identity} is below the required {required}")]
	InsufficientStake { identity: Identity, stake: Stake, required: Stake },
}

impl AuthError {
	pub fn kind(&self) -> AuthErrorKind {
		match self {
			Self::RegistryUnavailable => AuthErrorKind::RegistryUnavailable,
			Self::InvalidSignature => AuthErrorKind::InvalidSignature,
			Self::NotRegistered { .. } => AuthErrorKind::NotRegistered,
			Self::InsufficientStake { .. } => AuthErrorKind::InsufficientStake,
		}
	}
}

impl From<NotReady> for AuthError {
	fn from(_: NotReady) -> Self {
		Self::RegistryUnavailable
	}
}

/// Fieldless discriminant of [`AuthError`], for logs and response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
	RegistryUnavailable,
	InvalidSignature,
	NotRegistered,
	InsufficientStake,
}

impl AuthErrorKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::RegistryUnavailable => "registry_unavailable",
			Self::InvalidSignature => "invalid_signature",
			Self::NotRegistered => "not_registered",
			Self::InsufficientStake => "insufficient_stake",
		}
	}
}

impl std::fmt::Display for AuthErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
