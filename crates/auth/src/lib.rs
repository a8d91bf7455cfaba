//! Authenticated-write gate.
//!
//! An inbound request carries a claimed identity, a message and a signature
//! over that message. [`Authenticator::authenticate`] admits the caller only
//! if the signature verifies for the claimed identity, the identity is
//! registered in the current registry snapshot, and its stake meets the
//! admission threshold.

mod authenticator;
mod error;
mod request;
pub mod verifier;

pub use authenticator::{Authenticator, DEFAULT_MIN_STAKE};
pub use error::{AuthError, AuthErrorKind};
pub use request::{AuthenticatedCaller, SignedRequest};
pub use verifier::{Ed25519Verifier, SignatureVerifier};
