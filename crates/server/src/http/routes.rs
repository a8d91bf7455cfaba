//! Request routing, independent of the HTTP transport.

use serde_json::{Value, json};
use stakegate_auth::{AuthError, AuthErrorKind, SignedRequest};

use crate::app::AppState;
use crate::reports::{MinerInfoReport, Upsert};

pub const HEADER_MESSAGE: &str = "message";
pub const HEADER_IDENTITY: &str = "identity";
pub const HEADER_SIGNATURE: &str = "signature";
/// Legacy name for [`HEADER_IDENTITY`].
pub const HEADER_IDENTITY_LEGACY: &str = "ss58_address";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Get,
	Post,
	Other,
}

/// Transport-neutral view of an inbound request.
#[derive(Debug, Clone)]
pub struct Inbound {
	pub method: Method,
	/// Request target; a query string, if any, is ignored for routing.
	pub url: String,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

impl Inbound {
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self {
			method,
			url: url.into(),
			headers: Vec::new(),
			body: Vec::new(),
		}
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();
		self
	}

	pub fn path(&self) -> &str {
		self.url.split_once('?').map_or(self.url.as_str(), |(path, _)| path)
	}

	/// Case-insensitive header lookup. First occurrence wins.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	/// Extracts credentials. Missing headers become empty strings, which fail
	/// verification like any other bad signature.
	pub fn signed_request(&self) -> SignedRequest {
		let identity = self.header(HEADER_IDENTITY).or_else(|| self.header(HEADER_IDENTITY_LEGACY));
		SignedRequest::new(
			identity.unwrap_or_default(),
			self.header(HEADER_MESSAGE).unwrap_or_default(),
			self.header(HEADER_SIGNATURE).unwrap_or_default(),
		)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
	pub status: u16,
	pub body: Value,
}

impl Reply {
	pub fn ok(body: Value) -> Self {
		Self { status: 200, body }
	}

	pub fn error(status: u16, detail: impl Into<String>) -> Self {
		Self {
			status,
			body: json!({ "detail": detail.into() }),
		}
	}

	fn auth_failure(err: &AuthError) -> Self {
		let kind = err.kind();
		let (status, detail) = match kind {
			AuthErrorKind::RegistryUnavailable => (503, "Registry not yet available"),
			AuthErrorKind::InvalidSignature => (401, "Invalid token"),
			AuthErrorKind::NotRegistered => (401, "Validator not registered on subnet"),
			AuthErrorKind::InsufficientStake => (401, "Stake below minimum"),
		};
		Self {
			status,
			body: json!({ "detail": detail, "kind": kind.as_str() }),
		}
	}
}

pub fn handle(state: &AppState, req: &Inbound) -> Reply {
	match (req.method, req.path()) {
		(Method::Post, "/store_miner_info") => store_miner_info(state, req),
		(Method::Get, "/get_miner_info") => get_miner_info(state),
		(Method::Get, "/healthz") => Reply::ok(json!({ "status": "ok" })),
		(Method::Get, "/readyz") => readyz(state),
		(_, "/store_miner_info" | "/get_miner_info" | "/healthz" | "/readyz") => Reply::error(405, "Method Not Allowed"),
		_ => Reply::error(404, "Not Found"),
	}
}

fn store_miner_info(state: &AppState, req: &Inbound) -> Reply {
	let caller = match state.authenticator.authenticate_default(&req.signed_request()) {
		Ok(caller) => caller,
		Err(err) => return Reply::auth_failure(&err),
	};

	let report = match MinerInfoReport::from_json(&req.body) {
		Ok(report) => report,
		Err(err) => {
			tracing::info!(identity = %caller.identity, error = %err, "reports.rejected_body");
			return Reply::error(422, format!("invalid report: {err}"));
		}
	};

	let uid = report.uid;
	let version = report.version().unwrap_or("no-version").to_string();
	let outcome = state.reports.upsert(report);
	tracing::info!(
		uid,
		version = %version,
		identity = %caller.identity,
		caller_index = caller.index,
		inserted = outcome == Upsert::Inserted,
		"reports.stored"
	);
	Reply::ok(json!({ "message": "Item uploaded successfully" }))
}

fn get_miner_info(state: &AppState) -> Reply {
	match serde_json::to_value(state.reports.miner_info()) {
		Ok(body) => Reply::ok(body),
		Err(err) => {
			tracing::error!(error = %err, "reports.encode_failed");
			Reply::error(500, "Internal Server Error")
		}
	}
}

fn readyz(state: &AppState) -> Reply {
	let status = state.refresher.status();
	let refresh = json!({
		"attempts": status.attempts,
		"installs": status.installs,
		"consecutive_failures": status.consecutive_failures,
		"last_success": status.last_success.map(|t| t.to_rfc3339()),
		"last_error": status.last_error,
	});
	match state.authenticator.store().current_with_generation() {
		Ok((generation, snapshot)) => Reply::ok(json!({
			"ready": true,
			"generation": generation,
			"participants": snapshot.len(),
			"refresh": refresh,
		})),
		Err(_) => Reply {
			status: 503,
			body: json!({ "ready": false, "refresh": refresh }),
		},
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use chrono::Utc;
	use ed25519_dalek::SigningKey;
	use pretty_assertions::assert_eq;
	use stakegate_auth::Authenticator;
	use stakegate_auth::verifier::{identity_hex, sign_hex};
	use stakegate_registry::source::FixedSource;
	use stakegate_registry::{Participant, RefreshConfig, RegistryRefresher, RegistrySnapshot, RegistryStore, Stake};

	use super::*;

	struct Fixture {
		state: AppState,
		key: SigningKey,
		identity: String,
	}

	impl Fixture {
		fn new(stake: Option<u64>) -> Self {
			let key = SigningKey::from_bytes(&[9; 32]);
			let identity = identity_hex(&key.verifying_key());
			let store = Arc::new(RegistryStore::new());
			if let Some(stake) = stake {
				let rows = [Participant::new("0xother", 1), Participant::new(identity.as_str(), stake)];
				store.install(RegistrySnapshot::new(rows, Utc::now()).unwrap());
			}
			let refresher = RegistryRefresher::new(Arc::new(FixedSource::new(Vec::new())), Arc::clone(&store), RefreshConfig::default());
			let state = AppState::new(Authenticator::new(store, Stake::new(10_000)), refresher);
			Self { state, key, identity }
		}

		fn signed_post(&self, header: &str, body: &str) -> Inbound {
			Inbound::new(Method::Post, "/store_miner_info")
				.with_header(header, self.identity.as_str())
				.with_header("Message", "ping")
				.with_header("Signature", sign_hex(&self.key, b"ping"))
				.with_body(body.as_bytes().to_vec())
		}
	}

	#[test]
	fn headers_match_case_insensitively() {
		let req = Inbound::new(Method::Get, "/").with_header("MESSAGE", "m").with_header("message", "second");
		assert_eq!(req.header("message"), Some("m"));
		assert_eq!(req.header("signature"), None);
	}

	#[test]
	fn legacy_identity_header_is_an_alias() {
		let req = Inbound::new(Method::Post, "/").with_header("ss58_address", "abc");
		assert_eq!(req.signed_request(), SignedRequest::new("abc", "", ""));

		let both = req.with_header("identity", "preferred");
		assert_eq!(both.signed_request().claimed_identity, "preferred");
	}

	#[test]
	fn query_string_is_ignored_for_routing() {
		let fx = Fixture::new(Some(1));
		let reply = handle(&fx.state, &Inbound::new(Method::Get, "/healthz?verbose=1"));
		assert_eq!(reply.status, 200);
	}

	#[test]
	fn unknown_paths_and_methods() {
		let fx = Fixture::new(Some(1));
		assert_eq!(handle(&fx.state, &Inbound::new(Method::Get, "/nope")).status, 404);
		assert_eq!(handle(&fx.state, &Inbound::new(Method::Get, "/store_miner_info")).status, 405);
		assert_eq!(handle(&fx.state, &Inbound::new(Method::Other, "/readyz")).status, 405);
	}

	#[test]
	fn store_succeeds_for_staked_caller() {
		let fx = Fixture::new(Some(10_000));
		let reply = handle(&fx.state, &fx.signed_post("identity", r#"{"uid": 4, "info": {"ok": true}}"#));
		assert_eq!(reply, Reply::ok(json!({"message": "Item uploaded successfully"})));

		let listed = handle(&fx.state, &Inbound::new(Method::Get, "/get_miner_info"));
		assert_eq!(listed.body, json!({"4": {"info": {"ok": true}}}));
	}

	#[test]
	fn store_accepts_legacy_identity_header() {
		let fx = Fixture::new(Some(20_000));
		let reply = handle(&fx.state, &fx.signed_post("ss58_address", r#"{"uid": 1}"#));
		assert_eq!(reply.status, 200);
	}

	#[test]
	fn auth_failures_map_to_status_and_detail() {
		let fx = Fixture::new(Some(5));
		let reply = handle(&fx.state, &fx.signed_post("identity", r#"{"uid": 1}"#));
		assert_eq!(reply.status, 401);
		assert_eq!(reply.body, json!({"detail": "Stake below minimum", "kind": "insufficient_stake"}));

		let unsigned = Inbound::new(Method::Post, "/store_miner_info").with_body(r#"{"uid": 1}"#);
		let reply = handle(&fx.state, &unsigned);
		assert_eq!(reply.status, 401);
		assert_eq!(reply.body["detail"], "Invalid token");
		assert!(fx.state.reports.is_empty());
	}

	#[test]
	fn unregistered_caller_is_refused() {
		let fx = Fixture::new(None);
		fx.state.authenticator.store().install(RegistrySnapshot::new([Participant::new("0xsomeone", 1)], Utc::now()).unwrap());
		let reply = handle(&fx.state, &fx.signed_post("identity", r#"{"uid": 1}"#));
		assert_eq!(reply.body["kind"], "not_registered");
	}

	#[test]
	fn unready_registry_is_service_unavailable() {
		let fx = Fixture::new(None);
		let reply = handle(&fx.state, &fx.signed_post("identity", r#"{"uid": 1}"#));
		assert_eq!(reply.status, 503);
		assert_eq!(reply.body["kind"], "registry_unavailable");

		let ready = handle(&fx.state, &Inbound::new(Method::Get, "/readyz"));
		assert_eq!(ready.status, 503);
		assert_eq!(ready.body["ready"], false);
	}

	#[test]
	fn malformed_body_after_auth_is_unprocessable() {
		let fx = Fixture::new(Some(10_000));
		let reply = handle(&fx.state, &fx.signed_post("identity", r#"{"no_uid": true}"#));
		assert_eq!(reply.status, 422);
		assert!(fx.state.reports.is_empty());
	}

	#[test]
	fn readyz_reports_generation_and_size() {
		let fx = Fixture::new(Some(1));
		let reply = handle(&fx.state, &Inbound::new(Method::Get, "/readyz"));
		assert_eq!(reply.status, 200);
		assert_eq!(reply.body["generation"], 1);
		assert_eq!(reply.body["participants"], 2);
	}
}
